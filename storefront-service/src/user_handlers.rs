use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::AuthContext;
use common_http_errors::{ApiError, ApiResult};
use common_security::{Role, Scope};
use serde::Serialize;
use tracing::info;

use crate::app::AppState;
use crate::store::{Profile, UserRecord};

#[derive(Debug, Serialize)]
pub struct UpsertResult {
    pub created: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUserResponse {
    pub result: UpsertResult,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub admin: bool,
}

pub(crate) fn validate_email(raw: &str) -> ApiResult<&str> {
    let email = raw.trim();
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'))
        .unwrap_or(false);
    if !well_formed || email.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("invalid_email", format!("{raw:?} is not a valid email address")));
    }
    Ok(email)
}

fn user_not_found(email: &str) -> ApiError {
    ApiError::NotFound { code: "user_not_found", message: Some(format!("user {email} not found")) }
}

/// Login-or-register. The caller proves nothing here: whoever names an email
/// receives a token for it, which is how the storefront front end works.
pub async fn upsert_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    payload: Result<Json<Profile>, JsonRejection>,
) -> ApiResult<Json<UpsertUserResponse>> {
    let Json(profile) = payload?;
    let email = validate_email(&email)?;
    let outcome = state.users.upsert_profile(email, &profile).await?;
    let issued = state.tokens.issue(email)?;
    if outcome.created {
        info!(email, "user registered");
    }
    Ok(Json(UpsertUserResponse {
        result: UpsertResult { created: outcome.created },
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

pub async fn list_users(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<UserRecord>>> {
    state.policy.authorize(Some(&auth), Scope::Admin).await?;
    Ok(Json(state.users.list().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
) -> ApiResult<Json<UserRecord>> {
    state.policy.authorize(Some(&auth), Scope::Authenticated).await?;
    let user = state.users.get(&email).await?.ok_or_else(|| user_not_found(&email))?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
) -> ApiResult<StatusCode> {
    state.policy.authorize(Some(&auth), Scope::Admin).await?;
    if !state.users.delete(&email).await? {
        return Err(user_not_found(&email));
    }
    info!(email = %email, admin = auth.email(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Self-service profile edit. Reserved keys such as `role` are stripped
/// before the merge, so this can never change the stored role.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
    payload: Result<Json<Profile>, JsonRejection>,
) -> ApiResult<Json<UserRecord>> {
    state.policy.authorize(Some(&auth), Scope::Owner(&email)).await?;
    let Json(profile) = payload?;
    let user = state
        .users
        .update_profile(&email, &profile)
        .await?
        .ok_or_else(|| user_not_found(&email))?;
    Ok(Json(user))
}

pub async fn grant_admin(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
) -> ApiResult<Json<UserRecord>> {
    state.policy.authorize(Some(&auth), Scope::Admin).await?;
    let user = state
        .users
        .set_role(&email, Role::Admin)
        .await?
        .ok_or_else(|| user_not_found(&email))?;
    info!(email = %email, granted_by = auth.email(), "admin role granted");
    Ok(Json(user))
}

pub async fn check_admin(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
) -> ApiResult<Json<AdminStatus>> {
    state.policy.authorize(Some(&auth), Scope::Authenticated).await?;
    let admin = state.policy.is_admin(&email).await?;
    Ok(Json(AdminStatus { admin }))
}
