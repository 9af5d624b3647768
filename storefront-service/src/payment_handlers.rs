use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use bigdecimal::BigDecimal;
use common_auth::AuthContext;
use common_http_errors::ApiResult;
use common_security::Scope;
use serde::{Deserialize, Serialize};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub total_price: BigDecimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: String,
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    auth: AuthContext,
    payload: Result<Json<CreateIntentRequest>, JsonRejection>,
) -> ApiResult<Json<CreateIntentResponse>> {
    state.policy.authorize(Some(&auth), Scope::Authenticated).await?;
    let Json(req) = payload?;
    let client_secret = state.payments.create_intent(&req.total_price).await?;
    Ok(Json(CreateIntentResponse { client_secret }))
}
