use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Boundary error shared by every route. Each variant maps to exactly one
/// status code and always renders a JSON body with a human-readable message.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated { message: Option<String> },
    Forbidden { message: Option<String> },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str, message: Option<String> },
    Conflict { code: &'static str, message: Option<String> },
    BadGateway { code: &'static str, message: Option<String> },
    /// Detail is logged, never sent to the client.
    Internal { detail: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { detail: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: Some(message.into()) } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code, message: None } }
    pub fn forbidden() -> Self { Self::Forbidden { message: None } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated { .. } => "unauthenticated",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::BadRequest { code, .. }
            | ApiError::NotFound { code, .. }
            | ApiError::Conflict { code, .. }
            | ApiError::BadGateway { code, .. } => code,
            ApiError::Internal { .. } => "internal_error",
        }
    }

    fn message(self) -> String {
        match self {
            ApiError::Unauthenticated { message } => message.unwrap_or_else(|| "unauthorized access".into()),
            ApiError::Forbidden { message } => message.unwrap_or_else(|| "forbidden access".into()),
            ApiError::BadRequest { message, .. } => message.unwrap_or_else(|| "invalid request".into()),
            ApiError::NotFound { message, .. } => message.unwrap_or_else(|| "resource not found".into()),
            ApiError::Conflict { message, .. } => message.unwrap_or_else(|| "request conflicts with current state".into()),
            ApiError::BadGateway { message, .. } => message.unwrap_or_else(|| "upstream service failed".into()),
            ApiError::Internal { detail } => {
                if let Some(detail) = detail {
                    error!(error = %detail, "internal error");
                }
                "internal server error".into()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = ErrorBody { code: code.into(), message: self.message() };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(code) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest { code: "invalid_body", message: Some(rejection.body_text()) }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest { code: "invalid_query", message: Some(rejection.body_text()) }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest { code: "invalid_path", message: Some(rejection.body_text()) }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
