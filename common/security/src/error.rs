use common_http_errors::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("forbidden access")]
    Forbidden,
    #[error("credential lookup failed: {0}")]
    Lookup(String),
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::Forbidden => ApiError::Forbidden { message: Some(e.to_string()) },
            SecurityError::Lookup(_) => ApiError::internal(e),
        }
    }
}
