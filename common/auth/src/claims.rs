use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Verified bearer token claims. The token carries identity only; roles are
/// always resolved from the credential store at decision time.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub email: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

/// Wire shape of the signed payload.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let email = value.email.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidClaim("email", value.email.clone()));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            email: email.to_owned(),
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_email() {
        let repr = ClaimsRepr { email: "  ".into(), iat: None, exp: 1_700_000_000 };
        let err = Claims::try_from(repr).expect_err("blank email must be rejected");
        assert!(matches!(err, AuthError::InvalidClaim("email", _)));
    }

    #[test]
    fn converts_timestamps() {
        let repr = ClaimsRepr { email: "a@x.com".into(), iat: Some(1_700_000_000), exp: 1_700_086_400 };
        let claims = Claims::try_from(repr).expect("valid claims");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.expires_at.timestamp(), 1_700_086_400);
        assert_eq!(claims.issued_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }
}
