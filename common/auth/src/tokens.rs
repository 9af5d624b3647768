use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use tracing::debug;

use crate::claims::{Claims, ClaimsRepr};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 bearer tokens signed with the server secret.
/// Stateless: there is no revocation list, expiry is the only invalidation.
#[derive(Clone)]
pub struct TokenService {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding = DecodingKey::from_secret(config.secret.as_bytes());
        Self { config, encoding, decoding }
    }

    pub fn issue(&self, email: &str) -> AuthResult<IssuedToken> {
        self.issue_at(email, Utc::now())
    }

    pub(crate) fn issue_at(&self, email: &str, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_at = now + Duration::seconds(self.config.ttl_seconds);
        let repr = ClaimsRepr {
            email: email.to_owned(),
            iat: Some(now.timestamp()),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &repr, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds.into();
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<ClaimsRepr>(token, &self.decoding, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(email = %claims.email, "verified bearer token");
        Ok(claims)
    }
}
