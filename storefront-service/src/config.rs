use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use anyhow::{bail, Context};
use common_auth::JwtConfig;

use crate::lifecycle::ApprovalPolicy;

const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:3001",
    "http://localhost:5173",
];

/// Longest token lifetime accepted from the environment (365 days).
pub const MAX_TOKEN_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub api_base: String,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub jwt: JwtConfig,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub stripe: Option<StripeConfig>,
    pub currency: String,
    pub approval: ApprovalPolicy,
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,
}

impl StorefrontConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let secret = get("ACCESS_TOKEN_SECRET").context("ACCESS_TOKEN_SECRET must be set")?;
        let jwt = JwtConfig::new(secret)
            .with_ttl(parse_or("TOKEN_TTL_SECONDS", get("TOKEN_TTL_SECONDS"), 86_400)?)
            .with_leeway(parse_or("JWT_LEEWAY_SECONDS", get("JWT_LEEWAY_SECONDS"), 30)?);
        if !(1..=MAX_TOKEN_TTL_SECONDS).contains(&jwt.ttl_seconds) {
            bail!("TOKEN_TTL_SECONDS must be between 1 and {MAX_TOKEN_TTL_SECONDS}");
        }

        let stripe = get("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
            secret_key,
            api_base: get("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".into()),
        });

        let host: IpAddr = get("HOST")
            .unwrap_or_else(|| "0.0.0.0".into())
            .parse()
            .context("HOST must be an IP address")?;
        let port: u16 = parse_or("PORT", get("PORT"), 5000)?;

        Ok(Self {
            jwt,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10)?,
            stripe,
            currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| "usd".into()).to_ascii_lowercase(),
            approval: ApprovalPolicy::from_requires_payment(parse_flag(
                "ORDER_APPROVAL_REQUIRES_PAYMENT",
                get("ORDER_APPROVAL_REQUIRES_PAYMENT"),
                true,
            )?),
            bind_addr: SocketAddr::from((host, port)),
            allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()),
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value.parse().with_context(|| format!("{key} has invalid value {value:?}")),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, raw: Option<String>, default: bool) -> anyhow::Result<bool> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("{key} must be a boolean, got {other:?}"),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_owned)
        .collect()
}
