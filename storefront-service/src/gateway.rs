use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Transport(String),
    #[error("payment gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("payment gateway returned an unreadable response: {0}")]
    Decode(String),
    #[error("payment gateway response carried no client secret")]
    MissingClientSecret,
}

#[derive(Debug, Clone, Copy)]
pub struct IntentRequest<'a> {
    /// Amount in the currency's minor unit.
    pub amount_minor: i64,
    pub currency: &'a str,
}

#[derive(Debug, Clone)]
pub struct GatewayIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest<'_>) -> Result<GatewayIntent, GatewayError>;
}

/// Stripe-compatible `POST /v1/payment_intents` client.
pub struct StripeGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url, secret_key)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            secret_key: secret_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: IntentRequest<'_>) -> Result<GatewayIntent, GatewayError> {
        let url = format!("{}/v1/payment_intents", self.base_url);
        let form = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.to_owned()),
            ("payment_method_types[]", "card".to_owned()),
        ];
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message.unwrap_or_default(),
                Err(err) => err.to_string(),
            };
            warn!(status = status.as_u16(), %message, "payment intent rejected");
            return Err(GatewayError::Rejected { status: status.as_u16(), message });
        }

        let body: IntentResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        let client_secret = body
            .client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or(GatewayError::MissingClientSecret)?;
        debug!(intent_id = %body.id, amount = request.amount_minor, "payment intent created");
        Ok(GatewayIntent { id: body.id, client_secret })
    }
}

/// Development gateway that fabricates intents without any network call.
pub struct StubGateway;

impl StubGateway { pub fn new() -> Self { Self } }

impl Default for StubGateway {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(&self, request: IntentRequest<'_>) -> Result<GatewayIntent, GatewayError> {
        let id = format!("pi_stub_{}", Uuid::new_v4().simple());
        debug!(intent_id = %id, amount = request.amount_minor, currency = request.currency, "stub payment intent");
        Ok(GatewayIntent { client_secret: format!("{id}_secret"), id })
    }
}
