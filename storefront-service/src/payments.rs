use std::sync::Arc;

use bigdecimal::BigDecimal;
use common_http_errors::ApiError;
use common_money::{to_minor_units, MoneyError};
use thiserror::Error;
use tracing::{error, info};

use crate::gateway::{GatewayError, IntentRequest, PaymentGateway};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<BrokerError> for ApiError {
    fn from(value: BrokerError) -> Self {
        match value {
            BrokerError::InvalidAmount(err) => ApiError::bad_request("invalid_amount", err.to_string()),
            BrokerError::Gateway(_) => ApiError::BadGateway {
                code: "payment_gateway_error",
                message: Some("payment gateway could not create a payment intent".into()),
            },
        }
    }
}

/// Creates payment intents for order totals. Knows nothing about order
/// state: marking an order paid happens only through the lifecycle once the
/// client confirms the payment.
pub struct PaymentBroker {
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl PaymentBroker {
    pub fn new(gateway: Arc<dyn PaymentGateway>, currency: impl Into<String>) -> Self {
        Self { gateway, currency: currency.into().to_ascii_lowercase() }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns the gateway-issued client secret.
    pub async fn create_intent(&self, total_price: &BigDecimal) -> Result<String, BrokerError> {
        let amount_minor = to_minor_units(total_price)?;
        let intent = self
            .gateway
            .create_intent(IntentRequest { amount_minor, currency: &self.currency })
            .await
            .map_err(|err| {
                error!(error = %err, amount_minor, "payment intent creation failed");
                err
            })?;
        info!(intent_id = %intent.id, amount_minor, currency = %self.currency, "payment intent issued");
        Ok(intent.client_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayIntent;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        seen: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for RecordingGateway {
        async fn create_intent(&self, request: IntentRequest<'_>) -> Result<GatewayIntent, GatewayError> {
            self.seen.lock().unwrap().push((request.amount_minor, request.currency.to_owned()));
            if self.fail {
                return Err(GatewayError::Transport("connection reset".into()));
            }
            Ok(GatewayIntent { id: "pi_1".into(), client_secret: "pi_1_secret".into() })
        }
    }

    #[tokio::test]
    async fn submits_minor_units_in_configured_currency() {
        let gateway = Arc::new(RecordingGateway::default());
        let broker = PaymentBroker::new(gateway.clone(), "USD");
        let secret = broker.create_intent(&BigDecimal::from(20)).await.unwrap();
        assert_eq!(secret, "pi_1_secret");
        assert_eq!(gateway.seen.lock().unwrap().as_slice(), &[(2000, "usd".to_string())]);
    }

    #[tokio::test]
    async fn non_positive_total_never_reaches_gateway() {
        let gateway = Arc::new(RecordingGateway::default());
        let broker = PaymentBroker::new(gateway.clone(), "usd");
        let err = broker.create_intent(&BigDecimal::from_str("-1").unwrap()).await.unwrap_err();
        assert!(matches!(err, BrokerError::InvalidAmount(_)));
        assert!(gateway.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_surfaces() {
        let gateway = Arc::new(RecordingGateway { fail: true, ..Default::default() });
        let broker = PaymentBroker::new(gateway, "usd");
        let err = broker.create_intent(&BigDecimal::from(5)).await.unwrap_err();
        assert!(matches!(err, BrokerError::Gateway(_)));
    }
}
