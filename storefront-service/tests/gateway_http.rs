use httpmock::prelude::*;
use serde_json::json;

use storefront_service::gateway::{GatewayError, IntentRequest, PaymentGateway, StripeGateway};

#[tokio::test]
async fn posts_form_encoded_intent_with_bearer_key() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/payment_intents")
                .header("authorization", "Bearer sk_test_key")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("amount=1999")
                .body_contains("currency=eur")
                .body_contains("payment_method_types%5B%5D=card");
            then.status(200).json_body(json!({"id": "pi_1", "client_secret": "pi_1_secret_x"}));
        })
        .await;

    let gateway = StripeGateway::new(format!("{}/", server.base_url()), "sk_test_key");
    let intent = gateway
        .create_intent(IntentRequest { amount_minor: 1999, currency: "eur" })
        .await
        .unwrap();
    assert_eq!(intent.id, "pi_1");
    assert_eq!(intent.client_secret, "pi_1_secret_x");
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_rejected_with_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(401).json_body(json!({"error": {"message": "Invalid API Key provided"}}));
        })
        .await;

    let gateway = StripeGateway::new(server.base_url(), "sk_bad");
    let err = gateway
        .create_intent(IntentRequest { amount_minor: 100, currency: "usd" })
        .await
        .unwrap_err();
    match err {
        GatewayError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert!(message.contains("Invalid API Key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_client_secret_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(200).json_body(json!({"id": "pi_2"}));
        })
        .await;

    let gateway = StripeGateway::new(server.base_url(), "sk_test_key");
    let err = gateway
        .create_intent(IntentRequest { amount_minor: 100, currency: "usd" })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingClientSecret));
}

#[tokio::test]
async fn unreachable_gateway_is_transport_error() {
    let gateway = StripeGateway::new("http://127.0.0.1:1", "sk_test_key");
    let err = gateway
        .create_intent(IntentRequest { amount_minor: 100, currency: "usd" })
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}
