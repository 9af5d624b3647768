#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use common_auth::{JwtConfig, TokenService};
use common_security::Role;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use storefront_service::gateway::{PaymentGateway, StubGateway};
use storefront_service::lifecycle::ApprovalPolicy;
use storefront_service::payments::PaymentBroker;
use storefront_service::store::Stores;
use storefront_service::{build_router, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN: &str = "root@shop.test";

pub struct TestApp {
    pub router: Router,
    pub stores: Stores,
}

impl TestApp {
    pub fn new(approval: ApprovalPolicy) -> Self {
        Self::with_gateway(approval, Arc::new(StubGateway::default()))
    }

    pub fn with_gateway(approval: ApprovalPolicy, gateway: Arc<dyn PaymentGateway>) -> Self {
        let stores = Stores::memory();
        let state = AppState::new(
            TokenService::new(JwtConfig::new(SECRET)),
            stores.clone(),
            PaymentBroker::new(gateway, "usd"),
            approval,
        );
        let router = build_router(state, &["http://localhost:3000".to_string()]);
        Self { router, stores }
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    /// Registers `email` through the public upsert route and returns its token.
    pub async fn login(&self, email: &str) -> String {
        let (status, body) = self.send(Method::PUT, &format!("/user/{email}"), None, Some(serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Admins can only be minted out of band; there is no self-service route.
    pub async fn login_admin(&self) -> String {
        let token = self.login(ADMIN).await;
        self.stores.users.set_role(ADMIN, Role::Admin).await.unwrap();
        token
    }

    pub async fn place_order(&self, token: &str, total: Value) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/order",
                Some(token),
                Some(serde_json::json!({
                    "items": [{"productId": "sku-1", "name": "Mug", "quantity": 2, "unitPrice": 10}],
                    "totalPrice": total,
                    "shipping": {"name": "Ada", "phone": "555-0100", "address": "1 Main St"}
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}
