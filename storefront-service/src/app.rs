use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
};
use axum::{
    extract::FromRef,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use common_auth::TokenService;
use common_http_errors::ERROR_CODE_HEADER;
use common_security::AccessPolicy;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::lifecycle::{ApprovalPolicy, OrderLifecycle};
use crate::order_handlers::{
    approve_order, create_order, delete_order, get_order, list_all_orders, list_my_orders, list_order_payments,
    record_payment,
};
use crate::payment_handlers::create_payment_intent;
use crate::payments::PaymentBroker;
use crate::store::{Stores, UserRoles, UserStore};
use crate::user_handlers::{check_admin, delete_user, get_user, grant_admin, list_users, update_profile, upsert_user};

pub const SERVICE_NAME: &str = "storefront-service";

pub static STOREFRONT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .unwrap_or_else(|err| panic!("http_errors_total definition is invalid: {err}"));
    if let Err(err) = STOREFRONT_REGISTRY.register(Box::new(counter.clone())) {
        warn!(error = %err, "http_errors_total already registered");
    }
    counter
});

pub async fn http_error_metrics(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        HTTP_ERRORS_TOTAL
            .with_label_values(&[SERVICE_NAME, code, status.as_str()])
            .inc();
    }
    resp
}

pub async fn health() -> &'static str {
    "ok"
}

async fn metrics() -> (StatusCode, String) {
    Lazy::force(&HTTP_ERRORS_TOTAL);
    let encoder = TextEncoder::new();
    let families = STOREFRONT_REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8_lossy(&buf).into_owned())
}

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserStore>,
    pub policy: AccessPolicy,
    pub lifecycle: Arc<OrderLifecycle>,
    pub payments: Arc<PaymentBroker>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl AppState {
    /// Wires the access policy and lifecycle over one set of stores.
    pub fn new(
        tokens: TokenService,
        stores: Stores,
        payments: PaymentBroker,
        approval: ApprovalPolicy,
    ) -> Self {
        let policy = AccessPolicy::new(Arc::new(UserRoles(stores.users.clone())));
        let lifecycle = OrderLifecycle::new(
            stores.orders,
            stores.payments,
            policy.clone(),
            approval,
            payments.currency(),
        );
        Self {
            tokens: Arc::new(tokens),
            users: stores.users,
            policy,
            lifecycle: Arc::new(lifecycle),
            payments: Arc::new(payments),
        }
    }
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        // Identities
        .route("/user/:email", put(upsert_user))
        .route("/user/profile/:email", put(update_profile))
        .route("/users", get(list_users))
        .route("/users/:email", get(get_user).delete(delete_user))
        .route("/users/admin/:email", put(grant_admin))
        .route("/admin/:email", get(check_admin))
        // Orders
        .route("/order", post(create_order).get(list_my_orders))
        .route("/order/:id", patch(record_payment).delete(delete_order))
        .route("/order/approved/:id", patch(approve_order))
        .route("/orders", get(list_all_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/payments", get(list_order_payments))
        // Payments
        .route("/create-payment-intent", post(create_payment_intent))
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(http_error_metrics))
}
