pub mod app;
pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod order_handlers;
pub mod payment_handlers;
pub mod payments;
pub mod store;
pub mod user_handlers;

pub use app::{build_router, AppState};
pub use config::StorefrontConfig;
