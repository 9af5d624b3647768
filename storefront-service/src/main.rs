use std::sync::Arc;

use anyhow::Context;
use common_auth::TokenService;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use storefront_service::gateway::{PaymentGateway, StripeGateway, StubGateway};
use storefront_service::payments::PaymentBroker;
use storefront_service::store::Stores;
use storefront_service::{build_router, AppState, StorefrontConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = StorefrontConfig::from_env()?;

    let pool = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            // Ensure database schema is up to date before serving traffic
            sqlx::migrate!("./migrations").run(&pool).await?;
            Some(pool)
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
            None
        }
    };
    let stores = match &pool {
        Some(pool) => Stores::postgres(pool.clone()),
        None => Stores::memory(),
    };

    let gateway: Arc<dyn PaymentGateway> = match &config.stripe {
        Some(stripe) => {
            info!(api_base = %stripe.api_base, "payment intents go to Stripe");
            Arc::new(StripeGateway::new(stripe.api_base.clone(), stripe.secret_key.clone()))
        }
        None => {
            warn!("STRIPE_SECRET_KEY not set; payment intents are stubbed");
            Arc::new(StubGateway::default())
        }
    };

    let state = AppState::new(
        TokenService::new(config.jwt.clone()),
        stores,
        PaymentBroker::new(gateway, config.currency.clone()),
        config.approval,
    );
    let app = build_router(state, &config.allowed_origins);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, approval = ?config.approval, "starting storefront-service");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("storefront-service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
