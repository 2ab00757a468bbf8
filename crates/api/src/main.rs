//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use coupon_store::{CouponStore, InMemoryCouponStore, PostgresCouponStore};
use metrics_exporter_prometheus::PrometheusHandle;
use purchase::{
    CouponClient, HttpCouponClient, InMemoryProductStore, PostgresProductStore, ProductStore,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve<S, P>(
    config: &Config,
    coupon_store: S,
    product_store: P,
    remote: Option<Arc<dyn CouponClient>>,
    metrics_handle: PrometheusHandle,
) where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    let state = api::build_state(coupon_store, product_store, remote);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Remote coupon component, if configured
    let remote = config.coupon_service_url.as_deref().map(|url| {
        tracing::info!(url, "purchases use the remote coupon component");
        let client = HttpCouponClient::new(url, config.coupon_client_timeout)
            .expect("failed to build coupon client");
        Arc::new(client) as Arc<dyn CouponClient>
    });

    // 4. Stores, then serve
    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");

            let coupons = PostgresCouponStore::new(pool.clone());
            coupons
                .run_migrations()
                .await
                .expect("coupon migrations failed");
            let products = PostgresProductStore::new(pool);
            products
                .run_migrations()
                .await
                .expect("product migrations failed");

            tracing::info!("using PostgreSQL stores");
            serve(&config, coupons, products, remote, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            serve(
                &config,
                InMemoryCouponStore::new(),
                InMemoryProductStore::new(),
                remote,
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
