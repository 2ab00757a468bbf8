//! HTTP API for the coupon and product components.
//!
//! Exposes coupon administration, lookup and redemption, and the product
//! purchase saga as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use coupon::{CouponService, RolePolicy};
use coupon_store::CouponStore;
use metrics_exporter_prometheus::PrometheusHandle;
use purchase::{CouponClient, LocalCouponClient, ProductStore, PurchaseOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CouponStore, P: ProductStore> {
    pub coupons: Arc<CouponService<S>>,
    pub purchases: PurchaseOrchestrator<P, Arc<dyn CouponClient>>,
    pub access: RolePolicy,
}

/// Wires the coupon service and the purchase orchestrator together.
///
/// With `remote` set, purchases reach the coupon component over HTTP;
/// otherwise they call the co-located coupon service in-process.
pub fn build_state<S, P>(
    coupon_store: S,
    product_store: P,
    remote: Option<Arc<dyn CouponClient>>,
) -> Arc<AppState<S, P>>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    let coupons = Arc::new(CouponService::new(coupon_store));
    let client = remote.unwrap_or_else(|| {
        Arc::new(LocalCouponClient::new(Arc::clone(&coupons))) as Arc<dyn CouponClient>
    });

    Arc::new(AppState {
        coupons,
        purchases: PurchaseOrchestrator::new(product_store, client),
        access: RolePolicy,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, P>(state: Arc<AppState<S, P>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    use routes::{coupons, products};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/coupons", post(coupons::create::<S, P>))
        .route("/coupons/used", get(coupons::list_used::<S, P>))
        // DELETE reads the segment as the numeric coupon id.
        .route(
            "/coupons/{code}",
            get(coupons::retrieve::<S, P>).delete(coupons::delete::<S, P>),
        )
        .route("/coupons/{code}/apply", post(coupons::apply::<S, P>))
        .route("/products", post(products::create::<S, P>))
        .route("/products/{id}/purchase", post(products::purchase::<S, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
