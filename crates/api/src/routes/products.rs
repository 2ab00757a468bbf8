//! Product component endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use coupon::AccessPolicy;
use coupon_store::CouponStore;
use purchase::{Product, ProductStore, PurchaseRecord};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub coupon: Option<String>,
}

/// POST /products — add a product (admin only).
#[tracing::instrument(skip(state, req))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    if !state.access.is_admin(&identity) {
        return Err(ApiError::PermissionDenied(
            "user doesn't have permission".to_string(),
        ));
    }
    if req.name.trim().is_empty() || req.price_cents < 0 {
        return Err(ApiError::BadRequest(
            "product needs a name and a non-negative price".to_string(),
        ));
    }

    let product = state
        .purchases
        .products()
        .create_product(req.name.trim(), Money::from_cents(req.price_cents))
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// POST /products/{id}/purchase — buy a product, optionally with a coupon.
#[tracing::instrument(skip(state))]
pub async fn purchase<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
    Path(id): Path<i64>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseRecord>), ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    let coupon = req
        .coupon
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());
    let record = state
        .purchases
        .purchase(&identity, ProductId::new(id), coupon)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
