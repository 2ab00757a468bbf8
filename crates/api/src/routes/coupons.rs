//! Coupon component endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use coupon::{CouponView, CreateCoupon, CreatedCoupon, EligibilityRequest};
use coupon_store::{CouponId, CouponStore, ProductId, UsedCoupon, UserId};
use purchase::ProductStore;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct RetrieveParams {
    #[serde(default)]
    pub check_use: bool,
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

// -- Handlers --

/// POST /coupons — create a coupon (admin only).
#[tracing::instrument(skip(state, req))]
pub async fn create<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
    Json(req): Json<CreateCoupon>,
) -> Result<(StatusCode, Json<CreatedCoupon>), ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    let created = state.coupons.create_coupon(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /coupons/{id} — delete a coupon and its grants (admin only).
#[tracing::instrument(skip(state))]
pub async fn delete<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    state
        .coupons
        .delete_coupon(&identity, CouponId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /coupons/{code} — look a coupon up, optionally checking usability.
#[tracing::instrument(skip(state))]
pub async fn retrieve<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Path(code): Path<String>,
    Query(params): Query<RetrieveParams>,
) -> Result<Json<CouponView>, ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    let request = EligibilityRequest {
        user_id: params.user_id,
        product_id: params.product_id,
        enforce: params.check_use,
    };
    let view = state.coupons.retrieve_coupon_by_code(&code, request).await?;
    Ok(Json(view))
}

/// POST /coupons/{code}/apply — consume one use for the caller.
#[tracing::instrument(skip(state, req))]
pub async fn apply<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
    Path(code): Path<String>,
    Json(req): Json<ApplyRequest>,
) -> Result<StatusCode, ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    state
        .coupons
        .apply_coupon(&identity, &code, req.product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /coupons/used — the caller's redemption history.
#[tracing::instrument(skip(state))]
pub async fn list_used<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<UsedCoupon>>, ApiError>
where
    S: CouponStore + 'static,
    P: ProductStore + 'static,
{
    Ok(Json(state.coupons.list_used_coupons(&identity).await?))
}
