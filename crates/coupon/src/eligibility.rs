//! Read-only coupon eligibility checks.
//!
//! A positive result is not a reservation. Two callers can both see
//! `can_use = true` for the last remaining use; the store's bounded
//! redemption decides which of them gets it.

use chrono::{DateTime, Utc};
use coupon_store::{Coupon, CouponStore, DiscountRule, ProductId, ScopeKind, Usage, UserId};
use serde::{Deserialize, Serialize};

use crate::CouponError;

/// Who is asking and whether checks are enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub user_id: Option<UserId>,
    pub product_id: Option<ProductId>,
    /// When false, every check is skipped and `can_use` is always true.
    pub enforce: bool,
}

impl EligibilityRequest {
    /// Display-only lookup.
    pub fn lookup() -> Self {
        Self::default()
    }

    /// Full check on behalf of `user_id`, optionally for a product.
    pub fn enforce_for(user_id: UserId, product_id: Option<ProductId>) -> Self {
        Self {
            user_id: Some(user_id),
            product_id,
            enforce: true,
        }
    }
}

/// A coupon as seen by a caller, with the outcome of the check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponView {
    pub code: String,
    pub discount: DiscountRule,
    pub scope: ScopeKind,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    /// Counters governing the caller: the global pair for limited coupons,
    /// the grant for scoped ones. `None` when no grant was looked up.
    pub usage: Option<Usage>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub can_use: bool,
}

impl CouponView {
    fn new(coupon: Coupon, usage: Option<Usage>, can_use: bool) -> Self {
        Self {
            code: coupon.code,
            discount: coupon.discount,
            scope: coupon.scope,
            valid_from: coupon.valid_from,
            valid_to: coupon.valid_to,
            usage,
            description: coupon.description,
            image_url: coupon.image_url,
            can_use,
        }
    }
}

/// Resolves `code` and evaluates whether it may be used at `now`.
///
/// Checks run in order and the first failing one yields `can_use = false`:
/// the validity window, then the counter of the coupon's scope. An unknown
/// code is `NotFound`. A scoped coupon without a grant for the subject is
/// `Internal`, since grants are written together with their coupon.
#[tracing::instrument(skip(store))]
pub async fn check_eligibility<S: CouponStore + ?Sized>(
    store: &S,
    code: &str,
    request: &EligibilityRequest,
    now: DateTime<Utc>,
) -> Result<CouponView, CouponError> {
    let coupon = store.get_by_code(code).await?;

    if !request.enforce {
        let usage = lookup_usage(store, &coupon, request).await?;
        return Ok(CouponView::new(coupon, usage, true));
    }

    if !coupon.is_active_at(now) {
        tracing::debug!(code, %now, "coupon outside its validity window");
        let usage = coupon.usage;
        return Ok(CouponView::new(coupon, usage, false));
    }

    let usage = match coupon.scope {
        ScopeKind::Limited => check_limited(&coupon)?,
        ScopeKind::User => check_user(store, &coupon, request.user_id).await?,
        ScopeKind::Product => check_product(store, &coupon, request.product_id).await?,
    };

    let can_use = !usage.is_exhausted();
    if !can_use {
        tracing::debug!(code, used = usage.used, total = usage.total, "coupon exhausted");
    }
    Ok(CouponView::new(coupon, Some(usage), can_use))
}

fn check_limited(coupon: &Coupon) -> Result<Usage, CouponError> {
    coupon.usage.ok_or_else(|| {
        CouponError::Internal(format!("limited coupon {} has no counters", coupon.id))
    })
}

async fn check_user<S: CouponStore + ?Sized>(
    store: &S,
    coupon: &Coupon,
    user_id: Option<UserId>,
) -> Result<Usage, CouponError> {
    let user_id = user_id.ok_or_else(|| {
        CouponError::InvalidArgument("per-user coupon check requires a user id".to_string())
    })?;
    let grant = store
        .get_user_grant(coupon.id, user_id)
        .await?
        .ok_or_else(|| {
            CouponError::Internal(format!(
                "coupon {} has no grant for user {user_id}",
                coupon.id
            ))
        })?;
    Ok(grant.usage)
}

async fn check_product<S: CouponStore + ?Sized>(
    store: &S,
    coupon: &Coupon,
    product_id: Option<ProductId>,
) -> Result<Usage, CouponError> {
    let product_id = product_id.ok_or_else(|| {
        CouponError::InvalidArgument("per-product coupon check requires a product id".to_string())
    })?;
    let grant = store
        .get_product_grant(coupon.id, product_id)
        .await?
        .ok_or_else(|| {
            CouponError::Internal(format!(
                "coupon {} has no grant for product {product_id}",
                coupon.id
            ))
        })?;
    Ok(grant.usage)
}

/// Counters to show on a lookup. Missing grants are not an error here.
async fn lookup_usage<S: CouponStore + ?Sized>(
    store: &S,
    coupon: &Coupon,
    request: &EligibilityRequest,
) -> Result<Option<Usage>, CouponError> {
    let usage = match (coupon.scope, request.user_id, request.product_id) {
        (ScopeKind::Limited, _, _) => coupon.usage,
        (ScopeKind::User, Some(user_id), _) => store
            .get_user_grant(coupon.id, user_id)
            .await?
            .map(|g| g.usage),
        (ScopeKind::Product, _, Some(product_id)) => store
            .get_product_grant(coupon.id, product_id)
            .await?
            .map(|g| g.usage),
        _ => None,
    };
    Ok(usage)
}
