//! Coupon component data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CouponId, ProductId, StoreError, UserId};

pub use common::{DiscountKind, DiscountRule};

/// Which dimension a coupon's usage is capped along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// One global counter on the coupon row.
    Limited,
    /// One counter per (coupon, user) grant.
    User,
    /// One counter per (coupon, product) grant.
    Product,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Limited => "LIMITED",
            ScopeKind::User => "USER",
            ScopeKind::Product => "PRODUCT",
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIMITED" => Ok(ScopeKind::Limited),
            "USER" => Ok(ScopeKind::User),
            "PRODUCT" => Ok(ScopeKind::Product),
            other => Err(StoreError::Corrupt(format!("unknown coupon scope: {other}"))),
        }
    }
}

/// Scope of a coupon being created, carrying the grant subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponScope {
    Limited,
    PerUser { user_id: UserId },
    PerProduct { product_id: ProductId },
}

impl CouponScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            CouponScope::Limited => ScopeKind::Limited,
            CouponScope::PerUser { .. } => ScopeKind::User,
            CouponScope::PerProduct { .. } => ScopeKind::Product,
        }
    }
}

/// A usage counter pair. `used <= total` always holds in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub used: i64,
    pub total: i64,
}

impl Usage {
    pub fn fresh(total: i64) -> Self {
        Self { used: 0, total }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.total
    }

    pub fn remaining(&self) -> i64 {
        (self.total - self.used).max(0)
    }
}

/// A stored coupon definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub discount: DiscountRule,
    pub scope: ScopeKind,
    /// Global counters, present only for [`ScopeKind::Limited`].
    pub usage: Option<Usage>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Returns true when `valid_from <= now < valid_to`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_to
    }
}

/// Input for creating a coupon together with its scope grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub discount: DiscountRule,
    pub scope: CouponScope,
    /// Quota for the scope's counter.
    pub total: i64,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewCoupon {
    /// Checks the invariants that storage also enforces.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.code.trim().is_empty() {
            return Err(StoreError::InvalidCoupon("code must not be empty".to_string()));
        }
        if self.valid_to <= self.valid_from {
            return Err(StoreError::InvalidCoupon(
                "validity window must end after it starts".to_string(),
            ));
        }
        // Must be readable back from its stored parts.
        DiscountRule::from_parts(self.discount.kind(), self.discount.value())
            .map_err(StoreError::InvalidCoupon)?;
        if self.total <= 0 {
            return Err(StoreError::InvalidCoupon(format!(
                "total must be positive, got {}",
                self.total
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrant {
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductGrant {
    pub coupon_id: CouponId,
    pub product_id: ProductId,
    pub usage: Usage,
}

/// One recorded use of a coupon. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    pub id: i64,
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub product_id: Option<ProductId>,
    pub redeemed_at: DateTime<Utc>,
}

/// A row of a user's redemption history joined with its coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedCoupon {
    pub code: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub applied_at: DateTime<Utc>,
}
