//! Product component data model.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub created_at: DateTime<Utc>,
}

/// A purchase about to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Listed price at the time of purchase.
    pub price: Money,
    /// Price after the coupon, before clamping at zero.
    pub discounted_price: Money,
    /// Amount charged, never negative.
    pub total: Money,
    pub coupon: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

/// A committed purchase. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: i64,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub price: Money,
    pub discounted_price: Money,
    pub total: Money,
    pub coupon: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn from_new(id: i64, purchase: NewPurchase) -> Self {
        Self {
            id,
            product_id: purchase.product_id,
            user_id: purchase.user_id,
            price: purchase.price,
            discounted_price: purchase.discounted_price,
            total: purchase.total,
            coupon: purchase.coupon,
            purchased_at: purchase.purchased_at,
        }
    }
}
