use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Coupon, CouponId, NewCoupon, ProductGrant, ProductId, RedemptionRecord, Result, UsedCoupon,
    UserGrant, UserId,
};

/// Core trait for coupon persistence.
///
/// Implementations are shared between concurrently running service
/// instances, so every counter mutation must be atomic at the storage level.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Inserts a coupon and, for scoped coupons, its grant row in one
    /// transaction. Returns the new coupon id.
    ///
    /// Fails with `DuplicateCode` if the code is already taken.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponId>;

    /// Deletes a coupon and its grants. Redemption history is kept.
    ///
    /// Fails with `CouponIdNotFound` if no row was affected.
    async fn delete_coupon(&self, id: CouponId) -> Result<()>;

    /// Loads a coupon by its code. Fails with `CouponNotFound`.
    async fn get_by_code(&self, code: &str) -> Result<Coupon>;

    async fn get_user_grant(&self, coupon_id: CouponId, user_id: UserId)
    -> Result<Option<UserGrant>>;

    async fn get_product_grant(
        &self,
        coupon_id: CouponId,
        product_id: ProductId,
    ) -> Result<Option<ProductGrant>>;

    /// Appends a redemption record without touching any counter.
    async fn insert_redemption(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord>;

    /// Consumes one use of `coupon` and records it.
    ///
    /// The counter of the coupon's scope is incremented only while
    /// `used < total`, and the redemption record is inserted in the same
    /// transaction. Fails with `QuotaExhausted` when the bound is reached,
    /// `GrantNotFound` when a scoped coupon has no grant for the subject, and
    /// `MissingSubject` when a product-scoped coupon is redeemed without a
    /// product id.
    async fn redeem(
        &self,
        coupon: &Coupon,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord>;

    /// Lists the coupons a user has redeemed, oldest first.
    async fn list_used_by_user(&self, user_id: UserId) -> Result<Vec<UsedCoupon>>;
}
