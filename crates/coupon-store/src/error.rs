use thiserror::Error;

use crate::CouponId;

/// Errors that can occur when interacting with the coupon store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No coupon carries the given code.
    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    /// No coupon row has the given id.
    #[error("Coupon not found: id {0}")]
    CouponIdNotFound(CouponId),

    /// The generated code collided with an existing coupon.
    #[error("Coupon code already exists: {0}")]
    DuplicateCode(String),

    /// The counter for the redeemed scope already reached its total.
    #[error("Coupon {coupon_id} has no remaining uses for {scope}")]
    QuotaExhausted { coupon_id: CouponId, scope: String },

    /// A scoped coupon has no grant row for the subject.
    ///
    /// Grants are written together with their coupon, so this indicates
    /// inconsistent data rather than an ineligible caller.
    #[error("Missing grant for coupon {coupon_id} and {subject}")]
    GrantNotFound { coupon_id: CouponId, subject: String },

    /// A scoped redemption was requested without its subject.
    #[error("Redemption of a {0}-scoped coupon requires a {0} id")]
    MissingSubject(&'static str),

    /// The coupon definition violates an invariant.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    /// A stored row could not be mapped back into the model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for coupon store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
