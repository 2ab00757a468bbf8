//! Coupon component error types.

use common::ErrorKind;
use coupon_store::StoreError;
use thiserror::Error;

/// Errors returned by the coupon component.
///
/// Every variant maps onto one [`ErrorKind`], which is what crosses the
/// service boundary.
#[derive(Debug, Error)]
pub enum CouponError {
    /// The coupon code or id does not exist.
    #[error("coupon not found: {0}")]
    NotFound(String),

    /// The coupon exists but cannot be used right now.
    #[error("unable to apply this coupon: {0}")]
    FailedPrecondition(String),

    /// The caller lacks the required capability.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The request is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage failure or inconsistent data.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CouponError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CouponError::NotFound(_) => ErrorKind::NotFound,
            CouponError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            CouponError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CouponError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CouponError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CouponError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CouponNotFound(code) => CouponError::NotFound(code),
            StoreError::CouponIdNotFound(id) => CouponError::NotFound(format!("id {id}")),
            e @ StoreError::QuotaExhausted { .. } => CouponError::FailedPrecondition(e.to_string()),
            e @ (StoreError::MissingSubject(_) | StoreError::InvalidCoupon(_)) => {
                CouponError::InvalidArgument(e.to_string())
            }
            e @ (StoreError::DuplicateCode(_)
            | StoreError::GrantNotFound { .. }
            | StoreError::Corrupt(_)
            | StoreError::Database(_)
            | StoreError::Migration(_)) => CouponError::Internal(e.to_string()),
        }
    }
}
