//! Purchase error types.

use common::{ErrorKind, ProductId};
use thiserror::Error;

use crate::client::ClientError;
use crate::state::PurchaseState;
use crate::store::ProductStoreError;

/// Errors that can occur while purchasing a product.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// The product does not exist.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// The coupon component rejected a call. Its classification is kept.
    #[error("{0}")]
    Coupon(#[from] ClientError),

    /// The coupon exists but its eligibility check came back negative.
    #[error("unable to apply this coupon: {0}")]
    CouponNotUsable(String),

    /// The local product store failed.
    #[error("product store error: {0}")]
    Store(#[from] ProductStoreError),

    /// The coupon was redeemed but the purchase was not committed.
    #[error("coupon {code} was redeemed but the purchase could not be committed: {reason}")]
    OrphanedRedemption { code: String, reason: String },

    /// The attempt tried to move through the state machine out of order.
    #[error("invalid purchase state transition: {from} -> {to}")]
    InvalidState {
        from: PurchaseState,
        to: PurchaseState,
    },
}

impl PurchaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PurchaseError::ProductNotFound(_) => ErrorKind::NotFound,
            PurchaseError::Coupon(e) => e.kind,
            PurchaseError::CouponNotUsable(_) => ErrorKind::FailedPrecondition,
            PurchaseError::Store(ProductStoreError::ProductNotFound(_)) => ErrorKind::NotFound,
            PurchaseError::Store(_)
            | PurchaseError::OrphanedRedemption { .. }
            | PurchaseError::InvalidState { .. } => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for purchase results.
pub type Result<T> = std::result::Result<T, PurchaseError>;
