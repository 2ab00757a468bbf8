//! Boundary to the coupon component.
//!
//! The orchestrator only sees [`CouponClient`]. Whether the coupon
//! component runs in-process or behind HTTP, its failures arrive as a
//! [`ClientError`] carrying the remote [`ErrorKind`] unchanged.

pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use common::{ErrorKind, Identity, ProductId};
use coupon::{CouponView, EligibilityRequest};
use thiserror::Error;

pub use http::HttpCouponClient;
pub use local::LocalCouponClient;

/// A classified failure of a coupon component call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("coupon service ({kind}): {message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Trait for calls into the coupon component.
#[async_trait]
pub trait CouponClient: Send + Sync {
    /// Looks up `code` and evaluates it for the given subject.
    async fn check_eligibility(
        &self,
        code: &str,
        request: EligibilityRequest,
    ) -> Result<CouponView, ClientError>;

    /// Consumes one use of `code` on behalf of `identity`.
    async fn redeem(
        &self,
        identity: &Identity,
        code: &str,
        product_id: Option<ProductId>,
    ) -> Result<(), ClientError>;
}

#[async_trait]
impl<T: CouponClient + ?Sized> CouponClient for Arc<T> {
    async fn check_eligibility(
        &self,
        code: &str,
        request: EligibilityRequest,
    ) -> Result<CouponView, ClientError> {
        (**self).check_eligibility(code, request).await
    }

    async fn redeem(
        &self,
        identity: &Identity,
        code: &str,
        product_id: Option<ProductId>,
    ) -> Result<(), ClientError> {
        (**self).redeem(identity, code, product_id).await
    }
}
