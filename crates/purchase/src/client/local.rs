//! In-process coupon client.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Identity, ProductId};
use coupon::{CouponError, CouponService, CouponView, EligibilityRequest};
use coupon_store::CouponStore;

use super::{ClientError, CouponClient};

/// Calls a co-located [`CouponService`] directly.
pub struct LocalCouponClient<S: CouponStore> {
    service: Arc<CouponService<S>>,
}

impl<S: CouponStore> LocalCouponClient<S> {
    pub fn new(service: Arc<CouponService<S>>) -> Self {
        Self { service }
    }
}

impl<S: CouponStore> Clone for LocalCouponClient<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl From<CouponError> for ClientError {
    fn from(e: CouponError) -> Self {
        ClientError::new(e.kind(), e.to_string())
    }
}

#[async_trait]
impl<S: CouponStore> CouponClient for LocalCouponClient<S> {
    async fn check_eligibility(
        &self,
        code: &str,
        request: EligibilityRequest,
    ) -> Result<CouponView, ClientError> {
        Ok(self.service.retrieve_coupon_by_code(code, request).await?)
    }

    async fn redeem(
        &self,
        identity: &Identity,
        code: &str,
        product_id: Option<ProductId>,
    ) -> Result<(), ClientError> {
        self.service
            .apply_coupon(identity, code, product_id)
            .await?;
        Ok(())
    }
}
