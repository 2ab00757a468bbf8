//! Coupon component service.

use chrono::{DateTime, Utc};
use common::{Identity, ProductId};
use coupon_store::{
    CouponId, CouponScope, CouponStore, DiscountRule, NewCoupon, RedemptionRecord, StoreError,
    UsedCoupon,
};
use serde::{Deserialize, Serialize};

use crate::access::{AccessPolicy, RolePolicy};
use crate::code::{CODE_PREFIX, generate_code};
use crate::eligibility::{CouponView, EligibilityRequest, check_eligibility};
use crate::error::CouponError;

/// Attempts at finding an unused generated code before giving up.
const MAX_CODE_ATTEMPTS: usize = 3;

/// Admin request to create a coupon. The code is generated server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCoupon {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub discount: DiscountRule,
    pub scope: CouponScope,
    pub total: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCoupon {
    pub id: CouponId,
    pub code: String,
}

/// Service for the coupon component.
///
/// Wraps a [`CouponStore`] with access control, eligibility checks and
/// bounded redemption. Cheap to share behind an `Arc`.
pub struct CouponService<S: CouponStore, P: AccessPolicy = RolePolicy> {
    store: S,
    policy: P,
}

impl<S: CouponStore> CouponService<S> {
    /// Creates a service that treats `admin` and `super_admin` as admins.
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RolePolicy)
    }
}

impl<S: CouponStore, P: AccessPolicy> CouponService<S, P> {
    pub fn with_policy(store: S, policy: P) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_admin(&self, identity: &Identity) -> Result<(), CouponError> {
        if self.policy.is_admin(identity) {
            Ok(())
        } else {
            Err(CouponError::PermissionDenied(
                "user doesn't have permission".to_string(),
            ))
        }
    }

    /// Creates a coupon and its scope grant. Admin only.
    ///
    /// A generated code that collides with an existing one is replaced and
    /// retried a bounded number of times.
    #[tracing::instrument(skip(self, request), fields(user_id = %identity.user_id))]
    pub async fn create_coupon(
        &self,
        identity: &Identity,
        request: CreateCoupon,
    ) -> Result<CreatedCoupon, CouponError> {
        self.require_admin(identity)?;

        let now = Utc::now();
        let mut coupon = NewCoupon {
            code: generate_code(CODE_PREFIX, now),
            valid_from: request.valid_from,
            valid_to: request.valid_to,
            discount: request.discount,
            scope: request.scope,
            total: request.total,
            description: request.description,
            image_url: request.image_url,
            created_by: identity.user_id,
            created_at: now,
        };
        coupon.validate()?;

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            match self.store.create_coupon(coupon.clone()).await {
                Ok(id) => {
                    metrics::counter!("coupon_created_total").increment(1);
                    tracing::info!(%id, code = %coupon.code, scope = %coupon.scope.kind(), "coupon created");
                    return Ok(CreatedCoupon {
                        id,
                        code: coupon.code,
                    });
                }
                Err(StoreError::DuplicateCode(code)) => {
                    tracing::warn!(%code, attempt, "generated coupon code already taken");
                    coupon.code = generate_code(CODE_PREFIX, now);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CouponError::Internal(
            "unable to generate a unique coupon code".to_string(),
        ))
    }

    /// Deletes a coupon and its grants. Admin only.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn delete_coupon(&self, identity: &Identity, id: CouponId) -> Result<(), CouponError> {
        self.require_admin(identity)?;
        self.store.delete_coupon(id).await?;
        tracing::info!(%id, "coupon deleted");
        Ok(())
    }

    /// Looks a coupon up by code and reports whether it can be used now.
    ///
    /// With `request.enforce == false` this is a display lookup and
    /// `can_use` is always true.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_coupon_by_code(
        &self,
        code: &str,
        request: EligibilityRequest,
    ) -> Result<CouponView, CouponError> {
        let view = check_eligibility(&self.store, code, &request, Utc::now()).await?;
        if request.enforce {
            metrics::counter!(
                "coupon_eligibility_checks_total",
                "eligible" => view.can_use.to_string()
            )
            .increment(1);
        }
        Ok(view)
    }

    /// Consumes one use of `code` for the caller.
    ///
    /// The scope's counter is incremented only while it is below its total,
    /// in the same storage operation that records the redemption. There is
    /// no idempotency key: two calls consume two uses.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn apply_coupon(
        &self,
        identity: &Identity,
        code: &str,
        product_id: Option<ProductId>,
    ) -> Result<RedemptionRecord, CouponError> {
        let coupon = self.store.get_by_code(code).await?;

        let now = Utc::now();
        if !coupon.is_active_at(now) {
            metrics::counter!("coupon_redemptions_rejected_total", "reason" => "inactive")
                .increment(1);
            return Err(CouponError::FailedPrecondition(format!(
                "coupon {code} is outside its validity window"
            )));
        }

        match self
            .store
            .redeem(&coupon, identity.user_id, product_id, now)
            .await
        {
            Ok(record) => {
                metrics::counter!("coupon_redemptions_total").increment(1);
                tracing::info!(coupon_id = %coupon.id, redemption_id = record.id, "coupon redeemed");
                Ok(record)
            }
            Err(e) => {
                let error = CouponError::from(e);
                metrics::counter!(
                    "coupon_redemptions_rejected_total",
                    "reason" => error.kind().as_str()
                )
                .increment(1);
                tracing::warn!(coupon_id = %coupon.id, error = %error, "coupon redemption rejected");
                Err(error)
            }
        }
    }

    /// Lists the coupons the caller has redeemed, oldest first.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn list_used_coupons(&self, identity: &Identity) -> Result<Vec<UsedCoupon>, CouponError> {
        Ok(self.store.list_used_by_user(identity.user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use common::UserId;
    use coupon_store::{InMemoryCouponStore, Money};

    use super::*;

    fn request(scope: CouponScope, total: i64) -> CreateCoupon {
        let now = Utc::now();
        CreateCoupon {
            valid_from: now - Duration::hours(1),
            valid_to: now + Duration::hours(1),
            discount: DiscountRule::Percent(20),
            scope,
            total,
            description: Some("twenty off".to_string()),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn create_requires_admin() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let result = service
            .create_coupon(&Identity::user(1), request(CouponScope::Limited, 1))
            .await;
        assert!(matches!(result, Err(CouponError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn create_generates_prefixed_code() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let created = service
            .create_coupon(&Identity::admin(1), request(CouponScope::Limited, 1))
            .await
            .unwrap();
        assert!(created.code.starts_with(CODE_PREFIX));

        let coupon = service.store().get_by_code(&created.code).await.unwrap();
        assert_eq!(coupon.id, created.id);
        assert_eq!(coupon.created_by, UserId::new(1));
    }

    #[tokio::test]
    async fn create_rejects_invalid_window() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let mut req = request(CouponScope::Limited, 1);
        req.valid_to = req.valid_from;
        let result = service.create_coupon(&Identity::admin(1), req).await;
        assert!(matches!(result, Err(CouponError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn delete_requires_admin_and_existing_coupon() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let created = service
            .create_coupon(&Identity::admin(1), request(CouponScope::Limited, 1))
            .await
            .unwrap();

        let denied = service.delete_coupon(&Identity::user(2), created.id).await;
        assert!(matches!(denied, Err(CouponError::PermissionDenied(_))));

        service
            .delete_coupon(&Identity::admin(1), created.id)
            .await
            .unwrap();
        let missing = service.delete_coupon(&Identity::admin(1), created.id).await;
        assert!(matches!(missing, Err(CouponError::NotFound(_))));
    }

    #[tokio::test]
    async fn apply_unknown_code_is_not_found() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let result = service.apply_coupon(&Identity::user(1), "NOPE", None).await;
        assert!(matches!(result, Err(CouponError::NotFound(_))));
    }

    #[tokio::test]
    async fn apply_past_quota_is_failed_precondition() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let created = service
            .create_coupon(&Identity::admin(1), request(CouponScope::Limited, 1))
            .await
            .unwrap();

        service
            .apply_coupon(&Identity::user(2), &created.code, None)
            .await
            .unwrap();
        let second = service
            .apply_coupon(&Identity::user(3), &created.code, None)
            .await;
        assert!(matches!(second, Err(CouponError::FailedPrecondition(_))));
    }

    #[tokio::test]
    async fn apply_expired_coupon_is_failed_precondition() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let mut req = request(CouponScope::Limited, 5);
        req.valid_from = Utc::now() - Duration::days(2);
        req.valid_to = Utc::now() - Duration::days(1);
        let created = service
            .create_coupon(&Identity::admin(1), req)
            .await
            .unwrap();

        let result = service
            .apply_coupon(&Identity::user(2), &created.code, None)
            .await;
        assert!(matches!(result, Err(CouponError::FailedPrecondition(_))));
        assert_eq!(service.store().redemption_count(created.id).await, 0);
    }

    #[tokio::test]
    async fn list_used_coupons_returns_callers_history() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let created = service
            .create_coupon(&Identity::admin(1), request(CouponScope::Limited, 5))
            .await
            .unwrap();
        service
            .apply_coupon(&Identity::user(2), &created.code, None)
            .await
            .unwrap();

        let used = service.list_used_coupons(&Identity::user(2)).await.unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].code, created.code);
        assert_eq!(used[0].description.as_deref(), Some("twenty off"));
        assert!(
            service
                .list_used_coupons(&Identity::user(3))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn fixed_value_discount_survives_creation() {
        let service = CouponService::new(InMemoryCouponStore::new());
        let mut req = request(CouponScope::Limited, 1);
        req.discount = DiscountRule::FixedValue(Money::from_dollars(50));
        let created = service
            .create_coupon(&Identity::admin(1), req.clone())
            .await
            .unwrap();

        let view = service
            .retrieve_coupon_by_code(&created.code, EligibilityRequest::lookup())
            .await
            .unwrap();
        assert_eq!(view.discount, req.discount);
        assert_eq!(view.valid_from, req.valid_from);
        assert_eq!(view.valid_to, req.valid_to);
    }
}
