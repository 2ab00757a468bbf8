use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Coupon, CouponId, CouponScope, CouponStore, NewCoupon, ProductGrant, ProductId,
    RedemptionRecord, Result, ScopeKind, StoreError, Usage, UsedCoupon, UserGrant, UserId,
};

#[derive(Debug, Default)]
struct InMemoryState {
    coupons: HashMap<CouponId, Coupon>,
    codes: HashMap<String, CouponId>,
    user_grants: HashMap<(CouponId, UserId), UserGrant>,
    product_grants: HashMap<(CouponId, ProductId), ProductGrant>,
    redemptions: Vec<RedemptionRecord>,
    next_coupon_id: i64,
    next_redemption_id: i64,
    fail_on_redeem: bool,
}

impl InMemoryState {
    fn push_redemption(
        &mut self,
        coupon_id: CouponId,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> RedemptionRecord {
        self.next_redemption_id += 1;
        let record = RedemptionRecord {
            id: self.next_redemption_id,
            coupon_id,
            user_id,
            product_id,
            redeemed_at: at,
        };
        self.redemptions.push(record.clone());
        record
    }
}

/// In-memory coupon store for testing and single-process deployments.
///
/// Every operation runs under one write lock, which gives the same
/// check-and-increment atomicity the PostgreSQL store gets from its
/// conditional updates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryCouponStore {
    /// Creates a new empty in-memory coupon store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail redemptions with a database error.
    pub async fn set_fail_on_redeem(&self, fail: bool) {
        self.state.write().await.fail_on_redeem = fail;
    }

    /// Returns every redemption record, in insertion order.
    pub async fn redemptions(&self) -> Vec<RedemptionRecord> {
        self.state.read().await.redemptions.clone()
    }

    /// Returns the number of redemption records for a coupon.
    pub async fn redemption_count(&self, coupon_id: CouponId) -> usize {
        self.state
            .read()
            .await
            .redemptions
            .iter()
            .filter(|r| r.coupon_id == coupon_id)
            .count()
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponId> {
        coupon.validate()?;

        let mut state = self.state.write().await;
        if state.codes.contains_key(&coupon.code) {
            return Err(StoreError::DuplicateCode(coupon.code));
        }

        state.next_coupon_id += 1;
        let id = CouponId::new(state.next_coupon_id);

        let usage = match coupon.scope {
            CouponScope::Limited => Some(Usage::fresh(coupon.total)),
            CouponScope::PerUser { user_id } => {
                state.user_grants.insert(
                    (id, user_id),
                    UserGrant {
                        coupon_id: id,
                        user_id,
                        usage: Usage::fresh(coupon.total),
                    },
                );
                None
            }
            CouponScope::PerProduct { product_id } => {
                state.product_grants.insert(
                    (id, product_id),
                    ProductGrant {
                        coupon_id: id,
                        product_id,
                        usage: Usage::fresh(coupon.total),
                    },
                );
                None
            }
        };

        state.codes.insert(coupon.code.clone(), id);
        state.coupons.insert(
            id,
            Coupon {
                id,
                code: coupon.code,
                valid_from: coupon.valid_from,
                valid_to: coupon.valid_to,
                discount: coupon.discount,
                scope: coupon.scope.kind(),
                usage,
                description: coupon.description,
                image_url: coupon.image_url,
                created_by: coupon.created_by,
                created_at: coupon.created_at,
                updated_at: None,
            },
        );

        Ok(id)
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<()> {
        let mut state = self.state.write().await;
        let coupon = state
            .coupons
            .remove(&id)
            .ok_or(StoreError::CouponIdNotFound(id))?;
        state.codes.remove(&coupon.code);
        state.user_grants.retain(|(coupon_id, _), _| *coupon_id != id);
        state.product_grants.retain(|(coupon_id, _), _| *coupon_id != id);
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Coupon> {
        let state = self.state.read().await;
        state
            .codes
            .get(code)
            .and_then(|id| state.coupons.get(id))
            .cloned()
            .ok_or_else(|| StoreError::CouponNotFound(code.to_string()))
    }

    async fn get_user_grant(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<Option<UserGrant>> {
        let state = self.state.read().await;
        Ok(state.user_grants.get(&(coupon_id, user_id)).copied())
    }

    async fn get_product_grant(
        &self,
        coupon_id: CouponId,
        product_id: ProductId,
    ) -> Result<Option<ProductGrant>> {
        let state = self.state.read().await;
        Ok(state.product_grants.get(&(coupon_id, product_id)).copied())
    }

    async fn insert_redemption(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        let mut state = self.state.write().await;
        Ok(state.push_redemption(coupon_id, user_id, product_id, at))
    }

    async fn redeem(
        &self,
        coupon: &Coupon,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        let mut state = self.state.write().await;

        if state.fail_on_redeem {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let usage = match coupon.scope {
            ScopeKind::Limited => state
                .coupons
                .get_mut(&coupon.id)
                .ok_or(StoreError::CouponIdNotFound(coupon.id))?
                .usage
                .as_mut()
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("limited coupon {} has no counters", coupon.id))
                })?,
            ScopeKind::User => {
                &mut state
                    .user_grants
                    .get_mut(&(coupon.id, user_id))
                    .ok_or_else(|| StoreError::GrantNotFound {
                        coupon_id: coupon.id,
                        subject: format!("user {user_id}"),
                    })?
                    .usage
            }
            ScopeKind::Product => {
                let product_id = product_id.ok_or(StoreError::MissingSubject("product"))?;
                &mut state
                    .product_grants
                    .get_mut(&(coupon.id, product_id))
                    .ok_or_else(|| StoreError::GrantNotFound {
                        coupon_id: coupon.id,
                        subject: format!("product {product_id}"),
                    })?
                    .usage
            }
        };

        if usage.is_exhausted() {
            return Err(StoreError::QuotaExhausted {
                coupon_id: coupon.id,
                scope: coupon.scope.to_string(),
            });
        }
        usage.used += 1;

        if coupon.scope == ScopeKind::Limited
            && let Some(stored) = state.coupons.get_mut(&coupon.id)
        {
            stored.updated_at = Some(at);
        }

        Ok(state.push_redemption(coupon.id, user_id, product_id, at))
    }

    async fn list_used_by_user(&self, user_id: UserId) -> Result<Vec<UsedCoupon>> {
        let state = self.state.read().await;
        let mut redemptions: Vec<_> = state
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        redemptions.sort_by_key(|r| (r.redeemed_at, r.id));

        Ok(redemptions
            .into_iter()
            .filter_map(|r| {
                state.coupons.get(&r.coupon_id).map(|c| UsedCoupon {
                    code: c.code.clone(),
                    description: c.description.clone(),
                    image_url: c.image_url.clone(),
                    applied_at: r.redeemed_at,
                })
            })
            .collect())
    }
}
