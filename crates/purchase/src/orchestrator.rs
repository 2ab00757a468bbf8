//! Purchase orchestrator.

use std::time::Instant;

use chrono::Utc;
use common::{DiscountRule, Identity, Money, ProductId};
use coupon::EligibilityRequest;

use crate::client::CouponClient;
use crate::error::PurchaseError;
use crate::model::{NewPurchase, PurchaseRecord};
use crate::state::PurchaseState;
use crate::store::{ProductStore, ProductStoreError, PurchaseTx};

/// Price of a product after applying `rule`.
///
/// A percent rule yields `price * percent / 100`. A fixed-value rule yields
/// the value itself, replacing the price rather than subtracting from it.
pub fn discounted_price(price: Money, rule: &DiscountRule) -> Money {
    match rule {
        DiscountRule::Percent(percent) => price.percent(*percent),
        DiscountRule::FixedValue(value) => *value,
    }
}

/// Runs the purchase saga.
///
/// The saga has one compensable step, the local purchase record, and one
/// uncompensated step, the remote coupon redemption:
///
/// 1. load the product and, with a coupon, check eligibility remotely
/// 2. open a local transaction and insert the purchase record
/// 3. redeem the coupon remotely; on failure roll the transaction back
/// 4. commit
///
/// If step 4 fails after step 3 succeeded, the redemption is orphaned. It is
/// logged with `orphaned_redemption = true` and counted, and the caller gets
/// an `Internal` error.
pub struct PurchaseOrchestrator<P, C>
where
    P: ProductStore,
    C: CouponClient,
{
    products: P,
    coupons: C,
}

impl<P, C> PurchaseOrchestrator<P, C>
where
    P: ProductStore,
    C: CouponClient,
{
    pub fn new(products: P, coupons: C) -> Self {
        Self { products, coupons }
    }

    pub fn products(&self) -> &P {
        &self.products
    }

    pub fn coupons(&self) -> &C {
        &self.coupons
    }

    /// Purchases `product_id` for the caller, optionally with a coupon.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    pub async fn purchase(
        &self,
        identity: &Identity,
        product_id: ProductId,
        coupon: Option<&str>,
    ) -> Result<PurchaseRecord, PurchaseError> {
        metrics::counter!("purchase_attempts_total").increment(1);
        let started = Instant::now();

        let mut state = PurchaseState::default();
        let result = self.run(&mut state, identity, product_id, coupon).await;

        metrics::histogram!("purchase_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(record) => {
                metrics::counter!("purchase_completed_total").increment(1);
                tracing::info!(
                    purchase_id = record.id,
                    total = %record.total,
                    coupon = record.coupon.as_deref(),
                    "purchase committed"
                );
            }
            Err(e) => {
                let failed_in = mark_failed(&mut state);
                metrics::counter!("purchase_failed_total", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(%failed_in, kind = %e.kind(), error = %e, "purchase failed");
            }
        }
        result
    }

    async fn run(
        &self,
        state: &mut PurchaseState,
        identity: &Identity,
        product_id: ProductId,
        coupon: Option<&str>,
    ) -> Result<PurchaseRecord, PurchaseError> {
        let product = self
            .products
            .get_product(product_id)
            .await
            .map_err(|e| match e {
                ProductStoreError::ProductNotFound(id) => PurchaseError::ProductNotFound(id),
                e => e.into(),
            })?;

        let mut discounted = product.price;
        if let Some(code) = coupon {
            let view = self
                .coupons
                .check_eligibility(
                    code,
                    EligibilityRequest::enforce_for(identity.user_id, Some(product_id)),
                )
                .await?;
            if !view.can_use {
                return Err(PurchaseError::CouponNotUsable(code.to_string()));
            }
            discounted = discounted_price(product.price, &view.discount);
        }
        advance(state, PurchaseState::EligibilityChecked)?;

        let mut tx = self.products.begin().await?;
        advance(state, PurchaseState::Reserving)?;

        let purchase = NewPurchase {
            product_id,
            user_id: identity.user_id,
            price: product.price,
            discounted_price: discounted,
            total: discounted.non_negative(),
            coupon: coupon.map(str::to_string),
            purchased_at: Utc::now(),
        };
        let record = match tx.insert_purchase(purchase).await {
            Ok(record) => record,
            Err(e) => {
                rollback(tx).await;
                return Err(e.into());
            }
        };

        if let Some(code) = coupon {
            advance(state, PurchaseState::Redeeming)?;
            if let Err(e) = self.coupons.redeem(identity, code, Some(product_id)).await {
                rollback(tx).await;
                return Err(e.into());
            }
        }

        if let Err(e) = tx.commit().await {
            return Err(match coupon {
                Some(code) => {
                    metrics::counter!("purchase_orphaned_redemptions_total").increment(1);
                    tracing::error!(
                        orphaned_redemption = true,
                        coupon = code,
                        user_id = %identity.user_id,
                        %product_id,
                        error = %e,
                        "coupon redeemed but purchase commit failed"
                    );
                    PurchaseError::OrphanedRedemption {
                        code: code.to_string(),
                        reason: e.to_string(),
                    }
                }
                None => e.into(),
            });
        }
        advance(state, PurchaseState::Committed)?;

        Ok(record)
    }
}

fn advance(state: &mut PurchaseState, next: PurchaseState) -> Result<(), PurchaseError> {
    if !state.can_transition_to(next) {
        return Err(PurchaseError::InvalidState {
            from: *state,
            to: next,
        });
    }
    tracing::debug!(from = %state, to = %next, "purchase state transition");
    *state = next;
    Ok(())
}

/// Moves a failed attempt to `Failed` and returns the state it failed in.
fn mark_failed(state: &mut PurchaseState) -> PurchaseState {
    let failed_in = *state;
    if let Err(e) = advance(state, PurchaseState::Failed) {
        tracing::error!(error = %e, "purchase could not be marked failed");
    }
    failed_in
}

async fn rollback(tx: Box<dyn PurchaseTx>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "purchase rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_recorded_with_the_state_it_happened_in() {
        for from in [
            PurchaseState::Validating,
            PurchaseState::EligibilityChecked,
            PurchaseState::Reserving,
            PurchaseState::Redeeming,
        ] {
            let mut state = from;
            assert_eq!(mark_failed(&mut state), from);
            assert_eq!(state, PurchaseState::Failed);
        }
    }

    #[test]
    fn terminal_state_is_left_alone_when_marked_failed() {
        let mut state = PurchaseState::Committed;
        assert_eq!(mark_failed(&mut state), PurchaseState::Committed);
        assert_eq!(state, PurchaseState::Committed);
    }

    #[test]
    fn percent_rule_yields_percentage_of_price() {
        let price = Money::from_dollars(100);
        assert_eq!(
            discounted_price(price, &DiscountRule::Percent(20)),
            Money::from_dollars(20)
        );
    }

    #[test]
    fn fixed_rule_replaces_price() {
        let price = Money::from_dollars(100);
        let rule = DiscountRule::FixedValue(Money::from_dollars(50));
        assert_eq!(discounted_price(price, &rule), Money::from_dollars(50));
    }

    #[test]
    fn fixed_rule_above_price_is_kept_as_is() {
        let price = Money::from_dollars(10);
        let rule = DiscountRule::FixedValue(Money::from_dollars(50));
        assert_eq!(discounted_price(price, &rule), Money::from_dollars(50));
    }

    #[test]
    fn advance_rejects_out_of_order_transition() {
        let mut state = PurchaseState::Validating;
        assert!(matches!(
            advance(&mut state, PurchaseState::Committed),
            Err(PurchaseError::InvalidState { .. })
        ));
        assert_eq!(state, PurchaseState::Validating);
    }
}
