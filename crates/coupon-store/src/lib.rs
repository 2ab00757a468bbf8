pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{CouponId, Money, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryCouponStore;
pub use model::{
    Coupon, CouponScope, DiscountKind, DiscountRule, NewCoupon, ProductGrant, RedemptionRecord,
    ScopeKind, Usage, UsedCoupon, UserGrant,
};
pub use postgres::PostgresCouponStore;
pub use store::CouponStore;
