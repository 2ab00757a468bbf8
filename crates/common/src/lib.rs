//! Types shared by the coupon and product components.
//!
//! Nothing in here touches storage: the two components never share a
//! database, only these value types and the error classification that
//! travels across the service boundary.

pub mod discount;
pub mod error;
pub mod identity;
pub mod ids;
pub mod money;

pub use discount::{DiscountKind, DiscountRule};
pub use error::ErrorKind;
pub use identity::{Identity, Role};
pub use ids::{CouponId, ProductId, UserId};
pub use money::Money;
