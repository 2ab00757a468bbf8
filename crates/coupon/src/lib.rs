//! Coupon component.
//!
//! This crate owns coupon definitions and their usage counters:
//! - Eligibility checks, one per coupon scope, which never mutate state
//! - Redemption through the store's bounded atomic increment
//! - Admin-only creation and deletion behind an [`AccessPolicy`]
//! - Server-side coupon code generation

pub mod access;
pub mod code;
pub mod eligibility;
pub mod error;
pub mod service;

pub use access::{AccessPolicy, RolePolicy};
pub use code::{CODE_PREFIX, generate_code};
pub use eligibility::{CouponView, EligibilityRequest, check_eligibility};
pub use error::CouponError;
pub use service::{CouponService, CreateCoupon, CreatedCoupon};
