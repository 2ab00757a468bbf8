//! HTTP route handlers.

pub mod coupons;
pub mod health;
pub mod metrics;
pub mod products;
