//! Product purchase saga.
//!
//! A purchase spans two independently owned resources: the local purchase
//! record and the coupon component's usage counters. The orchestrator
//! writes the record inside a local transaction and redeems the coupon
//! remotely before committing.
//!
//! ```text
//! Validating ──► EligibilityChecked ──► Reserving ──► Redeeming ──► Committed
//!      └──────────────┴──────────────────────┴─────────────┴──────► Failed
//! ```

pub mod client;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use client::{ClientError, CouponClient, HttpCouponClient, LocalCouponClient};
pub use error::PurchaseError;
pub use model::{NewPurchase, Product, PurchaseRecord};
pub use orchestrator::{PurchaseOrchestrator, discounted_price};
pub use state::PurchaseState;
pub use store::{
    InMemoryProductStore, PostgresProductStore, ProductStore, ProductStoreError, PurchaseTx,
};
