//! Product persistence and the local purchase transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use common::{Money, ProductId};
use thiserror::Error;

use crate::model::{NewPurchase, Product, PurchaseRecord};

pub use memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;

/// Errors that can occur when interacting with the product store.
#[derive(Debug, Error)]
pub enum ProductStoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The transaction could not be committed.
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for product store operations.
pub type Result<T> = std::result::Result<T, ProductStoreError>;

/// Core trait for product persistence.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create_product(&self, name: &str, price: Money) -> Result<Product>;

    /// Loads a product. Fails with `ProductNotFound`.
    async fn get_product(&self, id: ProductId) -> Result<Product>;

    /// Opens a local transaction for writing a purchase.
    async fn begin(&self) -> Result<Box<dyn PurchaseTx>>;
}

/// An open local transaction.
///
/// Nothing written through it is visible until [`PurchaseTx::commit`].
/// Dropping it without committing discards the writes.
#[async_trait]
pub trait PurchaseTx: Send {
    async fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
