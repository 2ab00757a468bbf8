use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, ProductId};
use tokio::sync::RwLock;

use super::{ProductStore, ProductStoreError, PurchaseTx, Result};
use crate::model::{NewPurchase, Product, PurchaseRecord};

#[derive(Debug, Default)]
struct InMemoryState {
    products: HashMap<ProductId, Product>,
    purchases: Vec<PurchaseRecord>,
    next_product_id: i64,
    next_purchase_id: i64,
    fail_on_commit: bool,
}

/// In-memory product store for testing and single-process deployments.
///
/// Purchases written through a transaction are buffered and only appended
/// to the store on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product and returns its id.
    pub async fn add_product(&self, name: &str, price: Money) -> ProductId {
        let mut state = self.state.write().await;
        state.next_product_id += 1;
        let product = Product {
            id: ProductId::new(state.next_product_id),
            name: name.to_string(),
            price,
            created_at: Utc::now(),
        };
        let id = product.id;
        state.products.insert(id, product);
        id
    }

    /// Configures every subsequent commit to fail.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Returns all committed purchases.
    pub async fn purchases(&self) -> Vec<PurchaseRecord> {
        self.state.read().await.purchases.clone()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create_product(&self, name: &str, price: Money) -> Result<Product> {
        let id = self.add_product(name, price).await;
        self.get_product(id).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.state
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or(ProductStoreError::ProductNotFound(id))
    }

    async fn begin(&self) -> Result<Box<dyn PurchaseTx>> {
        Ok(Box::new(InMemoryPurchaseTx {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }))
    }
}

struct InMemoryPurchaseTx {
    state: Arc<RwLock<InMemoryState>>,
    pending: Vec<PurchaseRecord>,
}

#[async_trait]
impl PurchaseTx for InMemoryPurchaseTx {
    async fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        let id = {
            let mut state = self.state.write().await;
            if !state.products.contains_key(&purchase.product_id) {
                return Err(ProductStoreError::ProductNotFound(purchase.product_id));
            }
            state.next_purchase_id += 1;
            state.next_purchase_id
        };
        let record = PurchaseRecord::from_new(id, purchase);
        self.pending.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_commit {
            return Err(ProductStoreError::CommitFailed(
                "simulated commit failure".to_string(),
            ));
        }
        state.purchases.extend(self.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
