use async_trait::async_trait;
use chrono::Utc;
use common::{Money, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::{ProductStore, ProductStoreError, PurchaseTx, Result};
use crate::model::{NewPurchase, Product, PurchaseRecord};

/// PostgreSQL-backed product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the product schema migrations.
    ///
    /// Migrations recorded by other components sharing the database are
    /// ignored.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("../../migrations/product");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    /// Lists a user's committed purchases, oldest first.
    pub async fn purchases_for_user(&self, user_id: UserId) -> Result<Vec<PurchaseRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, user_id, price_cents, discounted_cents, total_cents,
                   apply_coupon, created_at
            FROM purchased_products
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PurchaseRecord {
                    id: row.try_get("id")?,
                    product_id: ProductId::new(row.try_get("product_id")?),
                    user_id: UserId::new(row.try_get("user_id")?),
                    price: Money::from_cents(row.try_get("price_cents")?),
                    discounted_price: Money::from_cents(row.try_get("discounted_cents")?),
                    total: Money::from_cents(row.try_get("total_cents")?),
                    coupon: row.try_get("apply_coupon")?,
                    purchased_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn create_product(&self, name: &str, price: Money) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, price_cents, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, name, price_cents, created_at
            "#,
        )
        .bind(name)
        .bind(price.cents())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Self::row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Product> {
        let row = sqlx::query("SELECT id, name, price_cents, created_at FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ProductStoreError::ProductNotFound(id))?;
        Self::row_to_product(row)
    }

    async fn begin(&self) -> Result<Box<dyn PurchaseTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresPurchaseTx { tx }))
    }
}

struct PostgresPurchaseTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PurchaseTx for PostgresPurchaseTx {
    async fn insert_purchase(&mut self, purchase: NewPurchase) -> Result<PurchaseRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO purchased_products
                (product_id, user_id, price_cents, discounted_cents, total_cents, apply_coupon, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(purchase.product_id.as_i64())
        .bind(purchase.user_id.as_i64())
        .bind(purchase.price.cents())
        .bind(purchase.discounted_price.cents())
        .bind(purchase.total.cents())
        .bind(purchase.coupon.as_deref())
        .bind(purchase.purchased_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e
                && db.is_foreign_key_violation()
            {
                return ProductStoreError::ProductNotFound(purchase.product_id);
            }
            ProductStoreError::Database(e)
        })?;

        Ok(PurchaseRecord::from_new(row.try_get("id")?, purchase))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| ProductStoreError::CommitFailed(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
