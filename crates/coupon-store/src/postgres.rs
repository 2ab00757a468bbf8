use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};

use crate::{
    Coupon, CouponId, CouponScope, CouponStore, DiscountKind, DiscountRule, NewCoupon,
    ProductGrant, ProductId, RedemptionRecord, Result, ScopeKind, StoreError, Usage, UsedCoupon,
    UserGrant, UserId,
};

const COUPON_COLUMNS: &str = "id, code, valid_from, valid_to, discount_type, discount_value, \
     scope, used, total, description, image_url, created_by, created_at, updated_at";

/// PostgreSQL-backed coupon store.
///
/// Usage counters are only ever changed through
/// `UPDATE ... SET used = used + 1 WHERE ... AND used < total`, so the bound
/// holds no matter how many service instances share the database.
#[derive(Clone)]
pub struct PostgresCouponStore {
    pool: PgPool,
}

impl PostgresCouponStore {
    /// Creates a new PostgreSQL coupon store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the coupon schema migrations.
    ///
    /// Migrations recorded by other components sharing the database are
    /// ignored.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        let mut migrator = sqlx::migrate!("../../migrations/coupon");
        migrator.set_ignore_missing(true);
        migrator.run(&self.pool).await
    }

    fn row_to_coupon(row: PgRow) -> Result<Coupon> {
        let kind: DiscountKind = row
            .try_get::<String, _>("discount_type")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let discount = DiscountRule::from_parts(kind, row.try_get("discount_value")?)
            .map_err(StoreError::Corrupt)?;
        let scope: ScopeKind = row.try_get::<String, _>("scope")?.parse()?;
        let total: Option<i64> = row.try_get("total")?;

        Ok(Coupon {
            id: CouponId::new(row.try_get("id")?),
            code: row.try_get("code")?,
            valid_from: row.try_get("valid_from")?,
            valid_to: row.try_get("valid_to")?,
            discount,
            scope,
            usage: match (scope, total) {
                (ScopeKind::Limited, Some(total)) => Some(Usage {
                    used: row.try_get("used")?,
                    total,
                }),
                _ => None,
            },
            description: row.try_get("description")?,
            image_url: row.try_get("image_url")?,
            created_by: UserId::new(row.try_get("created_by")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_usage(row: &PgRow) -> Result<Usage> {
        Ok(Usage {
            used: row.try_get("used")?,
            total: row.try_get("total")?,
        })
    }

    fn row_to_redemption(row: PgRow) -> Result<RedemptionRecord> {
        Ok(RedemptionRecord {
            id: row.try_get("id")?,
            coupon_id: CouponId::new(row.try_get("coupon_id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            product_id: row.try_get::<Option<i64>, _>("product_id")?.map(ProductId::new),
            redeemed_at: row.try_get("created_at")?,
        })
    }

    async fn insert_redemption_with<'e, E: PgExecutor<'e>>(
        executor: E,
        coupon_id: CouponId,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO used_coupons (coupon_id, user_id, product_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, coupon_id, user_id, product_id, created_at
            "#,
        )
        .bind(coupon_id.as_i64())
        .bind(user_id.as_i64())
        .bind(product_id.map(|p| p.as_i64()))
        .bind(at)
        .fetch_one(executor)
        .await?;

        Self::row_to_redemption(row)
    }

    /// Explains why a conditional counter update touched no row: the row is
    /// either exhausted or missing.
    async fn classify_rejected_redeem(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        coupon: &Coupon,
        user_id: UserId,
        product_id: Option<ProductId>,
    ) -> StoreError {
        let probe = match (coupon.scope, product_id) {
            (ScopeKind::Limited, _) => {
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM coupons WHERE id = $1)")
                    .bind(coupon.id.as_i64())
                    .fetch_one(&mut **tx)
                    .await
            }
            (ScopeKind::User, _) => sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM user_coupons WHERE coupon_id = $1 AND user_id = $2)",
            )
            .bind(coupon.id.as_i64())
            .bind(user_id.as_i64())
            .fetch_one(&mut **tx)
            .await,
            (ScopeKind::Product, Some(product_id)) => sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM product_coupons WHERE coupon_id = $1 AND product_id = $2)",
            )
            .bind(coupon.id.as_i64())
            .bind(product_id.as_i64())
            .fetch_one(&mut **tx)
            .await,
            (ScopeKind::Product, None) => return StoreError::MissingSubject("product"),
        };

        match probe {
            Ok(true) => StoreError::QuotaExhausted {
                coupon_id: coupon.id,
                scope: coupon.scope.to_string(),
            },
            Ok(false) => match (coupon.scope, product_id) {
                (ScopeKind::Limited, _) => StoreError::CouponIdNotFound(coupon.id),
                (ScopeKind::User, _) => StoreError::GrantNotFound {
                    coupon_id: coupon.id,
                    subject: format!("user {user_id}"),
                },
                (ScopeKind::Product, Some(product_id)) => StoreError::GrantNotFound {
                    coupon_id: coupon.id,
                    subject: format!("product {product_id}"),
                },
                (ScopeKind::Product, None) => StoreError::MissingSubject("product"),
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl CouponStore for PostgresCouponStore {
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<CouponId> {
        coupon.validate()?;

        let limited_total = match coupon.scope {
            CouponScope::Limited => Some(coupon.total),
            _ => None,
        };

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO coupons (code, valid_from, valid_to, discount_type, discount_value,
                                 scope, used, total, description, image_url, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.valid_from)
        .bind(coupon.valid_to)
        .bind(coupon.discount.kind().as_str())
        .bind(coupon.discount.value())
        .bind(coupon.scope.kind().as_str())
        .bind(limited_total)
        .bind(&coupon.description)
        .bind(&coupon.image_url)
        .bind(coupon.created_by.as_i64())
        .bind(coupon.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_coupon_code")
            {
                return StoreError::DuplicateCode(coupon.code.clone());
            }
            StoreError::Database(e)
        })?;

        match coupon.scope {
            CouponScope::Limited => {}
            CouponScope::PerUser { user_id } => {
                sqlx::query(
                    r#"
                    INSERT INTO user_coupons (coupon_id, user_id, used, total, created_by, created_at)
                    VALUES ($1, $2, 0, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(user_id.as_i64())
                .bind(coupon.total)
                .bind(coupon.created_by.as_i64())
                .bind(coupon.created_at)
                .execute(&mut *tx)
                .await?;
            }
            CouponScope::PerProduct { product_id } => {
                sqlx::query(
                    r#"
                    INSERT INTO product_coupons (coupon_id, product_id, used, total, created_by, created_at)
                    VALUES ($1, $2, 0, $3, $4, $5)
                    "#,
                )
                .bind(id)
                .bind(product_id.as_i64())
                .bind(coupon.total)
                .bind(coupon.created_by.as_i64())
                .bind(coupon.created_at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(CouponId::new(id))
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<()> {
        // Grants go with the coupon through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::CouponIdNotFound(id));
        }
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<Coupon> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Self::row_to_coupon(row),
            None => Err(StoreError::CouponNotFound(code.to_string())),
        }
    }

    async fn get_user_grant(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<Option<UserGrant>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT used, total FROM user_coupons WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id.as_i64())
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(UserGrant {
                coupon_id,
                user_id,
                usage: Self::row_to_usage(&row)?,
            })
        })
        .transpose()
    }

    async fn get_product_grant(
        &self,
        coupon_id: CouponId,
        product_id: ProductId,
    ) -> Result<Option<ProductGrant>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT used, total FROM product_coupons WHERE coupon_id = $1 AND product_id = $2",
        )
        .bind(coupon_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ProductGrant {
                coupon_id,
                product_id,
                usage: Self::row_to_usage(&row)?,
            })
        })
        .transpose()
    }

    async fn insert_redemption(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        Self::insert_redemption_with(&self.pool, coupon_id, user_id, product_id, at).await
    }

    async fn redeem(
        &self,
        coupon: &Coupon,
        user_id: UserId,
        product_id: Option<ProductId>,
        at: DateTime<Utc>,
    ) -> Result<RedemptionRecord> {
        let mut tx = self.pool.begin().await?;

        let affected = match coupon.scope {
            ScopeKind::Limited => sqlx::query(
                r#"
                UPDATE coupons SET used = used + 1, updated_at = $2
                WHERE id = $1 AND used < total
                "#,
            )
            .bind(coupon.id.as_i64())
            .bind(at)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            ScopeKind::User => sqlx::query(
                r#"
                UPDATE user_coupons SET used = used + 1, updated_at = $3
                WHERE coupon_id = $1 AND user_id = $2 AND used < total
                "#,
            )
            .bind(coupon.id.as_i64())
            .bind(user_id.as_i64())
            .bind(at)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            ScopeKind::Product => {
                let product_id = product_id.ok_or(StoreError::MissingSubject("product"))?;
                sqlx::query(
                    r#"
                    UPDATE product_coupons SET used = used + 1, updated_at = $3
                    WHERE coupon_id = $1 AND product_id = $2 AND used < total
                    "#,
                )
                .bind(coupon.id.as_i64())
                .bind(product_id.as_i64())
                .bind(at)
                .execute(&mut *tx)
                .await?
                .rows_affected()
            }
        };

        if affected == 0 {
            return Err(Self::classify_rejected_redeem(&mut tx, coupon, user_id, product_id).await);
        }

        let record =
            Self::insert_redemption_with(&mut *tx, coupon.id, user_id, product_id, at).await?;
        tx.commit().await?;

        tracing::debug!(coupon_id = %coupon.id, %user_id, scope = %coupon.scope, "coupon redeemed");
        Ok(record)
    }

    async fn list_used_by_user(&self, user_id: UserId) -> Result<Vec<UsedCoupon>> {
        let rows = sqlx::query(
            r#"
            SELECT c.code, c.description, c.image_url, uc.created_at
            FROM used_coupons uc
            JOIN coupons c ON uc.coupon_id = c.id
            WHERE uc.user_id = $1
            ORDER BY uc.created_at ASC, uc.id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UsedCoupon {
                    code: row.try_get("code")?,
                    description: row.try_get("description")?,
                    image_url: row.try_get("image_url")?,
                    applied_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}
