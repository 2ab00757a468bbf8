//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need a running Docker
//! daemon. Run with:
//!
//! ```bash
//! cargo test -p coupon-store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use coupon_store::{
    CouponScope, CouponStore, DiscountRule, Money, NewCoupon, PostgresCouponStore,
    ProductId, ScopeKind, StoreError, UserId,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/coupon/001_create_coupon_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with cleared tables.
async fn get_test_store() -> PostgresCouponStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE used_coupons, user_coupons, product_coupons, coupons")
        .execute(&pool)
        .await
        .unwrap();

    PostgresCouponStore::new(pool)
}

fn new_coupon(code: &str, scope: CouponScope, total: i64) -> NewCoupon {
    let now = Utc::now();
    NewCoupon {
        code: code.to_string(),
        valid_from: now - Duration::hours(1),
        valid_to: now + Duration::days(1),
        discount: DiscountRule::FixedValue(Money::from_dollars(50)),
        scope,
        total,
        description: Some("launch week".to_string()),
        image_url: None,
        created_by: UserId::new(1),
        created_at: now,
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn create_and_load_coupon() {
    let store = get_test_store().await;

    let id = store
        .create_coupon(new_coupon("SPRING", CouponScope::Limited, 3))
        .await
        .unwrap();

    let coupon = store.get_by_code("SPRING").await.unwrap();
    assert_eq!(coupon.id, id);
    assert_eq!(coupon.scope, ScopeKind::Limited);
    assert_eq!(coupon.discount, DiscountRule::FixedValue(Money::from_dollars(50)));
    assert_eq!(coupon.usage.unwrap().total, 3);
    assert_eq!(coupon.usage.unwrap().used, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn duplicate_code_is_rejected() {
    let store = get_test_store().await;
    store
        .create_coupon(new_coupon("DUP", CouponScope::Limited, 1))
        .await
        .unwrap();

    let result = store
        .create_coupon(new_coupon("DUP", CouponScope::Limited, 1))
        .await;
    assert!(matches!(result, Err(StoreError::DuplicateCode(code)) if code == "DUP"));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn missing_code_is_not_found() {
    let store = get_test_store().await;
    let result = store.get_by_code("NOPE").await;
    assert!(matches!(result, Err(StoreError::CouponNotFound(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn scoped_coupon_creates_grant() {
    let store = get_test_store().await;

    let user_coupon = store
        .create_coupon(new_coupon(
            "USER-ONLY",
            CouponScope::PerUser {
                user_id: UserId::new(7),
            },
            2,
        ))
        .await
        .unwrap();
    let product_coupon = store
        .create_coupon(new_coupon(
            "PRODUCT-ONLY",
            CouponScope::PerProduct {
                product_id: ProductId::new(9),
            },
            4,
        ))
        .await
        .unwrap();

    let grant = store
        .get_user_grant(user_coupon, UserId::new(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grant.usage.total, 2);
    assert!(
        store
            .get_user_grant(user_coupon, UserId::new(8))
            .await
            .unwrap()
            .is_none()
    );

    let grant = store
        .get_product_grant(product_coupon, ProductId::new(9))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(grant.usage.total, 4);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn delete_cascades_to_grants_and_keeps_history() {
    let store = get_test_store().await;
    let id = store
        .create_coupon(new_coupon(
            "GONE",
            CouponScope::PerUser {
                user_id: UserId::new(3),
            },
            1,
        ))
        .await
        .unwrap();
    let coupon = store.get_by_code("GONE").await.unwrap();
    store
        .redeem(&coupon, UserId::new(3), None, Utc::now())
        .await
        .unwrap();

    store.delete_coupon(id).await.unwrap();

    assert!(matches!(
        store.get_by_code("GONE").await,
        Err(StoreError::CouponNotFound(_))
    ));
    assert!(
        store
            .get_user_grant(id, UserId::new(3))
            .await
            .unwrap()
            .is_none()
    );

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM used_coupons WHERE coupon_id = $1")
        .bind(id.as_i64())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(history, 1);

    assert!(matches!(
        store.delete_coupon(id).await,
        Err(StoreError::CouponIdNotFound(missing)) if missing == id
    ));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn limited_redeem_stops_at_total() {
    let store = get_test_store().await;
    store
        .create_coupon(new_coupon("TWICE", CouponScope::Limited, 2))
        .await
        .unwrap();
    let coupon = store.get_by_code("TWICE").await.unwrap();

    for user in 1..=2 {
        store
            .redeem(&coupon, UserId::new(user), None, Utc::now())
            .await
            .unwrap();
    }
    let third = store.redeem(&coupon, UserId::new(3), None, Utc::now()).await;
    assert!(matches!(third, Err(StoreError::QuotaExhausted { .. })));

    let reloaded = store.get_by_code("TWICE").await.unwrap();
    assert_eq!(reloaded.usage.unwrap().used, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn user_redeem_without_grant_is_rejected() {
    let store = get_test_store().await;
    store
        .create_coupon(new_coupon(
            "MINE",
            CouponScope::PerUser {
                user_id: UserId::new(1),
            },
            1,
        ))
        .await
        .unwrap();
    let coupon = store.get_by_code("MINE").await.unwrap();

    let result = store.redeem(&coupon, UserId::new(2), None, Utc::now()).await;
    assert!(matches!(result, Err(StoreError::GrantNotFound { .. })));

    store
        .redeem(&coupon, UserId::new(1), None, Utc::now())
        .await
        .unwrap();
    let again = store.redeem(&coupon, UserId::new(1), None, Utc::now()).await;
    assert!(matches!(again, Err(StoreError::QuotaExhausted { .. })));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn product_redeem_requires_product() {
    let store = get_test_store().await;
    store
        .create_coupon(new_coupon(
            "WIDGET",
            CouponScope::PerProduct {
                product_id: ProductId::new(5),
            },
            1,
        ))
        .await
        .unwrap();
    let coupon = store.get_by_code("WIDGET").await.unwrap();

    let result = store.redeem(&coupon, UserId::new(1), None, Utc::now()).await;
    assert!(matches!(result, Err(StoreError::MissingSubject("product"))));

    let record = store
        .redeem(&coupon, UserId::new(1), Some(ProductId::new(5)), Utc::now())
        .await
        .unwrap();
    assert_eq!(record.product_id, Some(ProductId::new(5)));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn concurrent_redeems_never_exceed_total() {
    let store = Arc::new(get_test_store().await);
    store
        .create_coupon(new_coupon("RUSH", CouponScope::Limited, 5))
        .await
        .unwrap();
    let coupon = Arc::new(store.get_by_code("RUSH").await.unwrap());

    let handles: Vec<_> = (0..20)
        .map(|user| {
            let store = Arc::clone(&store);
            let coupon = Arc::clone(&coupon);
            tokio::spawn(async move {
                store
                    .redeem(&coupon, UserId::new(user), None, Utc::now())
                    .await
            })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;
    let successes = results
        .into_iter()
        .map(|joined| joined.unwrap())
        .filter(Result::is_ok)
        .count();
    assert_eq!(successes, 5);

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM used_coupons WHERE coupon_id = $1")
        .bind(coupon.id.as_i64())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(history, 5);
    assert_eq!(store.get_by_code("RUSH").await.unwrap().usage.unwrap().used, 5);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn insert_redemption_does_not_touch_counters() {
    let store = get_test_store().await;
    let id = store
        .create_coupon(new_coupon("RAW", CouponScope::Limited, 1))
        .await
        .unwrap();

    for _ in 0..3 {
        store
            .insert_redemption(id, UserId::new(1), None, Utc::now())
            .await
            .unwrap();
    }

    let coupon = store.get_by_code("RAW").await.unwrap();
    assert_eq!(coupon.usage.unwrap().used, 0);
    assert_eq!(store.list_used_by_user(UserId::new(1)).await.unwrap().len(), 3);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn history_lists_oldest_first() {
    let store = get_test_store().await;
    let now = Utc::now();
    let first = store
        .create_coupon(new_coupon("FIRST", CouponScope::Limited, 5))
        .await
        .unwrap();
    let second = store
        .create_coupon(new_coupon("SECOND", CouponScope::Limited, 5))
        .await
        .unwrap();

    store
        .insert_redemption(second, UserId::new(4), None, now)
        .await
        .unwrap();
    store
        .insert_redemption(first, UserId::new(4), None, now - Duration::minutes(5))
        .await
        .unwrap();
    store
        .insert_redemption(first, UserId::new(5), None, now)
        .await
        .unwrap();

    let used = store.list_used_by_user(UserId::new(4)).await.unwrap();
    let codes: Vec<_> = used.iter().map(|u| u.code.as_str()).collect();
    assert_eq!(codes, ["FIRST", "SECOND"]);
    assert_eq!(used[1].description.as_deref(), Some("launch week"));
}
