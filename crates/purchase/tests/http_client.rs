//! Tests for the HTTP coupon client against a stub coupon component.

use std::time::Duration;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use common::{DiscountRule, ErrorKind, Identity, ProductId, UserId};
use coupon::{CouponView, EligibilityRequest};
use coupon_store::{ScopeKind, Usage};
use purchase::{CouponClient, HttpCouponClient};
use serde_json::{Value, json};

fn view(code: &str) -> CouponView {
    let now = Utc::now();
    CouponView {
        code: code.to_string(),
        discount: DiscountRule::Percent(20),
        scope: ScopeKind::Limited,
        valid_from: now,
        valid_to: now + chrono::Duration::days(1),
        usage: Some(Usage { used: 1, total: 3 }),
        description: None,
        image_url: None,
        can_use: true,
    }
}

async fn retrieve(Path(code): Path<String>) -> Result<Json<CouponView>, (StatusCode, Json<Value>)> {
    match code.as_str() {
        "MISSING" => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "coupon not found: MISSING", "kind": "not_found" })),
        )),
        "SLOW" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Json(view(&code)))
        }
        _ => Ok(Json(view(&code))),
    }
}

async fn apply(
    Path(code): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if headers.get("x-user-id").and_then(|v| v.to_str().ok()) != Some("7") {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "missing identity" })));
    }
    match code.as_str() {
        "USED" => (
            StatusCode::PRECONDITION_FAILED,
            Json(json!({ "error": "unable to apply this coupon" })),
        ),
        _ if body["product_id"] == json!(3) => (StatusCode::NO_CONTENT, Json(json!({}))),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "wrong product" }))),
    }
}

async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/coupons/{code}", get(retrieve))
        .route("/coupons/{code}/apply", post(apply));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn caller() -> Identity {
    Identity::user(7)
}

#[tokio::test]
async fn check_eligibility_decodes_view() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_secs(2)).unwrap();

    let view = client
        .check_eligibility(
            "SPRING",
            EligibilityRequest::enforce_for(UserId::new(7), Some(ProductId::new(3))),
        )
        .await
        .unwrap();

    assert_eq!(view.code, "SPRING");
    assert_eq!(view.discount, DiscountRule::Percent(20));
    assert!(view.can_use);
}

#[tokio::test]
async fn codes_with_reserved_characters_reach_the_same_coupon() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_secs(2)).unwrap();

    for code in ["SPRING#X", "SPRING?user_id=1", "SPRING/../USED"] {
        let view = client
            .check_eligibility(code, EligibilityRequest::lookup())
            .await
            .unwrap();
        assert_eq!(view.code, code);

        client
            .redeem(&caller(), code, Some(ProductId::new(3)))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn not_found_status_maps_to_not_found() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_secs(2)).unwrap();

    let err = client
        .check_eligibility("MISSING", EligibilityRequest::lookup())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "coupon not found: MISSING");
}

#[tokio::test]
async fn redeem_sends_identity_and_product() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_secs(2)).unwrap();

    client
        .redeem(&caller(), "SPRING", Some(ProductId::new(3)))
        .await
        .unwrap();

    let err = client
        .redeem(&caller(), "SPRING", Some(ProductId::new(4)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);

    let err = client
        .redeem(&Identity::user(8), "SPRING", Some(ProductId::new(3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn precondition_failed_maps_to_failed_precondition() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_secs(2)).unwrap();

    let err = client.redeem(&caller(), "USED", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn timeout_is_internal() {
    let base = spawn_stub().await;
    let client = HttpCouponClient::new(&base, Duration::from_millis(100)).unwrap();

    let err = client
        .check_eligibility("SLOW", EligibilityRequest::lookup())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}

#[tokio::test]
async fn unreachable_service_is_internal() {
    let client = HttpCouponClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
    let err = client.redeem(&caller(), "SPRING", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Internal);
}
