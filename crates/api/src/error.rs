//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ErrorKind;
use coupon::CouponError;
use purchase::{PurchaseError, ProductStoreError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Coupon component error.
    Coupon(CouponError),
    /// Purchase saga error.
    Purchase(PurchaseError),
    /// Product store error outside the saga.
    Products(ProductStoreError),
    /// Caller is unauthenticated or lacks a capability.
    PermissionDenied(String),
    /// Bad request from the client.
    BadRequest(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Coupon(e) => e.kind(),
            ApiError::Purchase(e) => e.kind(),
            ApiError::Products(ProductStoreError::ProductNotFound(_)) => ErrorKind::NotFound,
            ApiError::Products(_) => ErrorKind::Internal,
            ApiError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ApiError::BadRequest(_) => ErrorKind::InvalidArgument,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Coupon(e) => e.to_string(),
            ApiError::Purchase(e) => e.to_string(),
            ApiError::Products(e) => e.to_string(),
            ApiError::PermissionDenied(msg) | ApiError::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Maps an error kind onto the HTTP status that carries it.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = self.message();
        if kind == ErrorKind::Internal {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status_for(kind), axum::Json(body)).into_response()
    }
}

impl From<CouponError> for ApiError {
    fn from(err: CouponError) -> Self {
        ApiError::Coupon(err)
    }
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        ApiError::Purchase(err)
    }
}

impl From<ProductStoreError> for ApiError {
    fn from(err: ProductStoreError) -> Self {
        ApiError::Products(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::FailedPrecondition),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(status_for(ErrorKind::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::InvalidArgument), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn http_status_round_trips_through_client_mapping() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::FailedPrecondition,
            ErrorKind::PermissionDenied,
            ErrorKind::InvalidArgument,
            ErrorKind::Internal,
        ] {
            assert_eq!(purchase::client::http::kind_for_status(status_for(kind)), kind);
        }
    }

    #[test]
    fn coupon_errors_keep_their_kind() {
        let err = ApiError::from(CouponError::FailedPrecondition("used up".into()));
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(err.into_response().status(), StatusCode::PRECONDITION_FAILED);
    }
}
