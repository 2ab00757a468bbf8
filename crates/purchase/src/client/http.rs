//! HTTP client for a remote coupon component.

use std::time::Duration;

use async_trait::async_trait;
use common::{ErrorKind, Identity, ProductId};
use coupon::{CouponView, EligibilityRequest};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{ClientError, CouponClient};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Serialize)]
struct ApplyRequest {
    product_id: Option<ProductId>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Calls the coupon component's HTTP API.
///
/// Every request is bounded by the configured timeout. Timeouts and
/// transport failures are classified as `Internal`.
#[derive(Debug, Clone)]
pub struct HttpCouponClient {
    client: Client,
    base_url: Url,
}

impl HttpCouponClient {
    /// Creates a client for the coupon component at `base_url`
    /// (e.g. `http://coupon-service:3000`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::internal(format!("invalid coupon service url: {base_url}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::internal(format!("unable to build http client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Builds `{base}/coupons/{code}[/{action}]` with `code` as one
    /// percent-encoded path segment.
    fn coupon_url(&self, code: &str, action: Option<&str>) -> Result<Url, ClientError> {
        // Dot segments are dropped by the url builder and would address another route.
        if code.is_empty() || code == "." || code == ".." {
            return Err(ClientError::new(
                ErrorKind::InvalidArgument,
                format!("malformed coupon code: {code:?}"),
            ));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::internal("coupon service url cannot be a base"))?
            .pop_if_empty()
            .push("coupons")
            .push(code)
            .extend(action);
        Ok(url)
    }

    async fn error_from(response: Response) -> ClientError {
        let kind = kind_for_status(response.status());
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => "coupon service responded with an unreadable error body".to_string(),
        };
        ClientError::new(kind, message)
    }
}

/// Maps an HTTP status back to the error kind the coupon component used.
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::PRECONDITION_FAILED => ErrorKind::FailedPrecondition,
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => ErrorKind::PermissionDenied,
        StatusCode::BAD_REQUEST => ErrorKind::InvalidArgument,
        _ => ErrorKind::Internal,
    }
}

fn transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::internal(format!("coupon service timed out: {e}"))
    } else {
        ClientError::internal(format!("coupon service unreachable: {e}"))
    }
}

#[async_trait]
impl CouponClient for HttpCouponClient {
    #[tracing::instrument(skip(self))]
    async fn check_eligibility(
        &self,
        code: &str,
        request: EligibilityRequest,
    ) -> Result<CouponView, ClientError> {
        let mut query = vec![("check_use", request.enforce.to_string())];
        if let Some(user_id) = request.user_id {
            query.push(("user_id", user_id.to_string()));
        }
        if let Some(product_id) = request.product_id {
            query.push(("product_id", product_id.to_string()));
        }

        let url = self.coupon_url(code, None)?;
        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json::<CouponView>()
            .await
            .map_err(|e| ClientError::internal(format!("invalid coupon response: {e}")))
    }

    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id))]
    async fn redeem(
        &self,
        identity: &Identity,
        code: &str,
        product_id: Option<ProductId>,
    ) -> Result<(), ClientError> {
        let url = self.coupon_url(code, Some("apply"))?;
        let response = self
            .client
            .post(url)
            .header(USER_ID_HEADER, identity.user_id.to_string())
            .header(USER_ROLE_HEADER, identity.role.as_str())
            .json(&ApplyRequest { product_id })
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}
