//! Failure classification shared across the service boundary.

use serde::{Deserialize, Serialize};

/// Coarse error class carried between components.
///
/// The coupon component classifies every failure into one of these, and the
/// product component propagates the class unchanged instead of collapsing it
/// into `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Coupon code or product id absent.
    NotFound,
    /// Coupon exists but cannot be used now.
    FailedPrecondition,
    /// Caller lacks the required capability or is unauthenticated.
    PermissionDenied,
    /// Request is malformed.
    InvalidArgument,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
