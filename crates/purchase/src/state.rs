//! Purchase attempt state machine.

use serde::{Deserialize, Serialize};

/// The state of one purchase attempt.
///
/// State transitions:
/// ```text
/// Validating ──► EligibilityChecked ──► Reserving ──► Redeeming ──► Committed
/// (any non-terminal state) ──► Failed
/// ```
///
/// `Reserving` means the local transaction is open; `Redeeming` means the
/// remote coupon call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchaseState {
    #[default]
    Validating,
    EligibilityChecked,
    Reserving,
    Redeeming,
    Committed,
    Failed,
}

impl PurchaseState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: PurchaseState) -> bool {
        use PurchaseState::*;
        match (self, next) {
            (Committed | Failed, _) => false,
            (_, Failed) => true,
            (Validating, EligibilityChecked) => true,
            (EligibilityChecked, Reserving) => true,
            (Reserving, Redeeming) => true,
            (Reserving | Redeeming, Committed) => true,
            _ => false,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchaseState::Committed | PurchaseState::Failed)
    }

    /// Returns true if the local transaction is open in this state.
    pub fn holds_transaction(&self) -> bool {
        matches!(self, PurchaseState::Reserving | PurchaseState::Redeeming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseState::Validating => "Validating",
            PurchaseState::EligibilityChecked => "EligibilityChecked",
            PurchaseState::Reserving => "Reserving",
            PurchaseState::Redeeming => "Redeeming",
            PurchaseState::Committed => "Committed",
            PurchaseState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
