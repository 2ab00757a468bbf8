//! Admin capability checks.

use common::{Identity, Role};

/// Decides whether a caller may administer coupons.
///
/// The predicate belongs to the identity collaborator; the coupon component
/// only consumes it.
pub trait AccessPolicy: Send + Sync {
    fn is_admin(&self, identity: &Identity) -> bool;
}

/// Grants admin capability to `admin` and `super_admin` roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePolicy;

impl AccessPolicy for RolePolicy {
    fn is_admin(&self, identity: &Identity) -> bool {
        matches!(identity.role, Role::Admin | Role::SuperAdmin)
    }
}
