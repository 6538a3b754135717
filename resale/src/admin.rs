//! Administrative gate consulted by issuance.

use crate::types::AccountId;
use std::collections::HashSet;

/// Decides who may issue tickets
pub trait AdministrativeGate: Send + Sync {
    /// Whether `actor` holds issuing authority
    fn is_admin(&self, actor: &AccountId) -> bool;
}

/// Gate backed by a fixed set of administrators
#[derive(Clone, Debug, Default)]
pub struct StaticAdminGate {
    admins: HashSet<AccountId>,
}

impl StaticAdminGate {
    /// Creates a gate admitting exactly `admins`
    #[must_use]
    pub fn new(admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Gate with a single administrator
    #[must_use]
    pub fn single(admin: AccountId) -> Self {
        Self::new([admin])
    }
}

impl AdministrativeGate for StaticAdminGate {
    fn is_admin(&self, actor: &AccountId) -> bool {
        self.admins.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_listed_actors_are_admins() {
        let gate = StaticAdminGate::new([AccountId::new("issuer"), AccountId::new("ops")]);
        assert!(gate.is_admin(&AccountId::new("issuer")));
        assert!(gate.is_admin(&AccountId::new("ops")));
        assert!(!gate.is_admin(&AccountId::new("alice")));
    }

    #[test]
    fn test_empty_gate_admits_nobody() {
        let gate = StaticAdminGate::default();
        assert!(!gate.is_admin(&AccountId::new("issuer")));
    }
}
