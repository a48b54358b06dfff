//! Principals: the entities issuing queries against the gateway.

use std::{collections::HashMap, sync::RwLock};

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A principal's role. Gates a handful of privileged endpoints (budget
/// reset, cross-principal audit history) but has no effect on DP semantics
/// itself — the noise calibration in [`crate::mechanism`] doesn't know or
/// care who's asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Analyst,
    Researcher,
    Viewer,
}

/// A stable identity issuing queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    pub active: bool,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            active: true,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Where the gateway looks up who's asking. Separate from [`BudgetLedger`]
/// because identity and role are operator-managed state, not privacy
/// bookkeeping — a principal can be deactivated without touching its spend.
pub trait PrincipalDirectory: Send + Sync {
    fn lookup(&self, principal_id: &str) -> Result<Principal, GatewayError>;
}

/// In-memory reference implementation, keyed by principal id.
#[derive(Default)]
pub struct HashMapPrincipalDirectory {
    principals: RwLock<HashMap<String, Principal>>,
}

impl HashMapPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal: Principal) {
        self.principals
            .write()
            .unwrap()
            .insert(principal.id.clone(), principal);
    }
}

impl PrincipalDirectory for HashMapPrincipalDirectory {
    fn lookup(&self, principal_id: &str) -> Result<Principal, GatewayError> {
        self.principals
            .read()
            .unwrap()
            .get(principal_id)
            .cloned()
            .ok_or_else(|| GatewayError::BadRequest(format!("unknown principal: {principal_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_principal_is_active() {
        let p = Principal::new("alice", Role::Analyst);
        assert!(p.active);
        assert!(!p.is_admin());
    }

    #[test]
    fn directory_looks_up_inserted_principals_and_rejects_unknown_ones() {
        let dir = HashMapPrincipalDirectory::new();
        dir.insert(Principal::new("alice", Role::Analyst));
        assert_eq!(dir.lookup("alice").unwrap().id, "alice");
        assert!(matches!(
            dir.lookup("ghost"),
            Err(GatewayError::BadRequest(_))
        ));
    }
}
