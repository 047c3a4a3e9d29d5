//! Privilege checks.

use std::collections::BTreeSet;

use crate::error::{ReportError, Result};

/// Privilege required to evaluate reports.
pub const PRIV_RUN_REPORTS: &str = "Run Reports";

/// Answers whether the current caller holds a privilege.
pub trait AuthorizationGate: Send + Sync {
    fn has_privilege(&self, privilege: &str) -> bool;
}

/// Fail with [`ReportError::Authorization`] unless `gate` grants `privilege`.
pub fn require(gate: &dyn AuthorizationGate, privilege: &str) -> Result<()> {
    if gate.has_privilege(privilege) {
        Ok(())
    } else {
        tracing::warn!(privilege, "Privilege check failed");
        Err(ReportError::authorization(privilege))
    }
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn has_privilege(&self, _privilege: &str) -> bool {
        true
    }
}

/// Grants a fixed set of privileges.
#[derive(Debug, Clone, Default)]
pub struct GrantedPrivileges {
    privileges: BTreeSet<String>,
}

impl GrantedPrivileges {
    pub fn new<I, S>(privileges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            privileges: privileges.into_iter().map(Into::into).collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl AuthorizationGate for GrantedPrivileges {
    fn has_privilege(&self, privilege: &str) -> bool {
        self.privileges.contains(privilege)
    }
}
