//! Role-based access control for GRC operations.
//!
//! Identities arrive already resolved; this module only decides whether a
//! role may perform an operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    RiskManager,
    ComplianceOfficer,
    Auditor,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::RiskManager,
        Role::ComplianceOfficer,
        Role::Auditor,
        Role::Viewer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::RiskManager => "risk_manager",
            Role::ComplianceOfficer => "compliance_officer",
            Role::Auditor => "auditor",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| AccessError::UnknownRole(s.to_string()))
    }
}

/// Caller identity as resolved by the surrounding service shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("Role '{role}' is not allowed to {operation}")]
    Forbidden { role: Role, operation: String },

    #[error("Unknown role '{0}'")]
    UnknownRole(String),
}

/// Role sets for gated operations.
pub mod roles {
    use super::Role;

    pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
    pub const POLICY_EDITORS: &[Role] = &[Role::Admin, Role::RiskManager, Role::ComplianceOfficer];
    pub const RISK_EDITORS: &[Role] = &[Role::Admin, Role::RiskManager];
    pub const COMPLIANCE_EDITORS: &[Role] = &[Role::Admin, Role::ComplianceOfficer];
}

pub fn require_roles(
    identity: &Identity,
    allowed: &[Role],
    operation: &str,
) -> Result<(), AccessError> {
    if allowed.contains(&identity.role) {
        return Ok(());
    }
    tracing::warn!(
        user_id = %identity.user_id,
        role = %identity.role,
        operation = operation,
        "Access denied"
    );
    Err(AccessError::Forbidden {
        role: identity.role,
        operation: operation.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_round_trips_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!("Risk_Manager".parse::<Role>().unwrap(), Role::RiskManager);
        assert!(matches!("root".parse::<Role>(), Err(AccessError::UnknownRole(_))));
    }

    #[test]
    fn test_require_roles() {
        let admin = Identity::new("u1", Role::Admin);
        let auditor = Identity::new("u2", Role::Auditor);

        assert!(require_roles(&admin, roles::ADMIN_ONLY, "set workflow configuration").is_ok());
        let err = require_roles(&auditor, roles::RISK_EDITORS, "create risk").unwrap_err();
        assert_eq!(
            err,
            AccessError::Forbidden {
                role: Role::Auditor,
                operation: "create risk".to_string()
            }
        );
    }
}
