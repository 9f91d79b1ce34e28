//! Access control models
//!
//! Per-page access rules evaluated on top of role checks when access
//! control is enabled in the configuration.

use serde::{Deserialize, Serialize};

/// Access level granted by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Deny,
    Read,
    ReadWrite,
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::Deny
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deny => write!(f, "deny"),
            Self::Read => write!(f, "read"),
            Self::ReadWrite => write!(f, "readwrite"),
        }
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deny" => Ok(Self::Deny),
            "read" => Ok(Self::Read),
            "readwrite" => Ok(Self::ReadWrite),
            _ => Err(anyhow::anyhow!("Invalid access level: {}", s)),
        }
    }
}

/// Per-page access rule.
///
/// `identity` names either a user (`is_for_role == false`) or a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: i64,
    pub page_id: i64,
    pub identity: String,
    pub is_for_role: bool,
    pub access_level: AccessLevel,
}

impl AccessRule {
    pub fn new(page_id: i64, identity: String, is_for_role: bool, access_level: AccessLevel) -> Self {
        Self {
            id: 0,
            page_id,
            identity,
            is_for_role,
            access_level,
        }
    }
}

/// Submitted access rule
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessRuleInput {
    pub identity: String,
    #[serde(default)]
    pub is_for_role: bool,
    pub access_level: AccessLevel,
}
