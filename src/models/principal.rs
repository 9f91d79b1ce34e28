//! Caller identity model
//!
//! The principal arrives already authenticated; this crate only evaluates
//! its roles and per-page access rules.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// System role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    EditContent,
    PublishContent,
    Administration,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditContent => write!(f, "edit_content"),
            Self::PublishContent => write!(f, "publish_content"),
            Self::Administration => write!(f, "administration"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "edit_content" => Ok(Self::EditContent),
            "publish_content" => Ok(Self::PublishContent),
            "administration" => Ok(Self::Administration),
            _ => Err(anyhow::anyhow!("Invalid role: {}", s)),
        }
    }
}

/// Authenticated caller with its role set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub roles: HashSet<Role>,
}

impl Principal {
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True when the principal holds every listed role
    pub fn has_all_roles(&self, roles: &[Role]) -> bool {
        roles.iter().all(|r| self.roles.contains(r))
    }
}
