//! Access control service
//!
//! Two layers of authorization:
//! - role demands: the principal must hold every required role;
//! - per-entity rules: when access control is enabled, a page can carry
//!   explicit rules for users and roles that further restrict access.
//!
//! A user-specific rule takes precedence over role rules; a page without
//! applicable rules falls back to the role demand alone.

use crate::models::{AccessLevel, AccessRule, AccessRuleInput, Principal, Role};

/// Error type for authorization failures
#[derive(Debug, thiserror::Error)]
pub enum AccessControlError {
    #[error("Access denied for '{principal}': {reason}")]
    Forbidden { principal: String, reason: String },
}

#[derive(Debug, Default, Clone)]
pub struct AccessControlService;

impl AccessControlService {
    pub fn new() -> Self {
        Self
    }

    /// Roles required to save page properties. Master pages additionally
    /// require administration rights since edits cascade to every
    /// descendant page.
    pub fn required_roles(&self, is_master_page: bool) -> Vec<Role> {
        if is_master_page {
            vec![Role::EditContent, Role::PublishContent, Role::Administration]
        } else {
            vec![Role::EditContent, Role::PublishContent]
        }
    }

    /// Whether the principal may mutate the second tier of page fields
    /// (URL, SEO, images, options, access rules). Deliberately stricter
    /// than the load-time demand for master pages and looser for ordinary
    /// pages.
    pub fn can_edit(&self, principal: &Principal, is_master_page: bool) -> bool {
        if is_master_page {
            principal.has_all_roles(&[Role::EditContent, Role::Administration])
        } else {
            principal.has_role(Role::EditContent)
        }
    }

    /// Demand that the principal holds at least one of the listed roles.
    ///
    /// The role list is a set of alternatives: a publisher without edit
    /// rights may still open the save workflow, the edit tier and the
    /// publish gate then decide what it can actually change.
    pub fn demand_role_access(
        &self,
        principal: &Principal,
        roles: &[Role],
    ) -> Result<(), AccessControlError> {
        if roles.iter().any(|r| principal.has_role(*r)) {
            Ok(())
        } else {
            Err(AccessControlError::Forbidden {
                principal: principal.name.clone(),
                reason: format!(
                    "requires one of roles: {}",
                    roles
                        .iter()
                        .map(|r| r.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })
        }
    }

    /// Demand role access plus the given level under the entity's rules.
    pub fn demand_entity_access(
        &self,
        principal: &Principal,
        rules: &[AccessRule],
        level: AccessLevel,
        roles: &[Role],
    ) -> Result<(), AccessControlError> {
        self.demand_role_access(principal, roles)?;

        let granted = self.effective_level(principal, rules);
        match granted {
            Some(granted) if granted < level => Err(AccessControlError::Forbidden {
                principal: principal.name.clone(),
                reason: format!("entity access level {} required, {} granted", level, granted),
            }),
            _ => Ok(()),
        }
    }

    /// The level the rules grant this principal: a user rule wins outright,
    /// otherwise the highest level among matching role rules. `None` when
    /// no rule applies.
    fn effective_level(&self, principal: &Principal, rules: &[AccessRule]) -> Option<AccessLevel> {
        if let Some(rule) = rules
            .iter()
            .find(|r| !r.is_for_role && r.identity == principal.name)
        {
            return Some(rule.access_level);
        }

        rules
            .iter()
            .filter(|r| {
                r.is_for_role
                    && r.identity
                        .parse::<Role>()
                        .map(|role| principal.has_role(role))
                        .unwrap_or(false)
            })
            .map(|r| r.access_level)
            .max()
    }

    /// Drop duplicate rules, keeping the first occurrence of each
    /// (identity, kind) pair.
    pub fn dedupe_rules(&self, rules: &[AccessRule]) -> Vec<AccessRule> {
        let mut seen: Vec<(&str, bool)> = Vec::new();
        let mut deduped = Vec::new();
        for rule in rules {
            let key = (rule.identity.as_str(), rule.is_for_role);
            if !seen.contains(&key) {
                seen.push(key);
                deduped.push(rule.clone());
            }
        }
        deduped
    }

    /// The rule set a page should end up with after a save: the submitted
    /// rules, deduplicated, bound to the page.
    pub fn reconcile_rules(&self, page_id: i64, submitted: &[AccessRuleInput]) -> Vec<AccessRule> {
        let rules: Vec<AccessRule> = submitted
            .iter()
            .map(|input| {
                AccessRule::new(
                    page_id,
                    input.identity.clone(),
                    input.is_for_role,
                    input.access_level,
                )
            })
            .collect();
        self.dedupe_rules(&rules)
    }

    /// True when two rule sets describe the same access, ignoring row ids
    /// and ordering.
    pub fn rules_equal(&self, left: &[AccessRule], right: &[AccessRule]) -> bool {
        left.len() == right.len()
            && left.iter().all(|l| {
                right.iter().any(|r| {
                    l.identity == r.identity
                        && l.is_for_role == r.is_for_role
                        && l.access_level == r.access_level
                })
            })
    }
}
