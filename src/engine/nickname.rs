//! Nickname rank synchronization
//!
//! The display override is a pure function of the member's current
//! role set: the first entry of the configured priority list present
//! in the set wins. Recomputing from the same role set always yields
//! the same result, whatever override was applied before.

use std::collections::BTreeSet;

use crate::types::RoleId;

/// Priority-ordered (role, symbol) pairs, highest authority first
#[derive(Debug, Clone, Default)]
pub struct RankPrefix {
    priority: Vec<(RoleId, String)>,
}

impl RankPrefix {
    /// Build from pairs in highest-authority-first order
    pub fn new(priority: Vec<(RoleId, String)>) -> Self {
        Self { priority }
    }

    /// Symbol for the highest-priority role present in the set
    pub fn symbol_for(&self, roles: &BTreeSet<RoleId>) -> Option<&str> {
        self.priority
            .iter()
            .find(|(role, _)| roles.contains(role))
            .map(|(_, symbol)| symbol.as_str())
    }

    /// Full display override for a member, `None` to clear
    pub fn display_for(&self, roles: &BTreeSet<RoleId>, base_name: &str) -> Option<String> {
        self.symbol_for(roles)
            .map(|symbol| format!("{} {}", symbol, base_name))
    }

    /// Number of configured priority entries
    pub fn len(&self) -> usize {
        self.priority.len()
    }

    /// Whether no priority entries are configured
    pub fn is_empty(&self) -> bool {
        self.priority.is_empty()
    }
}
