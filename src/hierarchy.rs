//! Hierarchy oracle: ordering and authority questions over the role graph
//!
//! The role graph is externally owned: the platform dictates role ranks
//! and the engine only reads them. All rank comparisons in the crate go
//! through this module so ordering policy lives in one place.

use std::collections::BTreeSet;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Role, RoleId};

// ─────────────────────────────────────────────────────────────────
// Role Graph
// ─────────────────────────────────────────────────────────────────

/// Snapshot of the external role graph
///
/// Declaration order is preserved and used to break rank ties in
/// [`RoleGraph::highest_role`], mirroring the platform's own priority
/// ordering rather than rank alone.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    roles: HashMap<RoleId, Role>,
    declaration_order: Vec<RoleId>,
}

impl RoleGraph {
    /// Build a graph from roles in platform declaration order
    pub fn new(roles: Vec<Role>) -> Self {
        let declaration_order = roles.iter().map(|r| r.id).collect();
        let roles = roles.into_iter().map(|r| (r.id, r)).collect();
        Self {
            roles,
            declaration_order,
        }
    }

    /// Look up a role, failing if it is absent from the graph
    pub fn role(&self, id: RoleId) -> Result<&Role> {
        self.roles.get(&id).ok_or(Error::RoleNotFound { role: id })
    }

    /// Look up a role by its platform display name
    pub fn role_by_name(&self, name: &str) -> Result<&Role> {
        self.declaration_order
            .iter()
            .filter_map(|id| self.roles.get(id))
            .find(|r| r.name == name)
            .ok_or_else(|| Error::RoleNameNotFound {
                name: name.to_string(),
            })
    }

    /// Rank of a role
    pub fn rank_of(&self, id: RoleId) -> Result<i64> {
        Ok(self.role(id)?.rank)
    }

    /// True iff `rank(a) >= rank(b)`
    pub fn is_at_or_above(&self, a: RoleId, b: RoleId) -> Result<bool> {
        Ok(self.rank_of(a)? >= self.rank_of(b)?)
    }

    /// Highest-ranked role in a set
    ///
    /// Ties are broken by declaration order: the earlier-declared role
    /// wins. Returns `None` for an empty set; fails only if the set
    /// references a role absent from the graph.
    pub fn highest_role(&self, set: &BTreeSet<RoleId>) -> Result<Option<&Role>> {
        // Validate membership first so a dangling id is an error even
        // when a valid higher role would win.
        for id in set {
            self.role(*id)?;
        }

        let mut best: Option<&Role> = None;
        for id in &self.declaration_order {
            if !set.contains(id) {
                continue;
            }
            let role = &self.roles[id];
            match best {
                Some(current) if current.rank >= role.rank => {}
                _ => best = Some(role),
            }
        }
        Ok(best)
    }

    /// Highest rank held in a set, if any
    pub fn top_rank(&self, set: &BTreeSet<RoleId>) -> Result<Option<i64>> {
        Ok(self.highest_role(set)?.map(|r| r.rank))
    }

    /// Number of roles in the graph
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.declaration_order
            .iter()
            .filter_map(move |id| self.roles.get(id))
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
