//! Member directory: the engine's view of the guild roster
//!
//! Populated from gateway events (member joined) and mutated only by
//! the transition engine while the member's operation lock is held.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Member, MemberId, RoleId};

/// Thread-safe registry of known members
#[derive(Default)]
pub struct MemberDirectory {
    members: RwLock<HashMap<MemberId, Member>>,
}

impl MemberDirectory {
    /// Create a new empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a member record
    pub fn upsert(&self, member: Member) {
        self.members.write().insert(member.id, member);
    }

    /// Remove a member (left the guild)
    pub fn remove(&self, id: MemberId) -> Option<Member> {
        self.members.write().remove(&id)
    }

    /// Get a clone of a member's current record
    pub fn get(&self, id: MemberId) -> Result<Member> {
        self.members
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::MemberNotFound { member: id })
    }

    /// Snapshot of a member's role set
    pub fn role_set(&self, id: MemberId) -> Result<BTreeSet<RoleId>> {
        Ok(self.get(id)?.roles)
    }

    /// Add a role to a member's local record
    pub fn add_role(&self, id: MemberId, role: RoleId) -> Result<()> {
        let mut members = self.members.write();
        let member = members
            .get_mut(&id)
            .ok_or(Error::MemberNotFound { member: id })?;
        member.roles.insert(role);
        Ok(())
    }

    /// Remove a role from a member's local record
    pub fn remove_role(&self, id: MemberId, role: RoleId) -> Result<()> {
        let mut members = self.members.write();
        let member = members
            .get_mut(&id)
            .ok_or(Error::MemberNotFound { member: id })?;
        member.roles.remove(&role);
        Ok(())
    }

    /// Replace a member's entire role set
    pub fn set_roles(&self, id: MemberId, roles: BTreeSet<RoleId>) -> Result<()> {
        let mut members = self.members.write();
        let member = members
            .get_mut(&id)
            .ok_or(Error::MemberNotFound { member: id })?;
        member.roles = roles;
        Ok(())
    }

    /// Record the display override currently applied on the platform
    pub fn set_display_override(&self, id: MemberId, name: Option<String>) -> Result<()> {
        let mut members = self.members.write();
        let member = members
            .get_mut(&id)
            .ok_or(Error::MemberNotFound { member: id })?;
        member.display_override = name;
        Ok(())
    }

    /// Whether the directory knows this member
    pub fn contains(&self, id: MemberId) -> bool {
        self.members.read().contains_key(&id)
    }

    /// Number of known members
    pub fn member_count(&self) -> usize {
        self.members.read().len()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
