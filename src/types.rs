//! Core domain types for Guildwarden
//!
//! Identifiers are platform snowflake-style u64 newtypes. `Role` and
//! `Member` mirror the externally-owned role graph and guild roster;
//! the engine never invents ranks, it only reads them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a role in the external role graph
    RoleId
);
id_newtype!(
    /// Identifier of a guild member
    MemberId
);
id_newtype!(
    /// Identifier of a text or stage channel
    ChannelId
);
id_newtype!(
    /// Identifier of a sent message artifact
    MessageId
);

// ─────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────

/// A role in the externally-owned role graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role identifier
    pub id: RoleId,

    /// Display name as shown on the platform
    pub name: String,

    /// Integer authority level; higher wins
    pub rank: i64,

    /// Whether the agent may grant/remove this role at all
    pub assignable: bool,
}

// ─────────────────────────────────────────────────────────────────
// Members
// ─────────────────────────────────────────────────────────────────

/// A guild member and their current role set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique member identifier
    pub id: MemberId,

    /// Account name, used as the base of the display name
    pub base_name: String,

    /// Current role set; unordered, hierarchy-comparable
    pub roles: BTreeSet<RoleId>,

    /// Display-name override currently applied (None = plain base name)
    pub display_override: Option<String>,

    /// Whether this member owns the guild (exempt from invoker rank checks)
    pub is_owner: bool,
}

impl Member {
    /// Create a fresh member with an empty role set
    pub fn new(id: MemberId, base_name: impl Into<String>) -> Self {
        Self {
            id,
            base_name: base_name.into(),
            roles: BTreeSet::new(),
            display_override: None,
            is_owner: false,
        }
    }

    /// Whether the member holds the given role
    pub fn holds(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }

    /// Verified means the baseline (unverified) role is absent
    pub fn is_verified(&self, baseline: RoleId) -> bool {
        !self.roles.contains(&baseline)
    }
}

// ─────────────────────────────────────────────────────────────────
// Agent Identity
// ─────────────────────────────────────────────────────────────────

/// The engine's own acting principal
///
/// Every mutation is bounded by `top_rank`: the engine refuses to
/// grant or remove a role whose rank is at or above its own top role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentIdentity {
    /// Member identity the engine acts as
    pub member_id: MemberId,

    /// Rank of the agent's highest role
    pub top_rank: i64,
}
