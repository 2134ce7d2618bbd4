//! Role transition engine and its supporting pieces
//!
//! The engine executes verify/promote/demote/set-nickname against a
//! member's role set, serialized per member, validated against the
//! hierarchy oracle before any mutation touches the platform.

mod directory;
mod locks;
mod nickname;
mod transition;

pub use directory::MemberDirectory;
pub use locks::MemberLocks;
pub use nickname::RankPrefix;
pub use transition::{EngineConfig, TransitionEngine};
