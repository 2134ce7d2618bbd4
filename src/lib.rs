//! Guildwarden - membership lifecycle and role-hierarchy authorization
//!
//! Watches a community guild, moves members through the verification
//! lifecycle, enforces rank bounds on promotions and demotions, keeps
//! display names in sync with role changes, announces live sessions,
//! and runs scheduled announcements.
//!
//! The library is split along the seams the service runs on:
//!
//! - [`hierarchy`] answers ordering and authority questions over the
//!   externally-owned role graph.
//! - [`engine`] executes role transitions, serialized per member.
//! - [`session`] tracks live participants and announcements.
//! - [`scheduler`] supervises detached, cancellable timed tasks.
//! - [`service`] binds everything behind the request surface and the
//!   inbound event dispatcher.
//! - [`gateway`] is the outbound platform seam, with an in-memory
//!   implementation for tests and standalone mode.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod hierarchy;
pub mod logging;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod types;
pub mod version;

pub use error::{Error, ErrorCode, Result};
