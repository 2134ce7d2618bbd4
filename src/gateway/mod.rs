//! Platform gateway: the seam between the engine and the chat platform
//!
//! The real platform connection lives outside this crate; everything
//! the engine needs from it is expressed by [`PlatformGateway`] and the
//! inbound [`GatewayEvent`] stream. The in-memory implementation backs
//! the test suite and the standalone run mode.

mod events;
mod memory;
mod traits;

pub use events::GatewayEvent;
pub use memory::{FailureMode, GatewayOp, MemoryGateway};
pub use traits::PlatformGateway;
