//! Outbound platform operations
//!
//! Every operation may fail with `PlatformTransient` (retryable network
//! fault) or `PlatformPermanent` (missing capability). Callers decide
//! per call site whether a failure is surfaced or swallowed-and-logged;
//! the gateway itself never retries.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelId, MemberId, MessageId, RoleId};

/// Outbound operations against the chat platform
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Grant a role to a member
    async fn add_role(&self, member: MemberId, role: RoleId) -> Result<()>;

    /// Remove a role from a member
    async fn remove_role(&self, member: MemberId, role: RoleId) -> Result<()>;

    /// Set or clear a member's display-name override
    async fn set_display_name(&self, member: MemberId, name: Option<String>) -> Result<()>;

    /// Send a message to a channel, returning the created artifact id
    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<MessageId>;

    /// Edit a previously sent message
    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<()>;

    /// Delete a message; fails `MessageNotFound` if already gone
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    /// Send a direct message to a member
    async fn send_direct(&self, member: MemberId, content: &str) -> Result<MessageId>;
}
