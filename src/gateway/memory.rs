//! In-memory gateway for testing and standalone mode
//!
//! Records every outbound operation in a journal, assigns message ids,
//! and can inject failures per operation kind.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{ChannelId, MemberId, MessageId, RoleId};

use super::PlatformGateway;

// ─────────────────────────────────────────────────────────────────
// Failure Injection
// ─────────────────────────────────────────────────────────────────

/// How an injected failure presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Retryable network fault
    Transient,
    /// Missing capability
    Permanent,
}

impl FailureMode {
    fn to_error(self, operation: &str) -> Error {
        match self {
            FailureMode::Transient => Error::transient(operation, "injected transient fault"),
            FailureMode::Permanent => Error::permanent(operation, "injected permanent fault"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Operation Journal
// ─────────────────────────────────────────────────────────────────

/// One recorded outbound operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOp {
    AddRole { member: MemberId, role: RoleId },
    RemoveRole { member: MemberId, role: RoleId },
    SetDisplayName { member: MemberId, name: Option<String> },
    SendMessage { channel: ChannelId, message: MessageId, content: String },
    EditMessage { channel: ChannelId, message: MessageId, content: String },
    DeleteMessage { channel: ChannelId, message: MessageId },
    SendDirect { member: MemberId, message: MessageId, content: String },
}

#[derive(Default)]
struct Inner {
    journal: Vec<GatewayOp>,
    /// Live messages by id (content), removed on delete
    messages: HashMap<MessageId, (ChannelId, String)>,
    next_message_id: u64,
    /// Remaining injected failures per operation name
    failures: HashMap<&'static str, (FailureMode, u32)>,
}

/// In-memory implementation of [`PlatformGateway`]
pub struct MemoryGateway {
    inner: RwLock<Inner>,
}

impl MemoryGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_message_id: 1,
                ..Inner::default()
            }),
        }
    }

    /// Inject `count` failures for an operation ("add-role",
    /// "remove-role", "set-display-name", "send-message",
    /// "edit-message", "delete-message", "send-direct")
    pub fn fail_next(&self, operation: &'static str, mode: FailureMode, count: u32) {
        self.inner.write().failures.insert(operation, (mode, count));
    }

    /// Snapshot of the operation journal
    pub fn journal(&self) -> Vec<GatewayOp> {
        self.inner.read().journal.clone()
    }

    /// Count of journal entries matching a predicate
    pub fn count_ops(&self, pred: impl Fn(&GatewayOp) -> bool) -> usize {
        self.inner.read().journal.iter().filter(|op| pred(op)).count()
    }

    /// Whether a message is still live
    pub fn message_exists(&self, message: MessageId) -> bool {
        self.inner.read().messages.contains_key(&message)
    }

    /// Current content of a live message
    pub fn message_content(&self, message: MessageId) -> Option<String> {
        self.inner
            .read()
            .messages
            .get(&message)
            .map(|(_, content)| content.clone())
    }

    /// Number of live messages in a channel
    pub fn live_messages_in(&self, channel: ChannelId) -> usize {
        self.inner
            .read()
            .messages
            .values()
            .filter(|(ch, _)| *ch == channel)
            .count()
    }

    /// Clear the journal (message store is kept)
    pub fn reset_journal(&self) {
        self.inner.write().journal.clear();
    }

    fn check_failure(&self, operation: &'static str) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some((mode, count)) = inner.failures.get_mut(operation) {
            if *count > 0 {
                *count -= 1;
                let mode = *mode;
                return Err(mode.to_error(operation));
            }
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformGateway for MemoryGateway {
    async fn add_role(&self, member: MemberId, role: RoleId) -> Result<()> {
        self.check_failure("add-role")?;
        self.inner
            .write()
            .journal
            .push(GatewayOp::AddRole { member, role });
        Ok(())
    }

    async fn remove_role(&self, member: MemberId, role: RoleId) -> Result<()> {
        self.check_failure("remove-role")?;
        self.inner
            .write()
            .journal
            .push(GatewayOp::RemoveRole { member, role });
        Ok(())
    }

    async fn set_display_name(&self, member: MemberId, name: Option<String>) -> Result<()> {
        self.check_failure("set-display-name")?;
        self.inner
            .write()
            .journal
            .push(GatewayOp::SetDisplayName { member, name });
        Ok(())
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> Result<MessageId> {
        self.check_failure("send-message")?;
        let mut inner = self.inner.write();
        let message = MessageId(inner.next_message_id);
        inner.next_message_id += 1;
        inner
            .messages
            .insert(message, (channel, content.to_string()));
        inner.journal.push(GatewayOp::SendMessage {
            channel,
            message,
            content: content.to_string(),
        });
        Ok(message)
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<()> {
        self.check_failure("edit-message")?;
        let mut inner = self.inner.write();
        match inner.messages.get_mut(&message) {
            Some((_, stored)) => *stored = content.to_string(),
            None => return Err(Error::MessageNotFound { message }),
        }
        inner.journal.push(GatewayOp::EditMessage {
            channel,
            message,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        self.check_failure("delete-message")?;
        let mut inner = self.inner.write();
        if inner.messages.remove(&message).is_none() {
            return Err(Error::MessageNotFound { message });
        }
        inner
            .journal
            .push(GatewayOp::DeleteMessage { channel, message });
        Ok(())
    }

    async fn send_direct(&self, member: MemberId, content: &str) -> Result<MessageId> {
        self.check_failure("send-direct")?;
        let mut inner = self.inner.write();
        let message = MessageId(inner.next_message_id);
        inner.next_message_id += 1;
        inner.journal.push(GatewayOp::SendDirect {
            member,
            message,
            content: content.to_string(),
        });
        Ok(message)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
