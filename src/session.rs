//! Ephemeral session registry
//!
//! Tracks live participants per monitored audio channel and keeps at
//! most one "session is live" announcement per channel: posted when the
//! first participant arrives, removed when the last one leaves.
//!
//! Sends happen outside the registry lock, so the announcement passes
//! through a reservation state while in flight. A departure that
//! empties the channel during the in-flight send marks the reservation
//! abandoned; the sender then deletes its own message on completion
//! instead of publishing it. An arrival during the send clears the
//! abandonment again. All state transitions happen under one lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::gateway::PlatformGateway;
use crate::types::{ChannelId, MemberId, MessageId};

// ─────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────

/// Announcement lifecycle for one monitored channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnnounceState {
    /// No announcement exists or is in flight
    Idle,
    /// A send is in flight; `abandoned` means the channel emptied
    /// while the message was being posted
    Sending { abandoned: bool },
    /// The announcement is live
    Live(MessageId),
}

#[derive(Debug, Default)]
struct ChannelSession {
    participants: HashSet<MemberId>,
    announce: AnnounceState,
}

impl Default for AnnounceState {
    fn default() -> Self {
        AnnounceState::Idle
    }
}

// ─────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────

/// Participant counts and live announcements per monitored channel
pub struct SessionRegistry {
    gateway: Arc<dyn PlatformGateway>,
    /// Channel the announcements are posted to
    announce_channel: ChannelId,
    sessions: Mutex<HashMap<ChannelId, ChannelSession>>,
}

impl SessionRegistry {
    pub fn new(gateway: Arc<dyn PlatformGateway>, announce_channel: ChannelId) -> Self {
        Self {
            gateway,
            announce_channel,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Record a member entering a monitored channel
    ///
    /// The first arrival triggers the announcement send; the send is
    /// awaited here but runs outside the registry lock.
    pub async fn member_entered(&self, channel: ChannelId, member: MemberId) {
        let should_send = {
            let mut sessions = self.sessions.lock();
            let session = sessions.entry(channel).or_default();
            if !session.participants.insert(member) {
                // Duplicate arrival event
                return;
            }
            debug!(
                channel = %channel,
                member = %member,
                participants = session.participants.len(),
                "Participant entered"
            );
            match session.announce {
                AnnounceState::Idle => {
                    session.announce = AnnounceState::Sending { abandoned: false };
                    true
                }
                AnnounceState::Sending { .. } => {
                    // Someone is back before the in-flight send landed
                    session.announce = AnnounceState::Sending { abandoned: false };
                    false
                }
                AnnounceState::Live(_) => false,
            }
        };

        if should_send {
            self.send_announcement(channel).await;
        }
    }

    /// Record a member leaving a monitored channel
    ///
    /// The last departure removes the live announcement, or abandons
    /// the in-flight one.
    pub async fn member_left(&self, channel: ChannelId, member: MemberId) {
        let to_delete = {
            let mut sessions = self.sessions.lock();
            let session = match sessions.get_mut(&channel) {
                Some(s) => s,
                None => return,
            };
            if !session.participants.remove(&member) {
                return;
            }
            debug!(
                channel = %channel,
                member = %member,
                participants = session.participants.len(),
                "Participant left"
            );
            if !session.participants.is_empty() {
                return;
            }
            match session.announce {
                AnnounceState::Live(message) => {
                    session.announce = AnnounceState::Idle;
                    Some(message)
                }
                AnnounceState::Sending { .. } => {
                    session.announce = AnnounceState::Sending { abandoned: true };
                    None
                }
                AnnounceState::Idle => None,
            }
        };

        if let Some(message) = to_delete {
            info!(channel = %channel, "Session ended, removing announcement");
            self.delete_announcement(message).await;
        }
    }

    /// Number of tracked participants in a channel
    pub fn participant_count(&self, channel: ChannelId) -> usize {
        self.sessions
            .lock()
            .get(&channel)
            .map(|s| s.participants.len())
            .unwrap_or(0)
    }

    /// Message id of the live announcement for a channel, if any
    pub fn announcement(&self, channel: ChannelId) -> Option<MessageId> {
        match self.sessions.lock().get(&channel).map(|s| s.announce) {
            Some(AnnounceState::Live(message)) => Some(message),
            _ => None,
        }
    }

    async fn send_announcement(&self, channel: ChannelId) {
        let text = format!("🔴 A live session just started in <#{}>! Come listen in.", channel);
        let sent = self
            .gateway
            .send_message(self.announce_channel, &text)
            .await;

        // Resolve the reservation against whatever happened meanwhile.
        let to_delete = {
            let mut sessions = self.sessions.lock();
            let session = match sessions.get_mut(&channel) {
                Some(s) => s,
                None => return,
            };
            match (&sent, session.announce) {
                (Ok(message), AnnounceState::Sending { abandoned: false }) => {
                    session.announce = AnnounceState::Live(*message);
                    info!(channel = %channel, message = %message, "Session announcement live");
                    None
                }
                (Ok(message), _) => {
                    // Channel emptied mid-send; unpublish our own message
                    session.announce = AnnounceState::Idle;
                    Some(*message)
                }
                (Err(_), _) => {
                    session.announce = AnnounceState::Idle;
                    None
                }
            }
        };

        if let Err(e) = sent {
            warn!(channel = %channel, error = %e, "Session announcement failed");
        }
        if let Some(message) = to_delete {
            debug!(channel = %channel, message = %message, "Announcement abandoned mid-send");
            self.delete_announcement(message).await;
        }
    }

    async fn delete_announcement(&self, message: MessageId) {
        match self
            .gateway
            .delete_message(self.announce_channel, message)
            .await
        {
            Ok(()) => {}
            // Already cleaned up by someone else
            Err(Error::MessageNotFound { .. }) => {}
            Err(e) => {
                warn!(message = %message, error = %e, "Failed to remove announcement");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
