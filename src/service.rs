//! Service facade
//!
//! Binds the engine, session registry and scheduler behind the request
//! surface the platform adapter calls into, and dispatches inbound
//! gateway events. Event handling never fails the event loop: per-event
//! errors are logged and the loop moves on.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::engine::{MemberDirectory, TransitionEngine};
use crate::error::{Error, Result};
use crate::gateway::{GatewayEvent, PlatformGateway};
use crate::hierarchy::RoleGraph;
use crate::scheduler::{Scheduler, TaskId};
use crate::session::SessionRegistry;
use crate::types::{ChannelId, MemberId, MessageId, RoleId};

/// Wire format for scheduled-announcement timestamps
const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";

// ─────────────────────────────────────────────────────────────────
// Service Configuration
// ─────────────────────────────────────────────────────────────────

/// Resolved channel and role wiring for the facade
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Role marking an unverified member
    pub baseline_role: RoleId,

    /// Role gating moderator-tier requests
    pub moderator_role: RoleId,

    /// Channel scheduled and immediate announcements post to
    pub announcement_channel: ChannelId,

    /// Audio channel whose sessions get announced
    pub stage_channel: ChannelId,
}

// ─────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────

/// The request surface and event dispatcher
pub struct Service {
    config: ServiceConfig,
    engine: Arc<TransitionEngine>,
    directory: Arc<MemberDirectory>,
    registry: SessionRegistry,
    scheduler: Arc<Scheduler>,
    gateway: Arc<dyn PlatformGateway>,
    graph: Arc<RoleGraph>,
}

impl Service {
    pub fn new(
        config: ServiceConfig,
        engine: Arc<TransitionEngine>,
        directory: Arc<MemberDirectory>,
        scheduler: Arc<Scheduler>,
        gateway: Arc<dyn PlatformGateway>,
        graph: Arc<RoleGraph>,
    ) -> Self {
        let registry = SessionRegistry::new(gateway.clone(), config.announcement_channel);
        Self {
            config,
            engine,
            directory,
            registry,
            scheduler,
            gateway,
            graph,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Request Surface
    // ─────────────────────────────────────────────────────────────

    /// Self-service verification for the requesting member
    pub async fn verify(&self, member: MemberId) -> Result<()> {
        self.engine.verify(member).await
    }

    /// Moderator-gated promotion
    pub async fn promote(&self, invoker: MemberId, member: MemberId, role: RoleId) -> Result<()> {
        self.engine.promote(invoker, member, role).await
    }

    /// Moderator-gated demotion
    pub async fn demote(&self, invoker: MemberId, member: MemberId, target: RoleId) -> Result<()> {
        self.engine.demote(invoker, member, target).await
    }

    /// Moderator-gated display-name override
    pub async fn set_nickname(
        &self,
        invoker: MemberId,
        member: MemberId,
        text: &str,
    ) -> Result<()> {
        self.engine.set_nickname(invoker, member, text).await
    }

    /// Post an event announcement now and flip it to its live form at
    /// the given time
    ///
    /// The timestamp is `YYYY-MM-DD HH:MM` interpreted as UTC, with
    /// RFC 3339 accepted as a fallback. A deadline already in the past
    /// flips the message immediately.
    pub async fn schedule_announcement(
        &self,
        role: RoleId,
        timestamp: &str,
        location: &str,
        title: &str,
        body: &str,
    ) -> Result<(MessageId, TaskId)> {
        let deadline = parse_deadline(timestamp)?;
        // Role must exist before anything is posted
        self.graph.role(role)?;

        let text = format!(
            "📅 **{}**\n{}\n🕑 When: {} UTC\n📍 Where: {}\n<@&{}>",
            title,
            body,
            deadline.format(DEADLINE_FORMAT),
            location,
            role
        );
        let channel = self.config.announcement_channel;
        let message = self.gateway.send_message(channel, &text).await?;

        let live_text = format!("🔴 **{}** is live now in {}! <@&{}>", title, location, role);
        let gateway = self.gateway.clone();
        let task = self.scheduler.schedule_at(
            deadline,
            format!("announcement {} goes live", message),
            move || async move { gateway.edit_message(channel, message, &live_text).await },
        );

        info!(message = %message, deadline = %deadline, "Announcement scheduled");
        Ok((message, task))
    }

    /// Moderator-gated immediate announcement
    pub async fn announce(
        &self,
        invoker: MemberId,
        channel: ChannelId,
        body: &str,
    ) -> Result<MessageId> {
        let invoker = self.directory.get(invoker)?;
        if !invoker.holds(self.config.moderator_role) {
            return Err(Error::permission_denied(invoker.id, "moderator tier"));
        }
        let message = self.gateway.send_message(channel, body).await?;
        info!(channel = %channel, message = %message, "Announcement posted");
        Ok(message)
    }

    // ─────────────────────────────────────────────────────────────
    // Event Dispatch
    // ─────────────────────────────────────────────────────────────

    /// Dispatch one inbound gateway event
    pub async fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::MemberJoined { member } => self.on_member_joined(member).await,
            GatewayEvent::MemberLeft { member_id } => {
                if self.directory.remove(member_id).is_some() {
                    info!(member = %member_id, "Member left, record dropped");
                }
            }
            GatewayEvent::ChannelEntered { member_id, channel } => {
                if channel == self.config.stage_channel {
                    self.registry.member_entered(channel, member_id).await;
                } else {
                    debug!(channel = %channel, "Ignoring entry to unmonitored channel");
                }
            }
            GatewayEvent::ChannelLeft { member_id, channel } => {
                if channel == self.config.stage_channel {
                    self.registry.member_left(channel, member_id).await;
                }
            }
        }
    }

    /// Joining members land in the directory with the baseline role;
    /// a rejoin keeps the record already on file
    async fn on_member_joined(&self, member: crate::types::Member) {
        let member_id = member.id;
        let record = match self.directory.get(member_id) {
            Ok(existing) => existing,
            Err(_) => {
                self.directory.upsert(member);
                match self.directory.get(member_id) {
                    Ok(m) => m,
                    Err(_) => return,
                }
            }
        };

        if !record.holds(self.config.baseline_role) {
            match self
                .gateway
                .add_role(member_id, self.config.baseline_role)
                .await
            {
                Ok(()) => {
                    if let Err(e) = self
                        .directory
                        .add_role(member_id, self.config.baseline_role)
                    {
                        warn!(member = %member_id, error = %e, "Directory update failed");
                    }
                }
                Err(e) => {
                    warn!(member = %member_id, error = %e, "Baseline grant failed on join");
                }
            }
        }

        let greeting = format!(
            "👋 Welcome, {}! Run the verify command in the guild to unlock the community.",
            record.base_name
        );
        if let Err(e) = self.gateway.send_direct(member_id, &greeting).await {
            // Closed DMs are common; nothing to reconcile
            debug!(member = %member_id, error = %e, "Join greeting not delivered");
        }

        info!(member = %member_id, "Member joined");
    }

    /// The session registry, for observability surfaces
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The scheduler backing timed work
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

/// Parse an announcement deadline, preferring the short UTC form
fn parse_deadline(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value.trim(), DEADLINE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp {
            value: value.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
