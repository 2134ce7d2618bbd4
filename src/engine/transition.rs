//! The transition engine proper
//!
//! Executes verify, promote, demote and nickname changes under the
//! per-member operation lock. Every operation validates against the
//! hierarchy oracle before the first platform mutation; a request that
//! fails validation leaves no trace on the platform. Once mutation has
//! started, a platform failure surfaces as `PartialApply` carrying the
//! steps that did land, so an operator can reconcile.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::PlatformGateway;
use crate::hierarchy::RoleGraph;
use crate::scheduler::Scheduler;
use crate::types::{AgentIdentity, ChannelId, Member, MemberId, RoleId};

use super::{MemberDirectory, MemberLocks, RankPrefix};

/// Platform display names are capped at this length
const MAX_DISPLAY_NAME_LEN: usize = 32;

// ─────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────

/// Resolved role and channel wiring for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Role marking an unverified member; absence means verified
    pub baseline_role: RoleId,

    /// Roles granted on verification, in grant order
    pub starter_roles: Vec<RoleId>,

    /// Role gating moderator-tier requests
    pub moderator_role: RoleId,

    /// Channel for self-expiring welcome notifications
    pub welcome_channel: ChannelId,

    /// Channel for promotion notifications
    pub promotion_log_channel: ChannelId,

    /// Channel for demotion notifications
    pub demotion_log_channel: ChannelId,

    /// Lifetime of a welcome notification before deletion
    pub welcome_ttl: Duration,
}

// ─────────────────────────────────────────────────────────────────
// Transition Engine
// ─────────────────────────────────────────────────────────────────

/// Serialized, validated role transitions for guild members
pub struct TransitionEngine {
    config: EngineConfig,
    agent: AgentIdentity,
    graph: Arc<RoleGraph>,
    directory: Arc<MemberDirectory>,
    locks: MemberLocks,
    prefix: RankPrefix,
    gateway: Arc<dyn PlatformGateway>,
    scheduler: Arc<Scheduler>,
}

impl TransitionEngine {
    pub fn new(
        config: EngineConfig,
        agent: AgentIdentity,
        graph: Arc<RoleGraph>,
        directory: Arc<MemberDirectory>,
        prefix: RankPrefix,
        gateway: Arc<dyn PlatformGateway>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            config,
            agent,
            graph,
            directory,
            locks: MemberLocks::new(),
            prefix,
            gateway,
            scheduler,
        }
    }

    /// The role graph snapshot the engine validates against
    pub fn graph(&self) -> &RoleGraph {
        &self.graph
    }

    // ─────────────────────────────────────────────────────────────
    // Verify
    // ─────────────────────────────────────────────────────────────

    /// Move a member from the baseline (unverified) state to verified
    ///
    /// Removes the baseline role, grants the starter set, resyncs the
    /// display name and emits a self-expiring welcome notification.
    pub async fn verify(&self, member_id: MemberId) -> Result<()> {
        let lock = self.locks.lock_for(member_id);
        let _guard = lock.lock().await;

        let member = self.directory.get(member_id)?;
        if member.is_verified(self.config.baseline_role) {
            return Err(Error::already(format!(
                "{} is already verified",
                member.base_name
            )));
        }

        // Validation passed; platform mutation begins here.
        let mut completed = Vec::new();

        let baseline = self.config.baseline_role;
        if let Err(e) = self.gateway.remove_role(member_id, baseline).await {
            return Err(partial_apply("verify", completed, e));
        }
        self.directory.remove_role(member_id, baseline)?;
        completed.push(format!("remove-role {}", baseline));

        for role in &self.config.starter_roles {
            if member.holds(*role) {
                continue;
            }
            if let Err(e) = self.gateway.add_role(member_id, *role).await {
                return Err(partial_apply("verify", completed, e));
            }
            self.directory.add_role(member_id, *role)?;
            completed.push(format!("add-role {}", role));
        }

        self.resync_nickname_best_effort(member_id).await;

        let text = format!(
            "🎉 Welcome aboard, {}! You now have full access.",
            member.base_name
        );
        match self
            .gateway
            .send_message(self.config.welcome_channel, &text)
            .await
        {
            Ok(message) => {
                self.scheduler.delete_message_after(
                    self.config.welcome_ttl,
                    self.gateway.clone(),
                    self.config.welcome_channel,
                    message,
                );
            }
            Err(e) => {
                warn!(member = %member_id, error = %e, "Welcome notification failed");
            }
        }

        info!(member = %member_id, "Member verified");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Promote
    // ─────────────────────────────────────────────────────────────

    /// Grant a higher role to a member on behalf of a moderator
    pub async fn promote(
        &self,
        invoker_id: MemberId,
        member_id: MemberId,
        role_id: RoleId,
    ) -> Result<()> {
        let lock = self.locks.lock_for(member_id);
        let _guard = lock.lock().await;

        let invoker = self.directory.get(invoker_id)?;
        let member = self.directory.get(member_id)?;

        self.require_moderator(&invoker)?;
        let role = self.graph.role(role_id)?;
        if !role.assignable {
            return Err(Error::hierarchy(format!(
                "role '{}' is not assignable",
                role.name
            )));
        }
        self.check_rank_bounds(&invoker, role.rank, &role.name)?;

        if member.holds(role_id) {
            return Err(Error::already(format!(
                "{} already holds '{}'",
                member.base_name, role.name
            )));
        }

        self.gateway.add_role(member_id, role_id).await?;
        self.directory.add_role(member_id, role_id)?;

        self.resync_nickname_best_effort(member_id).await;

        let text = format!(
            "📈 {} was promoted to **{}** by {}",
            member.base_name, role.name, invoker.base_name
        );
        self.notify(self.config.promotion_log_channel, &text).await;

        info!(member = %member_id, role = %role_id, invoker = %invoker_id, "Member promoted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Demote
    // ─────────────────────────────────────────────────────────────

    /// Strip a member down to a target role on behalf of a moderator
    ///
    /// Demoting to the baseline role clears every assignable role and
    /// re-grants the baseline. Demoting to any other role removes the
    /// roles ranked at or above the target (baseline excluded) and
    /// ensures the target itself is held.
    pub async fn demote(
        &self,
        invoker_id: MemberId,
        member_id: MemberId,
        target_id: RoleId,
    ) -> Result<()> {
        let lock = self.locks.lock_for(member_id);
        let _guard = lock.lock().await;

        let invoker = self.directory.get(invoker_id)?;
        let member = self.directory.get(member_id)?;

        self.require_moderator(&invoker)?;
        let target = self.graph.role(target_id)?;
        self.check_rank_bounds(&invoker, target.rank, &target.name)?;

        let (to_remove, to_add) = self.plan_demotion(&member, target_id, target.rank)?;

        // Plan computed against the locked snapshot; apply it.
        let mut completed = Vec::new();
        for role in to_remove {
            if let Err(e) = self.gateway.remove_role(member_id, role).await {
                return Err(partial_apply("demote", completed, e));
            }
            self.directory.remove_role(member_id, role)?;
            completed.push(format!("remove-role {}", role));
        }
        for role in to_add {
            if let Err(e) = self.gateway.add_role(member_id, role).await {
                return Err(partial_apply("demote", completed, e));
            }
            self.directory.add_role(member_id, role)?;
            completed.push(format!("add-role {}", role));
        }

        self.resync_nickname_best_effort(member_id).await;

        let text = if target_id == self.config.baseline_role {
            format!(
                "🔄 {} was fully reset to **{}** by {}",
                member.base_name, target.name, invoker.base_name
            )
        } else {
            format!(
                "📉 {} was demoted to **{}** by {}",
                member.base_name, target.name, invoker.base_name
            )
        };
        self.notify(self.config.demotion_log_channel, &text).await;

        info!(member = %member_id, target = %target_id, invoker = %invoker_id, "Member demoted");
        Ok(())
    }

    /// Removal/addition plan for a demotion, never touching roles the
    /// agent itself could not mutate
    fn plan_demotion(
        &self,
        member: &Member,
        target_id: RoleId,
        target_rank: i64,
    ) -> Result<(Vec<RoleId>, Vec<RoleId>)> {
        let baseline = self.config.baseline_role;
        let mut to_remove = Vec::new();
        let mut to_add = Vec::new();

        for id in &member.roles {
            if *id == baseline || *id == target_id {
                continue;
            }
            let role = self.graph.role(*id)?;
            if !role.assignable {
                warn!(member = %member.id, role = %id, "Skipping unassignable role during demotion");
                continue;
            }
            if role.rank >= self.agent.top_rank {
                // Externally granted above our reach; leave it alone.
                warn!(member = %member.id, role = %id, "Skipping role above agent rank during demotion");
                continue;
            }
            let strip = target_id == baseline || role.rank >= target_rank;
            if strip {
                to_remove.push(*id);
            }
        }

        if !member.holds(target_id) {
            to_add.push(target_id);
        }

        Ok((to_remove, to_add))
    }

    // ─────────────────────────────────────────────────────────────
    // Nickname
    // ─────────────────────────────────────────────────────────────

    /// Set a member's display-name override on behalf of a moderator
    pub async fn set_nickname(
        &self,
        invoker_id: MemberId,
        member_id: MemberId,
        name: &str,
    ) -> Result<()> {
        let lock = self.locks.lock_for(member_id);
        let _guard = lock.lock().await;

        let invoker = self.directory.get(invoker_id)?;
        let member = self.directory.get(member_id)?;

        self.require_moderator(&invoker)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("display name must not be empty"));
        }
        if name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(Error::invalid_input(format!(
                "display name exceeds {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }

        // The owner may always be renamed; everyone else is bounded by
        // the agent's own top rank.
        let member_top = self.graph.top_rank(&member.roles)?.unwrap_or(i64::MIN);
        if !member.is_owner && member_top >= self.agent.top_rank {
            return Err(Error::hierarchy(format!(
                "{} outranks the agent",
                member.base_name
            )));
        }

        self.gateway
            .set_display_name(member_id, Some(name.to_string()))
            .await?;
        self.directory
            .set_display_override(member_id, Some(name.to_string()))?;

        info!(member = %member_id, invoker = %invoker_id, "Display name set");
        Ok(())
    }

    /// Recompute and apply the rank-prefixed display name
    ///
    /// Pure function of the member's current role set; applying it
    /// twice in a row is a no-op.
    pub async fn resync_nickname(&self, member_id: MemberId) -> Result<()> {
        let member = self.directory.get(member_id)?;
        let desired = self.prefix.display_for(&member.roles, &member.base_name);
        if desired == member.display_override {
            return Ok(());
        }
        self.gateway
            .set_display_name(member_id, desired.clone())
            .await?;
        self.directory.set_display_override(member_id, desired)?;
        Ok(())
    }

    async fn resync_nickname_best_effort(&self, member_id: MemberId) {
        if let Err(e) = self.resync_nickname(member_id).await {
            warn!(member = %member_id, error = %e, "Display name resync failed");
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Guards
    // ─────────────────────────────────────────────────────────────

    fn require_moderator(&self, invoker: &Member) -> Result<()> {
        if invoker.holds(self.config.moderator_role) {
            Ok(())
        } else {
            Err(Error::permission_denied(invoker.id, "moderator tier"))
        }
    }

    /// Both authority bounds on a requested role rank: the agent's own
    /// top rank, and the invoker's top rank (owner exempt)
    fn check_rank_bounds(&self, invoker: &Member, rank: i64, label: &str) -> Result<()> {
        if rank >= self.agent.top_rank {
            return Err(Error::hierarchy(format!(
                "'{}' sits at or above the agent's top rank",
                label
            )));
        }
        let invoker_top = self.graph.top_rank(&invoker.roles)?.unwrap_or(i64::MIN);
        if !invoker.is_owner && rank >= invoker_top {
            return Err(Error::hierarchy(format!(
                "'{}' sits at or above {}'s top rank",
                label, invoker.base_name
            )));
        }
        Ok(())
    }

    async fn notify(&self, channel: ChannelId, content: &str) {
        if let Err(e) = self.gateway.send_message(channel, content).await {
            warn!(channel = %channel, error = %e, "Notification send failed");
        }
    }
}

/// Wrap a mid-sequence platform failure; validation failures (nothing
/// completed yet) pass through unchanged
fn partial_apply(operation: &str, completed: Vec<String>, cause: Error) -> Error {
    if completed.is_empty() {
        return cause;
    }
    warn!(
        operation = operation,
        completed = ?completed,
        error = %cause,
        "Operation partially applied"
    );
    Error::PartialApply {
        operation: operation.to_string(),
        completed,
        message: cause.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureMode, GatewayOp, MemoryGateway};
    use crate::types::Role;

    const BASELINE: RoleId = RoleId(10);
    const MEMBER_ROLE: RoleId = RoleId(11);
    const CONTRIBUTOR: RoleId = RoleId(12);
    const REGULAR: RoleId = RoleId(13);
    const MODERATOR: RoleId = RoleId(14);
    const ADMIN: RoleId = RoleId(15);

    const WELCOME: ChannelId = ChannelId(100);
    const PROMO_LOG: ChannelId = ChannelId(101);
    const DEMO_LOG: ChannelId = ChannelId(102);

    struct Fixture {
        engine: TransitionEngine,
        gateway: Arc<MemoryGateway>,
        directory: Arc<MemberDirectory>,
    }

    fn make_role(id: RoleId, name: &str, rank: i64) -> Role {
        Role {
            id,
            name: name.into(),
            rank,
            assignable: true,
        }
    }

    fn make_fixture() -> Fixture {
        let graph = Arc::new(RoleGraph::new(vec![
            Role {
                id: ADMIN,
                name: "Admin".into(),
                rank: 8,
                assignable: true,
            },
            make_role(MODERATOR, "Moderator", 5),
            make_role(REGULAR, "Regular", 3),
            make_role(CONTRIBUTOR, "Contributor", 2),
            make_role(MEMBER_ROLE, "Member", 1),
            make_role(BASELINE, "Unverified", 0),
        ]));
        let gateway = Arc::new(MemoryGateway::new());
        let directory = Arc::new(MemberDirectory::new());
        let prefix = RankPrefix::new(vec![
            (MODERATOR, "Ⓜ️".to_string()),
            (REGULAR, "⭐".to_string()),
        ]);
        let config = EngineConfig {
            baseline_role: BASELINE,
            starter_roles: vec![MEMBER_ROLE],
            moderator_role: MODERATOR,
            welcome_channel: WELCOME,
            promotion_log_channel: PROMO_LOG,
            demotion_log_channel: DEMO_LOG,
            welcome_ttl: Duration::from_secs(30),
        };
        // Agent outranks moderators but not admins
        let agent = AgentIdentity {
            member_id: MemberId(999),
            top_rank: 6,
        };
        let engine = TransitionEngine::new(
            config,
            agent,
            graph,
            directory.clone(),
            prefix,
            gateway.clone(),
            Arc::new(Scheduler::new()),
        );
        Fixture {
            engine,
            gateway,
            directory,
        }
    }

    fn add_member(fx: &Fixture, id: u64, name: &str, roles: &[RoleId]) -> MemberId {
        let mut member = Member::new(MemberId(id), name);
        member.roles = roles.iter().copied().collect();
        fx.directory.upsert(member);
        MemberId(id)
    }

    fn add_moderator(fx: &Fixture, id: u64, name: &str) -> MemberId {
        add_member(fx, id, name, &[MEMBER_ROLE, MODERATOR])
    }

    // ─────────────────────────────────────────────────────────────
    // Verify
    // ─────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_verify_grants_starter_set_and_welcome() {
        let fx = make_fixture();
        let id = add_member(&fx, 1, "ada", &[BASELINE]);

        fx.engine.verify(id).await.unwrap();

        let roles = fx.directory.role_set(id).unwrap();
        assert!(!roles.contains(&BASELINE));
        assert!(roles.contains(&MEMBER_ROLE));

        // Exactly one welcome notification, gone after its lifetime
        assert_eq!(fx.gateway.live_messages_in(WELCOME), 1);
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(fx.gateway.live_messages_in(WELCOME), 0);
    }

    #[tokio::test]
    async fn test_verify_twice_is_noop_error() {
        let fx = make_fixture();
        let id = add_member(&fx, 1, "ada", &[BASELINE]);

        fx.engine.verify(id).await.unwrap();
        let before = fx.gateway.journal().len();

        let err = fx.engine.verify(id).await.unwrap_err();
        assert!(err.is_noop());
        // No platform traffic for the repeat
        assert_eq!(fx.gateway.journal().len(), before);
    }

    #[tokio::test]
    async fn test_verify_unknown_member() {
        let fx = make_fixture();
        let err = fx.engine.verify(MemberId(42)).await.unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { .. }));
    }

    #[tokio::test]
    async fn test_verify_welcome_failure_does_not_fail_transition() {
        let fx = make_fixture();
        let id = add_member(&fx, 1, "ada", &[BASELINE]);
        fx.gateway
            .fail_next("send-message", FailureMode::Transient, 1);

        fx.engine.verify(id).await.unwrap();
        assert!(fx.directory.get(id).unwrap().is_verified(BASELINE));
    }

    // ─────────────────────────────────────────────────────────────
    // Promote
    // ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_promote_requires_moderator() {
        let fx = make_fixture();
        let invoker = add_member(&fx, 1, "pleb", &[MEMBER_ROLE]);
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        let err = fx
            .engine
            .promote(invoker, target, CONTRIBUTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
        // Rejected before any platform mutation
        assert!(fx.gateway.journal().is_empty());
    }

    #[tokio::test]
    async fn test_promote_above_agent_rank_rejected() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        let err = fx.engine.promote(invoker, target, ADMIN).await.unwrap_err();
        assert!(matches!(err, Error::HierarchyViolation { .. }));
        assert!(fx.gateway.journal().is_empty());
    }

    #[tokio::test]
    async fn test_promote_at_invoker_rank_rejected_unless_owner() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        // Moderator granting Moderator: at invoker top rank, rejected
        let err = fx
            .engine
            .promote(invoker, target, MODERATOR)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HierarchyViolation { .. }));

        // The owner is exempt from the invoker bound (not the agent bound)
        let mut owner = Member::new(MemberId(3), "owner");
        owner.roles = [MEMBER_ROLE, MODERATOR].into_iter().collect();
        owner.is_owner = true;
        fx.directory.upsert(owner);

        fx.engine
            .promote(MemberId(3), target, MODERATOR)
            .await
            .unwrap();
        assert!(fx.directory.get(target).unwrap().holds(MODERATOR));
    }

    #[tokio::test]
    async fn test_promote_already_held_is_noop_error() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE, CONTRIBUTOR]);

        let err = fx
            .engine
            .promote(invoker, target, CONTRIBUTOR)
            .await
            .unwrap_err();
        assert!(err.is_noop());
        assert!(fx.gateway.journal().is_empty());
    }

    #[tokio::test]
    async fn test_promote_success_notifies_once() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        fx.engine.promote(invoker, target, REGULAR).await.unwrap();

        assert!(fx.directory.get(target).unwrap().holds(REGULAR));
        let notifications = fx.gateway.count_ops(|op| {
            matches!(op, GatewayOp::SendMessage { channel, .. } if *channel == PROMO_LOG)
        });
        assert_eq!(notifications, 1);

        // Rank prefix follows the new top role
        assert_eq!(
            fx.directory.get(target).unwrap().display_override.as_deref(),
            Some("⭐ ada")
        );
    }

    #[tokio::test]
    async fn test_promote_unassignable_role_rejected() {
        let fx = make_fixture();
        let graph = Arc::new(RoleGraph::new(vec![
            make_role(MODERATOR, "Moderator", 5),
            make_role(MEMBER_ROLE, "Member", 1),
            make_role(BASELINE, "Unverified", 0),
            Role {
                id: RoleId(20),
                name: "Linked".into(),
                rank: 2,
                assignable: false,
            },
        ]));
        let engine = TransitionEngine::new(
            EngineConfig {
                baseline_role: BASELINE,
                starter_roles: vec![MEMBER_ROLE],
                moderator_role: MODERATOR,
                welcome_channel: WELCOME,
                promotion_log_channel: PROMO_LOG,
                demotion_log_channel: DEMO_LOG,
                welcome_ttl: Duration::from_secs(30),
            },
            AgentIdentity {
                member_id: MemberId(999),
                top_rank: 6,
            },
            graph,
            fx.directory.clone(),
            RankPrefix::default(),
            fx.gateway.clone(),
            Arc::new(Scheduler::new()),
        );
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        let err = engine
            .promote(invoker, target, RoleId(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HierarchyViolation { .. }));
    }

    // ─────────────────────────────────────────────────────────────
    // Demote
    // ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_demote_to_baseline_resets_everything() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE, CONTRIBUTOR, REGULAR]);

        fx.engine.demote(invoker, target, BASELINE).await.unwrap();

        let roles = fx.directory.role_set(target).unwrap();
        let expected: std::collections::BTreeSet<RoleId> = [BASELINE].into_iter().collect();
        assert_eq!(roles, expected);

        let notifications = fx.gateway.count_ops(|op| {
            matches!(op, GatewayOp::SendMessage { channel, .. } if *channel == DEMO_LOG)
        });
        assert_eq!(notifications, 1);
    }

    #[tokio::test]
    async fn test_demote_strips_at_or_above_target() {
        let fx = make_fixture();
        let invoker = add_member(&fx, 1, "mod", &[MODERATOR, REGULAR, MEMBER_ROLE]);
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE, CONTRIBUTOR, REGULAR]);

        fx.engine.demote(invoker, target, CONTRIBUTOR).await.unwrap();

        let roles = fx.directory.role_set(target).unwrap();
        assert!(roles.contains(&MEMBER_ROLE), "below target is kept");
        assert!(roles.contains(&CONTRIBUTOR), "target is held");
        assert!(!roles.contains(&REGULAR), "above target is stripped");
    }

    #[tokio::test]
    async fn test_demote_grants_target_when_absent() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[REGULAR]);

        fx.engine.demote(invoker, target, CONTRIBUTOR).await.unwrap();

        let roles = fx.directory.role_set(target).unwrap();
        assert!(roles.contains(&CONTRIBUTOR));
        assert!(!roles.contains(&REGULAR));
    }

    #[tokio::test]
    async fn test_demote_reapply_still_notifies() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE, CONTRIBUTOR]);

        fx.engine.demote(invoker, target, CONTRIBUTOR).await.unwrap();
        fx.engine.demote(invoker, target, CONTRIBUTOR).await.unwrap();

        let notifications = fx.gateway.count_ops(|op| {
            matches!(op, GatewayOp::SendMessage { channel, .. } if *channel == DEMO_LOG)
        });
        assert_eq!(notifications, 2);
        // Second pass had no roles left to move
        let role_ops = fx.gateway.count_ops(|op| {
            matches!(op, GatewayOp::AddRole { .. } | GatewayOp::RemoveRole { .. })
        });
        assert_eq!(role_ops, 0);
    }

    #[tokio::test]
    async fn test_demote_partial_failure_reports_completed_steps() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        // Plan: remove REGULAR, then add CONTRIBUTOR
        let target = add_member(&fx, 2, "ada", &[REGULAR]);
        fx.gateway.fail_next("add-role", FailureMode::Transient, 1);

        let err = fx
            .engine
            .demote(invoker, target, CONTRIBUTOR)
            .await
            .unwrap_err();

        match err {
            Error::PartialApply { operation, completed, .. } => {
                assert_eq!(operation, "demote");
                assert_eq!(completed, vec![format!("remove-role {}", REGULAR)]);
            }
            other => panic!("expected PartialApply, got {:?}", other),
        }
        // Directory reflects exactly the steps that landed
        let roles = fx.directory.role_set(target).unwrap();
        assert!(!roles.contains(&REGULAR));
        assert!(!roles.contains(&CONTRIBUTOR));
    }

    #[tokio::test]
    async fn test_demote_to_baseline_keeps_unassignable_role() {
        let fx = make_fixture();
        let graph = Arc::new(RoleGraph::new(vec![
            make_role(MODERATOR, "Moderator", 5),
            make_role(CONTRIBUTOR, "Contributor", 2),
            make_role(MEMBER_ROLE, "Member", 1),
            make_role(BASELINE, "Unverified", 0),
            Role {
                id: RoleId(20),
                name: "Linked".into(),
                rank: 2,
                assignable: false,
            },
        ]));
        let engine = TransitionEngine::new(
            EngineConfig {
                baseline_role: BASELINE,
                starter_roles: vec![MEMBER_ROLE],
                moderator_role: MODERATOR,
                welcome_channel: WELCOME,
                promotion_log_channel: PROMO_LOG,
                demotion_log_channel: DEMO_LOG,
                welcome_ttl: Duration::from_secs(30),
            },
            AgentIdentity {
                member_id: MemberId(999),
                top_rank: 6,
            },
            graph,
            fx.directory.clone(),
            RankPrefix::default(),
            fx.gateway.clone(),
            Arc::new(Scheduler::new()),
        );
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE, CONTRIBUTOR, RoleId(20)]);

        engine.demote(invoker, target, BASELINE).await.unwrap();

        let roles = fx.directory.role_set(target).unwrap();
        assert!(roles.contains(&BASELINE));
        assert!(roles.contains(&RoleId(20)), "unassignable role is left alone");
        assert!(!roles.contains(&MEMBER_ROLE));
        assert!(!roles.contains(&CONTRIBUTOR));
    }

    #[tokio::test]
    async fn test_demote_validation_failure_before_mutation() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[REGULAR]);

        let err = fx.engine.demote(invoker, target, ADMIN).await.unwrap_err();
        assert!(matches!(err, Error::HierarchyViolation { .. }));
        assert!(fx.gateway.journal().is_empty());
    }

    // ─────────────────────────────────────────────────────────────
    // Nickname
    // ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_set_nickname_moderator_gate() {
        let fx = make_fixture();
        let invoker = add_member(&fx, 1, "pleb", &[MEMBER_ROLE]);
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        let err = fx
            .engine
            .set_nickname(invoker, target, "countess")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_set_nickname_respects_agent_bound() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "boss", &[ADMIN]);

        let err = fx
            .engine
            .set_nickname(invoker, target, "renamed")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HierarchyViolation { .. }));
    }

    #[tokio::test]
    async fn test_set_nickname_owner_target_is_exempt() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");

        // The owner outranks the agent (Admin 8 vs agent top rank 6)
        // yet can still be renamed
        let mut owner = Member::new(MemberId(2), "boss");
        owner.roles = [ADMIN].into_iter().collect();
        owner.is_owner = true;
        fx.directory.upsert(owner);

        fx.engine
            .set_nickname(invoker, MemberId(2), "the boss")
            .await
            .unwrap();

        assert_eq!(
            fx.directory
                .get(MemberId(2))
                .unwrap()
                .display_override
                .as_deref(),
            Some("the boss")
        );
    }

    #[tokio::test]
    async fn test_set_nickname_peer_moderator_allowed() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_moderator(&fx, 2, "other-mod");

        // Equal invoker and target rank is fine; only the agent bound
        // applies (Moderator 5 < agent top rank 6)
        fx.engine
            .set_nickname(invoker, target, "renamed")
            .await
            .unwrap();

        assert_eq!(
            fx.directory.get(target).unwrap().display_override.as_deref(),
            Some("renamed")
        );
    }

    #[tokio::test]
    async fn test_set_nickname_success() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        fx.engine
            .set_nickname(invoker, target, "countess")
            .await
            .unwrap();

        assert_eq!(
            fx.directory.get(target).unwrap().display_override.as_deref(),
            Some("countess")
        );
    }

    #[tokio::test]
    async fn test_set_nickname_rejects_empty_and_too_long() {
        let fx = make_fixture();
        let invoker = add_moderator(&fx, 1, "mod");
        let target = add_member(&fx, 2, "ada", &[MEMBER_ROLE]);

        let err = fx
            .engine
            .set_nickname(invoker, target, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        let err = fx
            .engine
            .set_nickname(invoker, target, &long)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_resync_nickname_is_idempotent() {
        let fx = make_fixture();
        let id = add_member(&fx, 1, "ada", &[REGULAR]);

        fx.engine.resync_nickname(id).await.unwrap();
        fx.engine.resync_nickname(id).await.unwrap();

        // Second call saw nothing to change
        let set_ops = fx
            .gateway
            .count_ops(|op| matches!(op, GatewayOp::SetDisplayName { .. }));
        assert_eq!(set_ops, 1);
    }
}
