//! Configuration system for Guildwarden
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (GUILDWARDEN_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values
//!
//! Roles are configured by display name and resolved against the role
//! graph once at startup; everything downstream works with ids.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{EngineConfig, RankPrefix};
use crate::error::{Error, Result};
use crate::hierarchy::RoleGraph;
use crate::service::ServiceConfig;
use crate::types::{AgentIdentity, ChannelId, MemberId, Role, RoleId};

/// Main guildwarden configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildConfig {
    /// Service identity and runtime settings
    pub service: ServiceSettings,

    /// Role wiring and the standalone role graph
    pub roles: RoleSettings,

    /// Channel wiring
    pub channels: ChannelSettings,

    /// Timed task settings
    pub scheduler: SchedulerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Service identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Human-readable service name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Member id the agent acts as
    pub agent_member_id: u64,

    /// Tokio worker threads (0 = auto)
    pub worker_threads: u32,
}

/// Role wiring settings
///
/// All role references are display names, resolved against the graph
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSettings {
    /// Role marking an unverified member
    pub baseline: String,

    /// Roles granted on verification, in grant order
    pub starters: Vec<String>,

    /// Role gating moderator-tier requests
    pub moderator: String,

    /// The agent's own role; its rank bounds every mutation
    pub agent: String,

    /// Display-name prefixes, highest authority first
    #[serde(default)]
    pub rank_prefix: Vec<RankPrefixEntry>,

    /// Role graph for standalone mode, in platform declaration order
    pub graph: Vec<RoleEntry>,
}

/// One (role, symbol) pair of the rank prefix priority list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankPrefixEntry {
    pub role: String,
    pub symbol: String,
}

/// One role of the standalone role graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    pub id: u64,
    pub name: String,
    pub rank: i64,
    #[serde(default = "default_true")]
    pub assignable: bool,
}

fn default_true() -> bool {
    true
}

/// Channel wiring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Channel for self-expiring welcome notifications
    pub welcome: u64,

    /// Channel for promotion notifications
    pub promotion_log: u64,

    /// Channel for demotion notifications
    pub demotion_log: u64,

    /// Channel announcements post to
    pub announcements: u64,

    /// Audio channel whose sessions get announced
    pub stage: u64,
}

/// Timed task settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Longest single sleep for deadline tasks, in seconds
    pub countdown_poll_secs: u64,

    /// Welcome notification lifetime, in seconds
    pub welcome_ttl_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            roles: RoleSettings::default(),
            channels: ChannelSettings::default(),
            scheduler: SchedulerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: None,
            agent_member_id: 1,
            worker_threads: 0, // Auto-detect
        }
    }
}

impl Default for RoleSettings {
    fn default() -> Self {
        Self {
            baseline: "Visitor".to_string(),
            starters: vec!["Member".to_string()],
            moderator: "Moderator".to_string(),
            agent: "Guildwarden".to_string(),
            rank_prefix: vec![],
            graph: vec![
                RoleEntry {
                    id: 1,
                    name: "Guildwarden".to_string(),
                    rank: 100,
                    assignable: false,
                },
                RoleEntry {
                    id: 2,
                    name: "Moderator".to_string(),
                    rank: 50,
                    assignable: true,
                },
                RoleEntry {
                    id: 3,
                    name: "Member".to_string(),
                    rank: 10,
                    assignable: true,
                },
                RoleEntry {
                    id: 4,
                    name: "Visitor".to_string(),
                    rank: 0,
                    assignable: true,
                },
            ],
        }
    }
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            welcome: 100,
            promotion_log: 101,
            demotion_log: 102,
            announcements: 103,
            stage: 104,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            countdown_poll_secs: 60,
            welcome_ttl_secs: 30,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl GuildConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)?;
            config = toml::from_str(&content).map_err(|e| Error::config_parse(e.to_string()))?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::ConfigNotFound { path });
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("guildwarden.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("guildwarden").join("guildwarden.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".guildwarden").join("guildwarden.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/guildwarden/guildwarden.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Service settings
        if let Ok(val) = std::env::var("GUILDWARDEN_SERVICE_NAME") {
            self.service.name = Some(val);
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_AGENT_MEMBER_ID") {
            if let Ok(n) = val.parse() {
                self.service.agent_member_id = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_WORKER_THREADS") {
            if let Ok(n) = val.parse() {
                self.service.worker_threads = n;
            }
        }

        // Role settings
        if let Ok(val) = std::env::var("GUILDWARDEN_BASELINE_ROLE") {
            self.roles.baseline = val;
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_MODERATOR_ROLE") {
            self.roles.moderator = val;
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_AGENT_ROLE") {
            self.roles.agent = val;
        }

        // Channel settings
        if let Ok(val) = std::env::var("GUILDWARDEN_WELCOME_CHANNEL") {
            if let Ok(n) = val.parse() {
                self.channels.welcome = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_PROMOTION_LOG_CHANNEL") {
            if let Ok(n) = val.parse() {
                self.channels.promotion_log = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_DEMOTION_LOG_CHANNEL") {
            if let Ok(n) = val.parse() {
                self.channels.demotion_log = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_ANNOUNCEMENT_CHANNEL") {
            if let Ok(n) = val.parse() {
                self.channels.announcements = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_STAGE_CHANNEL") {
            if let Ok(n) = val.parse() {
                self.channels.stage = n;
            }
        }

        // Scheduler settings
        if let Ok(val) = std::env::var("GUILDWARDEN_COUNTDOWN_POLL_SECS") {
            if let Ok(n) = val.parse() {
                self.scheduler.countdown_poll_secs = n;
            }
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_WELCOME_TTL_SECS") {
            if let Ok(n) = val.parse() {
                self.scheduler.welcome_ttl_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("GUILDWARDEN_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("GUILDWARDEN_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.roles.baseline.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "roles.baseline",
                "baseline role name cannot be empty",
            ));
        }
        if self.roles.moderator.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "roles.moderator",
                "moderator role name cannot be empty",
            ));
        }
        if self.roles.agent.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "roles.agent",
                "agent role name cannot be empty",
            ));
        }

        // Graph entries must be unique by id and name
        let mut seen_ids = std::collections::HashSet::new();
        let mut seen_names = std::collections::HashSet::new();
        for entry in &self.roles.graph {
            if !seen_ids.insert(entry.id) {
                return Err(Error::config_field_invalid(
                    "roles.graph",
                    format!("duplicate role id {}", entry.id),
                ));
            }
            if !seen_names.insert(entry.name.as_str()) {
                return Err(Error::config_field_invalid(
                    "roles.graph",
                    format!("duplicate role name '{}'", entry.name),
                ));
            }
        }

        // Every configured role name must resolve against the graph
        if !self.roles.graph.is_empty() {
            let known = |name: &str| self.roles.graph.iter().any(|e| e.name == name);
            for (field, name) in [
                ("roles.baseline", self.roles.baseline.as_str()),
                ("roles.moderator", self.roles.moderator.as_str()),
                ("roles.agent", self.roles.agent.as_str()),
            ] {
                if !known(name) {
                    return Err(Error::config_field_invalid(
                        field,
                        format!("role '{}' is not in the role graph", name),
                    ));
                }
            }
            for starter in &self.roles.starters {
                if !known(starter) {
                    return Err(Error::config_field_invalid(
                        "roles.starters",
                        format!("role '{}' is not in the role graph", starter),
                    ));
                }
            }
            for entry in &self.roles.rank_prefix {
                if !known(&entry.role) {
                    return Err(Error::config_field_invalid(
                        "roles.rank_prefix",
                        format!("role '{}' is not in the role graph", entry.role),
                    ));
                }
            }
        }

        // Channels must be wired
        for (field, id) in [
            ("channels.welcome", self.channels.welcome),
            ("channels.promotion_log", self.channels.promotion_log),
            ("channels.demotion_log", self.channels.demotion_log),
            ("channels.announcements", self.channels.announcements),
            ("channels.stage", self.channels.stage),
        ] {
            if id == 0 {
                return Err(Error::config_field_invalid(field, "channel id cannot be 0"));
            }
        }

        if self.scheduler.welcome_ttl_secs == 0 {
            return Err(Error::config_field_invalid(
                "scheduler.welcome_ttl_secs",
                "welcome lifetime must be positive",
            ));
        }
        if self.scheduler.countdown_poll_secs == 0 {
            return Err(Error::config_field_invalid(
                "scheduler.countdown_poll_secs",
                "poll interval must be positive",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Resolve role names against the configured role graph
    ///
    /// Produces everything the engine and facade need wired up by id.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let graph = Arc::new(RoleGraph::new(
            self.roles
                .graph
                .iter()
                .map(|e| Role {
                    id: RoleId(e.id),
                    name: e.name.clone(),
                    rank: e.rank,
                    assignable: e.assignable,
                })
                .collect(),
        ));

        let baseline = graph.role_by_name(&self.roles.baseline)?.id;
        let moderator = graph.role_by_name(&self.roles.moderator)?.id;
        let agent_role = graph.role_by_name(&self.roles.agent)?;
        let agent = AgentIdentity {
            member_id: MemberId(self.service.agent_member_id),
            top_rank: agent_role.rank,
        };

        let mut starters = Vec::with_capacity(self.roles.starters.len());
        for name in &self.roles.starters {
            starters.push(graph.role_by_name(name)?.id);
        }

        let mut prefix = Vec::with_capacity(self.roles.rank_prefix.len());
        for entry in &self.roles.rank_prefix {
            prefix.push((graph.role_by_name(&entry.role)?.id, entry.symbol.clone()));
        }

        let engine = EngineConfig {
            baseline_role: baseline,
            starter_roles: starters,
            moderator_role: moderator,
            welcome_channel: ChannelId(self.channels.welcome),
            promotion_log_channel: ChannelId(self.channels.promotion_log),
            demotion_log_channel: ChannelId(self.channels.demotion_log),
            welcome_ttl: Duration::from_secs(self.scheduler.welcome_ttl_secs),
        };
        let service = ServiceConfig {
            baseline_role: baseline,
            moderator_role: moderator,
            announcement_channel: ChannelId(self.channels.announcements),
            stage_channel: ChannelId(self.channels.stage),
        };

        Ok(ResolvedConfig {
            graph,
            engine,
            service,
            prefix: RankPrefix::new(prefix),
            agent,
            countdown_poll: Duration::from_secs(self.scheduler.countdown_poll_secs),
        })
    }
}

/// The name-resolved, id-wired view of a [`GuildConfig`]
pub struct ResolvedConfig {
    pub graph: Arc<RoleGraph>,
    pub engine: EngineConfig,
    pub service: ServiceConfig,
    pub prefix: RankPrefix,
    pub agent: AgentIdentity,
    pub countdown_poll: Duration,
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".guildwarden")
                .join("guildwarden.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // Generate default config with comments
    let config_content = generate_default_config();

    // Write the file
    fs::write(&config_path, config_content).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Guildwarden Configuration

[service]
# Human-readable service name
# name = "My Guildwarden"

# Member id the agent acts as
agent_member_id = 1

# Tokio worker threads (0 = auto-detect)
worker_threads = 0

[roles]
# Role marking an unverified member
baseline = "Visitor"

# Roles granted on verification, in grant order
starters = ["Member"]

# Role gating moderator-tier requests
moderator = "Moderator"

# The agent's own role; its rank bounds every mutation
agent = "Guildwarden"

# Display-name prefixes, highest authority first
# [[roles.rank_prefix]]
# role = "Moderator"
# symbol = "M"

# Role graph for standalone mode, in platform declaration order
[[roles.graph]]
id = 1
name = "Guildwarden"
rank = 100
assignable = false

[[roles.graph]]
id = 2
name = "Moderator"
rank = 50

[[roles.graph]]
id = 3
name = "Member"
rank = 10

[[roles.graph]]
id = 4
name = "Visitor"
rank = 0

[channels]
# Channel for self-expiring welcome notifications
welcome = 100

# Channel for promotion notifications
promotion_log = 101

# Channel for demotion notifications
demotion_log = 102

# Channel announcements post to
announcements = 103

# Audio channel whose sessions get announced
stage = 104

[scheduler]
# Longest single sleep for deadline tasks, in seconds
countdown_poll_secs = 60

# Welcome notification lifetime, in seconds
welcome_ttl_secs = 30

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.guildwarden/logs/guildwarden.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
