//! Common test utilities and fixtures

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Isolated environment for CLI tests: a temp dir holding a config file
pub struct TestEnvironment {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("guildwarden.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    pub fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    pub fn config_path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

/// A complete, valid configuration for test use
pub fn valid_config() -> &'static str {
    r#"
[service]
name = "Test Warden"
agent_member_id = 1

[roles]
baseline = "Visitor"
starters = ["Member"]
moderator = "Moderator"
agent = "Guildwarden"

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
welcome = 100
promotion_log = 101
demotion_log = 102
announcements = 103
stage = 104

[logging]
level = "info"
"#
}
