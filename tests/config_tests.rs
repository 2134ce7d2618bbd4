//! Configuration system tests
//!
//! Tests configuration loading and validation through the CLI surface

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::TestEnvironment;

fn validate(env: &TestEnvironment) -> assert_cmd::assert::Assert {
    Command::cargo_bin("guildwarden")
        .unwrap()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_minimal_config() {
    let env = TestEnvironment::new();
    // Sections may be sparse; everything falls back to defaults
    env.write_config(
        r#"
[service]

[roles]

[channels]

[logging]
"#,
    );

    validate(&env).success();
}

#[test]
fn test_full_config() {
    let env = TestEnvironment::new();
    env.write_config(common::valid_config());
    validate(&env).success();
}

#[test]
fn test_config_show_reflects_file() {
    let env = TestEnvironment::new();
    env.write_config(common::valid_config());

    Command::cargo_bin("guildwarden")
        .unwrap()
        .arg("config")
        .arg("show")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Test Warden"));
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_malformed_toml() {
    let env = TestEnvironment::new();
    env.write_config("this is not [valid toml");

    validate(&env)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("E101"));
}

#[test]
fn test_unknown_baseline_role() {
    let env = TestEnvironment::new();
    env.write_config(
        r#"
[roles]
baseline = "Ghost"
"#,
    );

    validate(&env)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("role graph"));
}

#[test]
fn test_zero_channel_rejected() {
    let env = TestEnvironment::new();
    env.write_config(
        r#"
[channels]
stage = 0
"#,
    );

    validate(&env).failure().code(10);
}

#[test]
fn test_invalid_log_level() {
    let env = TestEnvironment::new();
    env.write_config(
        r#"
[logging]
level = "loud"
"#,
    );

    validate(&env)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("log level"));
}

#[test]
fn test_duplicate_graph_role() {
    let env = TestEnvironment::new();
    env.write_config(
        r#"
[[roles.graph]]
id = 1
name = "Guildwarden"
rank = 100

[[roles.graph]]
id = 1
name = "Duplicate"
rank = 5
"#,
    );

    validate(&env)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("duplicate"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_override_log_level() {
    let env = TestEnvironment::new();
    env.write_config(common::valid_config());

    // An invalid level injected via env makes validation fail
    Command::cargo_bin("guildwarden")
        .unwrap()
        .env("GUILDWARDEN_LOG_LEVEL", "loud")
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .failure()
        .code(10);
}

#[test]
fn test_env_override_baseline_role() {
    let env = TestEnvironment::new();
    env.write_config(common::valid_config());

    // Overriding the baseline to a role missing from the graph fails
    Command::cargo_bin("guildwarden")
        .unwrap()
        .env("GUILDWARDEN_BASELINE_ROLE", "Ghost")
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg(env.config_path())
        .assert()
        .failure()
        .code(10);
}
