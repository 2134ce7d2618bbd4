//! Error types for Guildwarden
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - Retryable/fatal classification
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ChannelId, MemberId, MessageId, RoleId};

/// Result type alias for guildwarden operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // Authorization errors (2xx)
    PermissionDenied = 200,
    HierarchyViolation = 201,

    // State errors (3xx)
    AlreadyInState = 300,
    RoleNotFound = 301,
    MemberNotFound = 302,
    ChannelNotFound = 303,
    MessageNotFound = 304,

    // Input errors (4xx)
    InvalidInput = 400,
    InvalidTimestamp = 401,

    // Platform errors (5xx)
    PlatformTransient = 500,
    PlatformPermanent = 501,
    PartialApply = 502,

    // IO errors (6xx)
    IoRead = 600,
    IoWrite = 601,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E200")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // Authorization errors
            300..=399 => 30, // State errors
            400..=499 => 40, // Input errors
            500..=599 => 50, // Platform errors
            600..=699 => 60, // IO errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for guildwarden
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // Authorization Errors
    // ─────────────────────────────────────────────────────────────

    /// Invoker lacks the required authority tier
    #[error("Permission denied: {invoker} lacks {required}")]
    PermissionDenied { invoker: MemberId, required: String },

    /// Requested role/target rank conflicts with agent or invoker authority
    #[error("Hierarchy violation: {message}")]
    HierarchyViolation { message: String },

    // ─────────────────────────────────────────────────────────────
    // State Errors
    // ─────────────────────────────────────────────────────────────

    /// Idempotent no-op: the requested state already holds
    #[error("Already in requested state: {message}")]
    AlreadyInState { message: String },

    /// Referenced role absent in the external role graph
    #[error("Role not found: {role}")]
    RoleNotFound { role: RoleId },

    /// Role name referenced by configuration absent in the graph
    #[error("Role not found by name: {name}")]
    RoleNameNotFound { name: String },

    /// Referenced member is unknown
    #[error("Member not found: {member}")]
    MemberNotFound { member: MemberId },

    /// Referenced channel is unknown
    #[error("Channel not found: {channel}")]
    ChannelNotFound { channel: ChannelId },

    /// Referenced message artifact is gone
    #[error("Message not found: {message}")]
    MessageNotFound { message: MessageId },

    // ─────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed request argument
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Timestamp could not be parsed as UTC
    #[error("Invalid timestamp '{value}': expected `YYYY-MM-DD HH:MM` UTC or RFC 3339")]
    InvalidTimestamp { value: String },

    // ─────────────────────────────────────────────────────────────
    // Platform Errors
    // ─────────────────────────────────────────────────────────────

    /// Retryable platform I/O fault (network blip, rate limit)
    #[error("Platform transient failure during {operation}: {message}")]
    PlatformTransient { operation: String, message: String },

    /// Non-retryable platform fault (missing capability)
    #[error("Platform permanent failure during {operation}: {message}")]
    PlatformPermanent { operation: String, message: String },

    /// Multi-step mutation interrupted by a platform failure
    #[error("{operation} partially applied ({} steps done): {message}", .completed.len())]
    PartialApply {
        operation: String,
        completed: Vec<String>,
        message: String,
    },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Error::HierarchyViolation { .. } => ErrorCode::HierarchyViolation,

            Error::AlreadyInState { .. } => ErrorCode::AlreadyInState,
            Error::RoleNotFound { .. } | Error::RoleNameNotFound { .. } => ErrorCode::RoleNotFound,
            Error::MemberNotFound { .. } => ErrorCode::MemberNotFound,
            Error::ChannelNotFound { .. } => ErrorCode::ChannelNotFound,
            Error::MessageNotFound { .. } => ErrorCode::MessageNotFound,

            Error::InvalidInput { .. } => ErrorCode::InvalidInput,
            Error::InvalidTimestamp { .. } => ErrorCode::InvalidTimestamp,

            Error::PlatformTransient { .. } => ErrorCode::PlatformTransient,
            Error::PlatformPermanent { .. } => ErrorCode::PlatformPermanent,
            Error::PartialApply { .. } => ErrorCode::PartialApply,

            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoWrite,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PlatformTransient { .. } | Error::Io(_))
    }

    /// Check if the error is fatal (service should exit)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::Config(_)
                | Error::Internal(_)
        )
    }

    /// Idempotent no-op rather than a real failure
    pub fn is_noop(&self) -> bool {
        matches!(self, Error::AlreadyInState { .. })
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'guildwarden config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'guildwarden config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options."
            ),
            Error::PermissionDenied { .. } => Some(
                "This request requires the moderator tier. Ask a moderator to run it."
            ),
            Error::HierarchyViolation { .. } => Some(
                "The requested role sits at or above an authority bound. Pick a lower-ranked role or raise the agent's role."
            ),
            Error::RoleNotFound { .. } | Error::RoleNameNotFound { .. } => Some(
                "The role does not exist in the guild's role graph. Check the role list and the configuration."
            ),
            Error::InvalidTimestamp { .. } => Some(
                "Use `YYYY-MM-DD HH:MM` (interpreted as UTC) or a full RFC 3339 timestamp."
            ),
            Error::PlatformTransient { .. } => Some(
                "The platform reported a temporary fault. Retrying the request usually succeeds."
            ),
            Error::PlatformPermanent { .. } => Some(
                "The agent is missing a platform capability. Check its granted permissions."
            ),
            Error::PartialApply { .. } => Some(
                "Some steps were applied before the platform failed. Check the log for the completed steps and reconcile manually."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", code.as_str(), self);

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(invoker: MemberId, required: impl Into<String>) -> Self {
        Error::PermissionDenied {
            invoker,
            required: required.into(),
        }
    }

    /// Create a hierarchy violation error
    pub fn hierarchy(message: impl Into<String>) -> Self {
        Error::HierarchyViolation {
            message: message.into(),
        }
    }

    /// Create an already-in-state no-op error
    pub fn already(message: impl Into<String>) -> Self {
        Error::AlreadyInState {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a transient platform error
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PlatformTransient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a permanent platform error
    pub fn permanent(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PlatformPermanent {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::PermissionDenied.as_str(), "E200");
        assert_eq!(ErrorCode::PlatformTransient.as_str(), "E500");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigNotFound.exit_code(), 10);
        assert_eq!(ErrorCode::HierarchyViolation.exit_code(), 20);
        assert_eq!(ErrorCode::AlreadyInState.exit_code(), 30);
        assert_eq!(ErrorCode::InvalidTimestamp.exit_code(), 40);
        assert_eq!(ErrorCode::PartialApply.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_error_codes() {
        let err = Error::permission_denied(MemberId(7), "moderator");
        assert_eq!(err.code(), ErrorCode::PermissionDenied);

        let err = Error::hierarchy("role at or above agent top rank");
        assert_eq!(err.code(), ErrorCode::HierarchyViolation);

        let err = Error::RoleNotFound { role: RoleId(9) };
        assert_eq!(err.code(), ErrorCode::RoleNotFound);
    }

    #[test]
    fn test_error_retryable() {
        assert!(Error::transient("send-message", "timeout").is_retryable());
        assert!(!Error::permanent("add-role", "missing capability").is_retryable());
        assert!(!Error::hierarchy("nope").is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(Error::config_parse("bad toml").is_fatal());
        assert!(!Error::transient("send-message", "timeout").is_fatal());
        assert!(!Error::already("already verified").is_fatal());
    }

    #[test]
    fn test_error_noop() {
        assert!(Error::already("already verified").is_noop());
        assert!(!Error::hierarchy("nope").is_noop());
    }

    #[test]
    fn test_partial_apply_display() {
        let err = Error::PartialApply {
            operation: "demote".to_string(),
            completed: vec!["remove-role 3".to_string(), "remove-role 4".to_string()],
            message: "connection reset".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("demote"));
        assert!(text.contains("2 steps"));
    }

    #[test]
    fn test_error_suggestions() {
        let err = Error::ConfigNotFound {
            path: PathBuf::from("/test"),
        };
        assert!(err.suggestion().unwrap().contains("config init"));

        let err = Error::InvalidTimestamp {
            value: "soon".into(),
        };
        assert!(err.suggestion().unwrap().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::ConfigNotFound {
            path: PathBuf::from("/test/config.toml"),
        };
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::hierarchy("role above bound");
        let formatted = err.format_for_log();

        assert!(formatted.contains("[E201]"));
        assert!(!formatted.contains("\x1b["));
    }
}
