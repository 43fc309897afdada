//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GantryConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Payload ingestion and dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Text command settings.
    #[serde(default)]
    pub commands: CommandsConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of the log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Only honoured with the `json-log` feature; falls back to `Full`.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `gantry_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Dispatch
// =============================================================================

/// Payload ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of the channel between the payload source and the runtime.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Log payloads with no registered entry at `warn` instead of `debug`.
    #[serde(default)]
    pub log_unknown_events: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            log_unknown_events: false,
        }
    }
}

fn default_channel_capacity() -> usize {
    1024
}

// =============================================================================
// Commands
// =============================================================================

/// Text command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Accept a mention of the bot as a prefix.
    #[serde(default)]
    pub mention_prefix: bool,

    /// Match prefixes and command names ignoring case.
    #[serde(default)]
    pub case_insensitive: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            mention_prefix: false,
            case_insensitive: false,
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GantryConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.dispatch.channel_capacity, 1024);
        assert_eq!(config.commands.prefixes, vec!["!"]);
        assert!(!config.commands.mention_prefix);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: GantryConfig = serde_json::from_str(
            r#"{
                "logging": { "level": "debug", "format": "pretty", "filters": { "gantry_framework": "trace" } },
                "commands": { "prefixes": ["?", "gantry "] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filters["gantry_framework"], LogLevel::Trace);
        assert_eq!(config.commands.prefixes, vec!["?", "gantry "]);
        assert_eq!(config.dispatch.channel_capacity, 1024);
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
