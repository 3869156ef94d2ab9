//! Configuration management for tundra-bridge
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `TUNDRA_BRIDGE_TOOL`: Build tool executable name - default: "tundra2.exe"
//! - `TUNDRA_BRIDGE_LOG_LEVEL`: Logging level - default: "info"
//! - `TUNDRA_BRIDGE_LOG_JSON`: JSON log output (true|false) - default: "false"
//! - `TUNDRA_BRIDGE_ECHO`: Echo the invocation to the sink (true|false) - default: "true"
//! - `TUNDRA_BRIDGE_FALLBACK`: Command run when the bridge does not apply - default: unset
//! - `TUNDRA_BRIDGE_CHANNEL_CAPACITY`: Buffered output lines - default: "1024"
//!
//! # Example
//!
//! ```no_run
//! use tundra_bridge::BridgeConfig;
//!
//! let config = BridgeConfig::default();
//! config.validate().expect("Invalid configuration");
//! let extractor = config.extractor();
//! ```

use crate::extract::{CommandLineExtractor, DEFAULT_TOOL_NAME};
use crate::session::DEFAULT_CHANNEL_CAPACITY;
use std::env;
use std::fmt;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ECHO_COMMAND: bool = true;
const MAX_CHANNEL_CAPACITY: usize = 1_048_576;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Runtime configuration of the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Executable name the build command line must invoke
    pub tool_name: String,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Use JSON log output
    pub log_json: bool,

    /// Write the invocation line to the sink before starting the build
    pub echo_command: bool,

    /// Program and arguments run when the bridge is not applicable
    pub fallback_command: Option<Vec<String>>,

    /// Bound of the line channel between stream readers and the sink
    pub channel_capacity: usize,
}

impl Default for BridgeConfig {
    /// Loads configuration from `TUNDRA_BRIDGE_*` environment variables,
    /// falling back to defaults for anything missing or unparsable
    fn default() -> Self {
        let tool_name = env::var("TUNDRA_BRIDGE_TOOL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TOOL_NAME.to_string());

        let log_level = env::var("TUNDRA_BRIDGE_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let log_json = env::var("TUNDRA_BRIDGE_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let echo_command = env::var("TUNDRA_BRIDGE_ECHO")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(DEFAULT_ECHO_COMMAND);

        let fallback_command = env::var("TUNDRA_BRIDGE_FALLBACK")
            .ok()
            .map(|v| v.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty());

        let channel_capacity = env::var("TUNDRA_BRIDGE_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CHANNEL_CAPACITY);

        Self {
            tool_name,
            log_level,
            log_json,
            echo_command,
            fallback_command,
            channel_capacity,
        }
    }
}

impl BridgeConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the tool name is empty or contains a path
    /// separator, the log level is unknown, or the channel capacity is out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Tool name must not be empty".to_string(),
            ));
        }
        if self.tool_name.contains(['/', '\\']) {
            return Err(ConfigError::ValidationFailed(format!(
                "Tool name must be a file name, not a path: {}",
                self.tool_name
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::ValidationFailed(format!(
                "Channel capacity must be between 1 and {}",
                MAX_CHANNEL_CAPACITY
            )));
        }

        Ok(())
    }

    /// Extractor recognizing command lines that invoke the configured tool
    pub fn extractor(&self) -> CommandLineExtractor {
        CommandLineExtractor::new(&self.tool_name)
    }
}

impl fmt::Display for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tundra-bridge Configuration:")?;
        writeln!(f, "  Tool: {}", self.tool_name)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Log JSON: {}", self.log_json)?;
        writeln!(f, "  Echo Command: {}", self.echo_command)?;
        match &self.fallback_command {
            Some(cmd) => writeln!(f, "  Fallback: {}", cmd.join(" "))?,
            None => writeln!(f, "  Fallback: (none)")?,
        }
        writeln!(f, "  Channel Capacity: {}", self.channel_capacity)?;
        Ok(())
    }
}
