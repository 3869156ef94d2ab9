//! Build command line recognition
//!
//! Projects that build through Tundra carry a custom build command such as
//!
//! ```text
//! "C:\tools\tundra2.exe" -C "C:\proj\build" win64-msvc-debug-default
//! ```
//!
//! [`CommandLineExtractor`] pulls the tool path, build directory and
//! configuration token out of that string. Anything that does not look like a
//! Tundra invocation yields [`Extraction::NotRecognized`], which is an expected
//! outcome rather than an error: the caller falls back to another build action.

use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Executable name recognized when no other name is configured
pub const DEFAULT_TOOL_NAME: &str = "tundra2.exe";

/// Structured launch parameters recovered from a build command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchParameters {
    tool_path: String,
    working_directory: String,
    configuration_token: String,
}

impl LaunchParameters {
    /// Path to the build tool executable, quotes stripped
    pub fn tool_path(&self) -> &str {
        &self.tool_path
    }

    /// Build directory passed to the tool via `-C`
    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    /// Four-segment configuration name, e.g. `win64-msvc-debug-default`
    pub fn configuration_token(&self) -> &str {
        &self.configuration_token
    }

    /// Renders the canonical command line for these parameters.
    ///
    /// Extracting the returned string yields parameters equal to `self`.
    pub fn to_command_line(&self) -> String {
        format!(
            "\"{}\" -C \"{}\" {}",
            self.tool_path, self.working_directory, self.configuration_token
        )
    }
}

impl fmt::Display for LaunchParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Result of matching a command line against the Tundra invocation shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Matched(LaunchParameters),
    NotRecognized,
}

impl Extraction {
    pub fn is_recognized(&self) -> bool {
        matches!(self, Extraction::Matched(_))
    }

    pub fn into_params(self) -> Option<LaunchParameters> {
        match self {
            Extraction::Matched(params) => Some(params),
            Extraction::NotRecognized => None,
        }
    }
}

/// Recognizes build command lines that invoke a given tool executable
#[derive(Debug, Clone)]
pub struct CommandLineExtractor {
    tool_name: String,
    pattern: Regex,
}

impl Default for CommandLineExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_NAME)
    }
}

impl CommandLineExtractor {
    /// Creates an extractor for the given executable name (final path segment).
    pub fn new(tool_name: &str) -> Self {
        let tool = regex::escape(tool_name);
        // Groups: 1/2 quoted/bare tool path, 3/4 quoted/bare directory, 5 config
        let pattern = format!(
            r#"^\s*(?:"((?:[^"]*[\\/])?{tool})"|((?:[^\s"]*[\\/])?{tool}))\s+-C\s+(?:"([^"]+)"|([^\s"]+)).*?[\s"](\w+-\w+-\w+-\w+)\b"#
        );
        let pattern = Regex::new(&pattern).expect("valid regex");

        Self {
            tool_name: tool_name.to_string(),
            pattern,
        }
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Matches `raw` against the invocation shape.
    pub fn extract(&self, raw: &str) -> Extraction {
        let Some(caps) = self.pattern.captures(raw) else {
            return Extraction::NotRecognized;
        };

        let tool_path = caps.get(1).or_else(|| caps.get(2));
        let working_directory = caps.get(3).or_else(|| caps.get(4));
        let configuration_token = caps.get(5);

        match (tool_path, working_directory, configuration_token) {
            (Some(tool), Some(dir), Some(config)) => Extraction::Matched(LaunchParameters {
                tool_path: tool.as_str().to_string(),
                working_directory: dir.as_str().to_string(),
                configuration_token: config.as_str().to_string(),
            }),
            _ => Extraction::NotRecognized,
        }
    }
}
