//! Build session errors

use std::io;
use thiserror::Error;

/// Errors that end a build session without an exit status
#[derive(Debug, Error)]
pub enum SessionError {
    /// The build process could not be created (missing tool, permission
    /// denied, invalid working directory)
    #[error("Failed to launch {program}: {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Waiting for the build process to exit failed
    #[error("Failed waiting for {program} to exit: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, SessionError::LaunchFailure { .. })
    }

    /// Text of the underlying OS error
    pub fn os_message(&self) -> String {
        match self {
            SessionError::LaunchFailure { source, .. } | SessionError::Wait { source, .. } => {
                source.to_string()
            }
        }
    }
}
