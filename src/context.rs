//! Project context supplied to the bridge
//!
//! The bridge needs four things from its host: the build command line of the
//! active configuration, the project root, the file to build, and a way to
//! make sure that file is persisted. Any of the first three may be absent,
//! which simply means the bridge does not apply.
//!
//! [`ManifestContext`] reads the command lines from a `tundra-bridge.toml`
//! file in the project root:
//!
//! ```toml
//! active = "Debug"
//!
//! [configurations.Debug]
//! build_command = '"C:\tools\tundra2.exe" -C "C:\proj\t2" win64-msvc-debug-default'
//!
//! [configurations.Release]
//! build_command = '"C:\tools\tundra2.exe" -C "C:\proj\t2" win64-msvc-release-default'
//! ```

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the project manifest
pub const MANIFEST_FILE: &str = "tundra-bridge.toml";

/// What the bridge needs from the host project
pub trait ProjectContext {
    /// Build command line of the active configuration
    fn build_command_line(&self) -> Option<String>;

    /// Project root; the build tool is started from here
    fn project_dir(&self) -> Option<PathBuf>;

    /// Full path of the file to build
    fn target_file(&self) -> Option<PathBuf>;

    /// Ensures the target's pending modifications are on disk
    fn persist_target(&self) -> Result<()>;
}

/// Errors loading the project manifest
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown configuration '{name}'. Available: {}", .available.join(", "))]
    UnknownConfiguration { name: String, available: Vec<String> },
}

#[derive(Debug, Default, Deserialize)]
struct Manifest {
    active: Option<String>,
    #[serde(default)]
    configurations: BTreeMap<String, ConfigurationEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigurationEntry {
    build_command: Option<String>,
}

impl Manifest {
    /// Picks the requested configuration, then `active`, then the only one.
    ///
    /// Only an explicitly requested name must exist; an `active` entry that
    /// names a missing configuration leaves the command line absent.
    fn build_command(&self, requested: Option<&str>) -> Result<Option<String>, ContextError> {
        if let Some(name) = requested {
            return match self.configurations.get(name) {
                Some(entry) => Ok(entry.build_command.clone()),
                None => Err(ContextError::UnknownConfiguration {
                    name: name.to_string(),
                    available: self.configurations.keys().cloned().collect(),
                }),
            };
        }

        let entry = match self.active.as_deref() {
            Some(active) => {
                let entry = self.configurations.get(active);
                if entry.is_none() {
                    debug!(active, "Active configuration is not defined");
                }
                entry
            }
            None if self.configurations.len() == 1 => self.configurations.values().next(),
            None => None,
        };

        Ok(entry.and_then(|e| e.build_command.clone()))
    }
}

/// Project context backed by the project manifest and explicit overrides
#[derive(Debug, Clone, Default)]
pub struct ManifestContext {
    project_dir: Option<PathBuf>,
    command_line: Option<String>,
    target: Option<PathBuf>,
}

impl ManifestContext {
    /// Loads the manifest of `project_dir`.
    ///
    /// A missing project directory or manifest is not an error; the
    /// corresponding context values are just absent.
    pub fn load(project_dir: &Path, configuration: Option<&str>) -> Result<Self, ContextError> {
        if !project_dir.is_dir() {
            debug!(path = %project_dir.display(), "Project directory does not exist");
            return Ok(Self::default());
        }

        let manifest_path = project_dir.join(MANIFEST_FILE);
        let command_line = match fs::read_to_string(&manifest_path) {
            Ok(content) => {
                let manifest: Manifest =
                    toml::from_str(&content).map_err(|source| ContextError::Parse {
                        path: manifest_path.clone(),
                        source,
                    })?;
                manifest.build_command(configuration)?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %manifest_path.display(), "No project manifest");
                None
            }
            Err(source) => {
                return Err(ContextError::Read {
                    path: manifest_path,
                    source,
                })
            }
        };

        Ok(Self {
            project_dir: Some(project_dir.to_path_buf()),
            command_line,
            target: None,
        })
    }

    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Replaces the manifest's command line when `command_line` is set
    pub fn with_command_line(mut self, command_line: Option<String>) -> Self {
        if command_line.is_some() {
            self.command_line = command_line;
        }
        self
    }
}

impl ProjectContext for ManifestContext {
    fn build_command_line(&self) -> Option<String> {
        self.command_line.clone()
    }

    fn project_dir(&self) -> Option<PathBuf> {
        self.project_dir.clone()
    }

    fn target_file(&self) -> Option<PathBuf> {
        self.target.clone()
    }

    /// Files handed in from the command line are already on disk; only check
    /// that the target is a regular file.
    fn persist_target(&self) -> Result<()> {
        match &self.target {
            Some(target) if target.is_file() => Ok(()),
            Some(target) => bail!("Target is not a file: {}", target.display()),
            None => bail!("No target file"),
        }
    }
}
