//! tundra-bridge - build a single file with the Tundra build tool
//!
//! Projects that build through Tundra configure a custom build command like
//! `"C:\tools\tundra2.exe" -C "C:\proj\t2" win64-msvc-debug-default`. This
//! crate recognizes such a command line, runs the tool for one source file,
//! and streams the tool's output to a log sink while it runs.
//!
//! # Core Concepts
//!
//! - **Extraction**: recognizing the tool path, build directory and
//!   configuration token in a command line ([`extract`])
//! - **Session**: one build tool process whose stdout and stderr are drained
//!   concurrently into a [`LineSink`] ([`session`])
//! - **Project context**: what the host supplies: command line, project root
//!   and target file ([`context`])
//!
//! # Example Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tundra_bridge::{BuildSession, CommandLineExtractor, ConsoleSink, Extraction};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let raw = r#""C:\tools\tundra2.exe" -C "C:\proj\t2" win64-msvc-debug-default"#;
//! if let Extraction::Matched(params) = CommandLineExtractor::default().extract(raw) {
//!     let session = BuildSession::for_target(
//!         &params,
//!         Path::new(r"C:\proj\src\main.cpp"),
//!         Path::new(r"C:\proj"),
//!         Arc::new(ConsoleSink::new()),
//!     );
//!     let status = session.run().await?;
//!     println!("Exit code: {}", status.code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod cli;
pub mod config;
pub mod context;
pub mod extract;
pub mod session;
pub mod util;

pub use bridge::{BuildCurrentFile, BuildOutcome, NotApplicable};
pub use config::{BridgeConfig, ConfigError};
pub use context::{ContextError, ManifestContext, ProjectContext};
pub use extract::{CommandLineExtractor, Extraction, LaunchParameters};
pub use session::{
    BuildSession, ConsoleSink, ExitStatus, Invocation, LineSink, MemorySink, OutputLine,
    SessionError, SessionHandle, StreamSource,
};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
