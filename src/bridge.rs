//! "Build current file" flow
//!
//! Ties the pieces together the way an editor command would: read the project
//! context, recognize the build command line, make sure the target is saved,
//! then run the build tool for that single file while the log sink shows its
//! output. When the project is not set up for Tundra the flow reports
//! [`BuildOutcome::NotApplicable`] so the host can fall back to another build
//! action.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::context::ProjectContext;
use crate::extract::{CommandLineExtractor, Extraction};
use crate::session::{
    BuildSession, ExitStatus, Invocation, LineSink, OutputLine, SessionError,
    DEFAULT_CHANNEL_CAPACITY,
};

/// Why the bridge did not run a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotApplicable {
    NoCommandLine,
    NoProjectDir,
    NoTarget,
    Unrecognized,
    TargetNotPersisted,
}

impl fmt::Display for NotApplicable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            NotApplicable::NoCommandLine => "no build command line configured",
            NotApplicable::NoProjectDir => "no project directory",
            NotApplicable::NoTarget => "no target file",
            NotApplicable::Unrecognized => "build command line does not invoke the build tool",
            NotApplicable::TargetNotPersisted => "target file could not be saved",
        };
        f.write_str(reason)
    }
}

/// Result of one "build current file" request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Finished(ExitStatus),
    NotApplicable(NotApplicable),
}

/// Builds the project's current file with the build tool
#[derive(Debug, Clone)]
pub struct BuildCurrentFile {
    extractor: CommandLineExtractor,
    echo_command: bool,
    channel_capacity: usize,
}

impl Default for BuildCurrentFile {
    fn default() -> Self {
        Self::new(CommandLineExtractor::default())
    }
}

impl BuildCurrentFile {
    pub fn new(extractor: CommandLineExtractor) -> Self {
        Self {
            extractor,
            echo_command: true,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            extractor: config.extractor(),
            echo_command: config.echo_command,
            channel_capacity: config.channel_capacity,
        }
    }

    pub fn with_echo(mut self, echo_command: bool) -> Self {
        self.echo_command = echo_command;
        self
    }

    /// Resolves the context into a ready-to-run session.
    ///
    /// The target is persisted before the session is created.
    pub fn prepare(
        &self,
        context: &dyn ProjectContext,
        sink: Arc<dyn LineSink>,
    ) -> Result<BuildSession, NotApplicable> {
        let command_line = context
            .build_command_line()
            .ok_or(NotApplicable::NoCommandLine)?;
        let project_dir = context.project_dir().ok_or(NotApplicable::NoProjectDir)?;
        let target = context.target_file().ok_or(NotApplicable::NoTarget)?;

        let params = match self.extractor.extract(&command_line) {
            Extraction::Matched(params) => params,
            Extraction::NotRecognized => {
                debug!(command_line = %command_line, "Not a build tool command line");
                return Err(NotApplicable::Unrecognized);
            }
        };

        if let Err(e) = context.persist_target() {
            warn!(target = %target.display(), error = %e, "Failed to persist target");
            return Err(NotApplicable::TargetNotPersisted);
        }

        debug!(
            tool = params.tool_path(),
            build_dir = params.working_directory(),
            config = params.configuration_token(),
            target = %target.display(),
            "Prepared build"
        );

        Ok(
            BuildSession::for_target(&params, &target, &project_dir, sink)
                .with_channel_capacity(self.channel_capacity),
        )
    }

    /// Runs a prepared session, reporting progress to its sink.
    ///
    /// The sink is cleared and activated first. Launch failures are reported
    /// to the sink and then returned.
    pub async fn execute(&self, session: BuildSession) -> Result<ExitStatus, SessionError> {
        let sink = session.sink().clone();
        let program = session.invocation().program().to_string();

        sink.clear();
        sink.activate();
        if self.echo_command {
            sink.accept(&OutputLine::stdout(session.invocation().display_line()));
        }

        match session.run().await {
            Ok(status) => {
                sink.accept(&OutputLine::stdout(format!("Exit code: {}", status.code)));
                Ok(status)
            }
            Err(e) => {
                if e.is_launch_failure() {
                    sink.accept(&OutputLine::stderr(format!("Failed to launch {}", program)));
                }
                sink.accept(&OutputLine::stderr(e.os_message()));
                Err(e)
            }
        }
    }

    /// Prepares and executes in one step
    pub async fn run(
        &self,
        context: &dyn ProjectContext,
        sink: Arc<dyn LineSink>,
    ) -> Result<BuildOutcome, SessionError> {
        match self.prepare(context, sink) {
            Ok(session) => self.execute(session).await.map(BuildOutcome::Finished),
            Err(reason) => {
                info!(reason = %reason, "Build bridge not applicable");
                Ok(BuildOutcome::NotApplicable(reason))
            }
        }
    }
}

/// Invocation of the host's fallback build command.
///
/// The target file, when known, is appended as the last argument; the command
/// runs from the project directory when there is one.
pub fn fallback_invocation(command: &[String], context: &dyn ProjectContext) -> Option<Invocation> {
    let (program, args) = command.split_first()?;

    let mut invocation = Invocation::new(program.as_str()).args(args.iter().cloned());
    if let Some(target) = context.target_file() {
        invocation = invocation.arg(target.to_string_lossy());
    }
    if let Some(dir) = context.project_dir().filter(|d: &PathBuf| d.is_dir()) {
        invocation = invocation.current_dir(dir);
    }
    Some(invocation)
}
