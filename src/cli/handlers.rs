//! Command handlers; each returns the process exit code

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::commands::{BuildArgs, ExtractArgs};
use super::output::OutputFormatter;
use crate::bridge::{fallback_invocation, BuildCurrentFile, NotApplicable};
use crate::config::BridgeConfig;
use crate::context::{ManifestContext, ProjectContext};
use crate::session::{BuildSession, ConsoleSink, ExitStatus, LineSink, SessionError};

/// The bridge did not apply and no fallback command is configured
pub const EXIT_NOT_APPLICABLE: i32 = 3;

/// The build tool could not be started
pub const EXIT_LAUNCH_FAILURE: i32 = 127;

/// Any other failure of tundra-bridge itself
pub const EXIT_ERROR: i32 = 1;

pub async fn handle_build(args: &BuildArgs, config: &BridgeConfig) -> i32 {
    let context = match build_context(args) {
        Ok(context) => context,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_ERROR;
        }
    };

    let sink: Arc<dyn LineSink> = Arc::new(ConsoleSink::new().with_stream_tags(args.tag_streams));
    let bridge = BuildCurrentFile::from_config(config).with_echo(config.echo_command && !args.no_echo);

    match bridge.prepare(&context, sink.clone()) {
        Ok(session) => run_session(&bridge, session).await,
        Err(reason) => run_fallback(&bridge, reason, config, &context, sink).await,
    }
}

pub fn handle_extract(args: &ExtractArgs, config: &BridgeConfig) -> i32 {
    let extraction = config.extractor().extract(&args.command_line);
    let formatter = OutputFormatter::new(args.format.into());

    match formatter.format_extraction(&extraction) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_ERROR;
        }
    }

    if extraction.is_recognized() {
        0
    } else {
        EXIT_NOT_APPLICABLE
    }
}

pub fn handle_config(config: &BridgeConfig) -> i32 {
    print!("{}", config);
    0
}

fn build_context(args: &BuildArgs) -> Result<ManifestContext> {
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    let project_dir = match &args.project_dir {
        Some(dir) => absolutize(&cwd, dir),
        None => cwd.clone(),
    };
    let target = absolutize(&cwd, &args.file);

    debug!(
        project_dir = %project_dir.display(),
        target = %target.display(),
        "Loading project context"
    );

    let context = ManifestContext::load(&project_dir, args.configuration.as_deref())
        .context("Failed to load project manifest")?
        .with_target(target)
        .with_command_line(args.command_line.clone());

    Ok(context)
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Runs the session, cancelling the child on Ctrl-C
async fn run_session(bridge: &BuildCurrentFile, session: BuildSession) -> i32 {
    let handle = session.handle();
    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping build");
                handle.cancel();
            }
        })
    };

    let result = bridge.execute(session).await;
    interrupt.abort();
    if handle.is_cancelled() {
        warn!("Build was cancelled before it finished");
    }
    exit_code(result)
}

async fn run_fallback(
    bridge: &BuildCurrentFile,
    reason: NotApplicable,
    config: &BridgeConfig,
    context: &dyn ProjectContext,
    sink: Arc<dyn LineSink>,
) -> i32 {
    let invocation = config
        .fallback_command
        .as_deref()
        .and_then(|command| fallback_invocation(command, context));

    match invocation {
        Some(invocation) => {
            info!(reason = %reason, program = invocation.program(), "Running fallback build command");
            let session =
                BuildSession::new(invocation, sink).with_channel_capacity(config.channel_capacity);
            run_session(bridge, session).await
        }
        None => {
            eprintln!("tundra-bridge: not applicable: {}", reason);
            EXIT_NOT_APPLICABLE
        }
    }
}

fn exit_code(result: Result<ExitStatus, SessionError>) -> i32 {
    match result {
        Ok(status) => status.code,
        Err(e) if e.is_launch_failure() => {
            error!("{}", e);
            EXIT_LAUNCH_FAILURE
        }
        Err(e) => {
            error!("{}", e);
            EXIT_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_absolutize() {
        let base = Path::new("/work");
        assert_eq!(
            absolutize(base, Path::new("src/main.cpp")),
            PathBuf::from("/work/src/main.cpp")
        );
        assert_eq!(
            absolutize(base, Path::new("/abs/main.cpp")),
            PathBuf::from("/abs/main.cpp")
        );
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_code(Ok(ExitStatus { code: 0 })), 0);
        assert_eq!(exit_code(Ok(ExitStatus { code: 2 })), 2);

        let launch = SessionError::LaunchFailure {
            program: "tundra2.exe".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(exit_code(Err(launch)), EXIT_LAUNCH_FAILURE);

        let wait = SessionError::Wait {
            program: "tundra2.exe".to_string(),
            source: io::Error::new(io::ErrorKind::Other, "wait failed"),
        };
        assert_eq!(exit_code(Err(wait)), EXIT_ERROR);
    }
}
