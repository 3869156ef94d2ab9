//! Build process execution with streamed output
//!
//! A [`BuildSession`] owns exactly one child process. Standard output and
//! standard error are read by two independent tasks so that neither pipe can
//! fill up and stall the child while the other is being read. Both tasks push
//! completed lines into one channel; the session loop hands each line to the
//! sink as soon as it arrives while concurrently waiting for the child to
//! exit. The exit status is only reported once both streams are drained.
//!
//! On Unix the child leads its own process group, so cancelling a session
//! also stops the compilers and other processes the build tool started.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::error::SessionError;
use super::sink::{LineSink, OutputLine, StreamSource};
use crate::extract::LaunchParameters;

/// Default bound of the line channel between readers and the sink
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Exit code reported when the child was terminated without one (signal)
pub const NO_EXIT_CODE: i32 = -1;

/// How long output may keep flowing after a cancelled child has exited
pub const CANCEL_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Final status of a build process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i32,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code().unwrap_or(NO_EXIT_CODE),
        }
    }
}

/// Program, arguments and working directory of a process to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Tundra invocation building a single target file.
    ///
    /// Arguments are `-C <build dir> <target> <configuration>` in that order;
    /// the process itself runs from the project directory.
    pub fn for_target(params: &LaunchParameters, target: &Path, project_dir: &Path) -> Self {
        Self::new(params.tool_path())
            .arg("-C")
            .arg(params.working_directory())
            .arg(target.to_string_lossy())
            .arg(params.configuration_token())
            .current_dir(project_dir)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Human-readable command line; arguments containing whitespace are quoted
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.chars().any(char::is_whitespace) {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        command.process_group(0);

        // No console window for the child on Windows
        #[cfg(windows)]
        command.creation_flags(0x0800_0000);

        command
    }
}

/// Requests termination of a running [`BuildSession`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SessionHandle {
    /// Best-effort kill of the child process. Output already produced is
    /// still delivered and the session reports the resulting status.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// One build process invocation relaying its output to a sink
pub struct BuildSession {
    invocation: Invocation,
    sink: Arc<dyn LineSink>,
    channel_capacity: usize,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl BuildSession {
    pub fn new(invocation: Invocation, sink: Arc<dyn LineSink>) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            invocation,
            sink,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn for_target(
        params: &LaunchParameters,
        target: &Path,
        project_dir: &Path,
        sink: Arc<dyn LineSink>,
    ) -> Self {
        Self::new(Invocation::for_target(params, target, project_dir), sink)
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn sink(&self) -> &Arc<dyn LineSink> {
        &self.sink
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel_tx.clone(),
        }
    }

    /// Runs the process to completion.
    ///
    /// Every line written by the child is delivered to the sink before this
    /// returns. Fails with [`SessionError::LaunchFailure`] if the process
    /// cannot be started; in that case the sink receives nothing.
    pub async fn run(self) -> Result<ExitStatus, SessionError> {
        let BuildSession {
            invocation,
            sink,
            channel_capacity,
            cancel_tx: _cancel_tx,
            mut cancel_rx,
        } = self;

        let program = invocation.program().to_string();
        let started = Instant::now();

        debug!(
            program = %program,
            args = ?invocation.arguments(),
            cwd = ?invocation.working_dir(),
            "Spawning build process"
        );

        let mut child = invocation
            .command()
            .spawn()
            .map_err(|source| SessionError::LaunchFailure {
                program: program.clone(),
                source,
            })?;
        let pid = child.id();

        let (tx, mut rx) = mpsc::channel::<OutputLine>(channel_capacity);
        let mut readers: Vec<JoinHandle<usize>> = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(relay_stream(
                stdout,
                StreamSource::Stdout,
                tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(relay_stream(
                stderr,
                StreamSource::Stderr,
                tx.clone(),
            )));
        }
        // The channel closes once both readers have finished
        drop(tx);

        let mut status: Option<std::process::ExitStatus> = None;
        let mut streams_open = true;
        let mut watching_cancel = true;
        let mut delivered = 0usize;
        let mut drain_deadline: Option<tokio::time::Instant> = None;

        while status.is_none() || streams_open {
            tokio::select! {
                line = rx.recv(), if streams_open => match line {
                    Some(line) => {
                        sink.accept(&line);
                        delivered += 1;
                    }
                    None => streams_open = false,
                },
                result = child.wait(), if status.is_none() => {
                    let exited = result.map_err(|source| SessionError::Wait {
                        program: program.clone(),
                        source,
                    })?;
                    trace!(program = %program, "Build process exited, draining output");
                    status = Some(exited);
                }
                changed = cancel_rx.changed(), if watching_cancel => {
                    if changed.is_err() {
                        watching_cancel = false;
                    } else if *cancel_rx.borrow() {
                        watching_cancel = false;
                        warn!(program = %program, "Cancelling build process");
                        if let Err(e) = terminate(&mut child, pid) {
                            warn!(program = %program, error = %e, "Failed to kill build process");
                        }
                        drain_deadline = Some(tokio::time::Instant::now() + CANCEL_DRAIN_GRACE);
                    }
                }
                _ = tokio::time::sleep_until(
                    drain_deadline.unwrap_or_else(tokio::time::Instant::now)
                ), if drain_deadline.is_some() && status.is_some() => {
                    warn!(program = %program, "Output still open after cancellation, abandoning readers");
                    break;
                }
            }
        }

        for reader in readers {
            if streams_open {
                reader.abort();
            }
            match reader.await {
                Ok(_) => {}
                Err(e) if e.is_cancelled() => {
                    debug!(program = %program, "Output reader abandoned");
                }
                Err(e) => {
                    warn!(program = %program, error = %e, "Output reader task failed");
                }
            }
        }

        let status = match status {
            Some(status) => ExitStatus::from(status),
            None => ExitStatus { code: NO_EXIT_CODE },
        };

        info!(
            program = %program,
            code = status.code,
            lines = delivered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Build process finished"
        );

        Ok(status)
    }
}

/// Kills the child and, on Unix, every process in its group
fn terminate(child: &mut Child, pid: Option<u32>) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // Negative pid signals the whole process group
            let ret = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
            if ret == 0 {
                return Ok(());
            }
            debug!(pid, error = %io::Error::last_os_error(), "Process group kill failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    child.start_kill()
}

/// Reads `stream` line by line and forwards each line tagged with `source`.
///
/// A read error is forwarded as a line of its own and ends this stream only.
async fn relay_stream<R>(stream: R, source: StreamSource, tx: mpsc::Sender<OutputLine>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = OutputLine::new(source, decode_line(&buf));
                if tx.send(line).await.is_err() {
                    break;
                }
                count += 1;
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Failed reading build output");
                let line = OutputLine::new(source, format!("error reading {}: {}", source, e));
                let _ = tx.send(line).await;
                break;
            }
        }
    }

    trace!(source = %source, lines = count, "Output stream closed");
    count
}

/// Strips the line terminator and decodes lossily
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::CommandLineExtractor;
    use crate::session::MemorySink;

    fn params() -> LaunchParameters {
        CommandLineExtractor::default()
            .extract(r#""C:\tools\tundra2.exe" -C "C:\proj\t2" win64-msvc-debug-default"#)
            .into_params()
            .unwrap()
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
    }

    #[test]
    fn test_for_target_argument_order() {
        let invocation = Invocation::for_target(
            &params(),
            Path::new(r"C:\proj\src\main.cpp"),
            Path::new(r"C:\proj"),
        );

        assert_eq!(invocation.program(), r"C:\tools\tundra2.exe");
        assert_eq!(
            invocation.arguments(),
            &[
                "-C".to_string(),
                r"C:\proj\t2".to_string(),
                r"C:\proj\src\main.cpp".to_string(),
                "win64-msvc-debug-default".to_string(),
            ]
        );
        assert_eq!(invocation.working_dir(), Some(Path::new(r"C:\proj")));
    }

    #[test]
    fn test_display_line_quotes_arguments_with_spaces() {
        let invocation = Invocation::for_target(
            &params(),
            Path::new(r"C:\my proj\main.cpp"),
            Path::new(r"C:\my proj"),
        );
        assert_eq!(
            invocation.display_line(),
            r#"C:\tools\tundra2.exe -C C:\proj\t2 "C:\my proj\main.cpp" win64-msvc-debug-default"#
        );
    }

    #[test]
    fn test_exit_status_success() {
        assert!(ExitStatus { code: 0 }.success());
        assert!(!ExitStatus { code: 2 }.success());
        assert!(!ExitStatus { code: NO_EXIT_CODE }.success());
    }

    #[test]
    fn test_channel_capacity_has_floor() {
        let session = BuildSession::new(Invocation::new("true"), Arc::new(MemorySink::new()))
            .with_channel_capacity(0);
        assert_eq!(session.channel_capacity, 1);
    }

    #[test]
    fn test_handle_reports_cancellation() {
        let session = BuildSession::new(Invocation::new("true"), Arc::new(MemorySink::new()));
        let handle = session.handle();
        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.clone().is_cancelled());
    }

    #[tokio::test]
    async fn test_relay_stream_forwards_lines_in_order() {
        let input: &[u8] = b"one\ntwo\r\nthree";
        let (tx, mut rx) = mpsc::channel(8);

        let count = relay_stream(input, StreamSource::Stderr, tx).await;
        assert_eq!(count, 3);

        let mut received = Vec::new();
        while let Some(line) = rx.recv().await {
            assert_eq!(line.source, StreamSource::Stderr);
            received.push(line.text);
        }
        assert_eq!(received, vec!["one", "two", "three"]);
    }

    /// Yields `data` once, then fails every read
    struct FailingReader {
        data: Option<Vec<u8>>,
    }

    impl FailingReader {
        fn new(data: &[u8]) -> Self {
            Self {
                data: Some(data.to_vec()),
            }
        }
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(&data);
                    std::task::Poll::Ready(Ok(()))
                }
                None => std::task::Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device gone",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_read_error_is_forwarded_and_ends_stream() {
        let (tx, mut rx) = mpsc::channel(8);

        let count = relay_stream(FailingReader::new(b"one\ntwo\n"), StreamSource::Stderr, tx).await;
        assert_eq!(count, 2);

        let mut received = Vec::new();
        while let Some(line) = rx.recv().await {
            assert_eq!(line.source, StreamSource::Stderr);
            received.push(line.text);
        }
        assert_eq!(
            received,
            vec!["one", "two", "error reading stderr: device gone"]
        );
    }

    #[tokio::test]
    async fn test_read_error_leaves_other_stream_running() {
        let (tx, mut rx) = mpsc::channel(2);
        let stdout: &'static [u8] = b"a\nb\nc\nd\ne\n";

        let readers = vec![
            tokio::spawn(relay_stream(stdout, StreamSource::Stdout, tx.clone())),
            tokio::spawn(relay_stream(
                FailingReader::new(b"partial\n"),
                StreamSource::Stderr,
                tx.clone(),
            )),
        ];
        drop(tx);

        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        let mut counts = Vec::new();
        for reader in readers {
            counts.push(reader.await.unwrap());
        }
        assert_eq!(counts, vec![5, 1]);

        let texts_from = |source: StreamSource| {
            lines
                .iter()
                .filter(|l| l.source == source)
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(texts_from(StreamSource::Stdout), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            texts_from(StreamSource::Stderr),
            vec!["partial", "error reading stderr: device gone"]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_for_missing_program() {
        let sink = Arc::new(MemorySink::new());
        let session = BuildSession::new(
            Invocation::new("/nonexistent/bin/tundra2.exe").arg("-C"),
            sink.clone(),
        );

        let err = session.run().await.unwrap_err();
        assert!(err.is_launch_failure());
        assert!(sink.is_empty());
    }
}
