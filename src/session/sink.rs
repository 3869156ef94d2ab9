//! Log sinks receiving relayed build output

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

/// Which child stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// A single relayed line, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub source: StreamSource,
    pub text: String,
}

impl OutputLine {
    pub fn new(source: StreamSource, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(StreamSource::Stdout, text)
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self::new(StreamSource::Stderr, text)
    }
}

/// Destination that displays build output to the user
///
/// Implementations must accept calls from multiple threads without
/// interleaving partial lines.
pub trait LineSink: Send + Sync {
    /// Called once per line, in arrival order
    fn accept(&self, line: &OutputLine);

    /// Discards content from previous sessions
    fn clear(&self) {}

    /// Brings the display to the foreground
    fn activate(&self) {}
}

/// Writes lines to the process's stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink {
    tag_streams: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix stderr lines with `[stderr] `
    pub fn with_stream_tags(mut self, tag_streams: bool) -> Self {
        self.tag_streams = tag_streams;
        self
    }

    fn render(&self, line: &OutputLine) -> String {
        match line.source {
            StreamSource::Stderr if self.tag_streams => format!("[stderr] {}", line.text),
            _ => line.text.clone(),
        }
    }
}

impl LineSink for ConsoleSink {
    fn accept(&self, line: &OutputLine) {
        let rendered = self.render(line);
        let mut out = io::stdout().lock();
        // A closed stdout must not abort the build; the line is dropped.
        let _ = writeln!(out, "{}", rendered);
        let _ = out.flush();
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<OutputLine>>,
    clears: Mutex<usize>,
    activations: Mutex<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<OutputLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear_count(&self) -> usize {
        self.clears.lock().map(|c| *c).unwrap_or(0)
    }

    pub fn activation_count(&self) -> usize {
        self.activations.lock().map(|c| *c).unwrap_or(0)
    }
}

impl LineSink for MemorySink {
    fn accept(&self, line: &OutputLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
        if let Ok(mut clears) = self.clears.lock() {
            *clears += 1;
        }
    }

    fn activate(&self) {
        if let Ok(mut activations) = self.activations.lock() {
            *activations += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_stream_source_display() {
        assert_eq!(StreamSource::Stdout.to_string(), "stdout");
        assert_eq!(StreamSource::Stderr.to_string(), "stderr");
    }

    #[test]
    fn test_console_sink_tags_only_stderr() {
        let sink = ConsoleSink::new().with_stream_tags(true);
        assert_eq!(sink.render(&OutputLine::stdout("compiling")), "compiling");
        assert_eq!(
            sink.render(&OutputLine::stderr("warning C4100")),
            "[stderr] warning C4100"
        );

        let untagged = ConsoleSink::new();
        assert_eq!(untagged.render(&OutputLine::stderr("warning")), "warning");
    }

    #[test]
    fn test_memory_sink_records_lifecycle() {
        let sink = MemorySink::new();
        sink.accept(&OutputLine::stdout("stale"));
        sink.clear();
        sink.activate();
        sink.accept(&OutputLine::stdout("fresh"));

        assert_eq!(sink.texts(), vec!["fresh".to_string()]);
        assert_eq!(sink.clear_count(), 1);
        assert_eq!(sink.activation_count(), 1);
        assert!(!sink.is_empty());
    }

    #[test]
    fn test_memory_sink_concurrent_accept() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        sink.accept(&OutputLine::stdout(format!("thread {} line {}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.len(), 1000);
        assert!(sink.texts().iter().all(|t| t.starts_with("thread ")));
    }

    #[test]
    fn test_output_line_serializes_source_lowercase() {
        let json = serde_json::to_value(OutputLine::stderr("oops")).unwrap();
        assert_eq!(json["source"], "stderr");
        assert_eq!(json["text"], "oops");
    }
}
