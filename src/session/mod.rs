//! Build tool process sessions
//!
//! - [`runner`]: process launch, concurrent stream draining and exit status
//! - [`sink`]: the line sink capability and stock sinks
//! - [`error`]: session failures

pub mod error;
pub mod runner;
pub mod sink;

pub use error::SessionError;
pub use runner::{BuildSession, ExitStatus, Invocation, SessionHandle, DEFAULT_CHANNEL_CAPACITY};
pub use sink::{ConsoleSink, LineSink, MemorySink, OutputLine, StreamSource};
