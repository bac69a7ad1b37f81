//! # Outcatch
//!
//! Two independent utilities for owning a program's output:
//!
//! - `capture` — scoped interception of the process-wide standard-output or
//!   standard-error stream, with optional escaping and a length bound.
//! - `subprocess` — runs a child process, optionally feeds it input, drains
//!   both output channels concurrently, and bounds the wait for exit.
//!
//! ## Capturing a stream
//!
//! ```
//! use outcatch::{write_to, StreamCatcher, StreamTarget};
//!
//! let catcher = StreamCatcher::install(StreamTarget::Stdout);
//! write_to(StreamTarget::Stdout, b"hello\n");
//! assert_eq!(catcher.output(), "hello\n");
//! // Dropping the catcher restores the real stream.
//! ```
//!
//! ## Running a child process
//!
//! ```no_run
//! use outcatch::{ProcessCommandBuilder, ProcessRunner, SubprocessManager};
//!
//! # async fn demo() -> Result<(), outcatch::ProcessError> {
//! let manager = SubprocessManager::production();
//! let output = manager
//!     .runner()
//!     .run(ProcessCommandBuilder::new("echo").arg("hello").build())
//!     .await?;
//! assert_eq!(output.stdout_text(), "hello\n");
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod subprocess;

pub use capture::{flush, write_to, CaptureOptions, OutputSink, StreamCatcher, StreamTarget};
pub use subprocess::{
    ExitStatus, MockProcessRunner, ProcessCommand, ProcessCommandBuilder, ProcessError,
    ProcessOutput, ProcessRunner, ProcessStream, SubprocessManager, TokioProcessRunner,
};
