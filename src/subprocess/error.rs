use thiserror::Error;

/// Failures that prevent a child process run from producing a result.
///
/// A timeout is deliberately absent: the deadline elapsing is reported as
/// [`ExitStatus::Timeout`](super::ExitStatus::Timeout) with partial output,
/// never as an error.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to capture child {0}")]
    PipeUnavailable(&'static str),

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}
