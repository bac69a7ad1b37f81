//! Child process execution with runner-owned pipes.
//!
//! [`ProcessRunner`] is the seam: [`TokioProcessRunner`] is the production
//! implementation, [`MockProcessRunner`] stands in for it in tests. Both
//! output channels are drained concurrently so neither pipe can fill and
//! deadlock the child, and the wait for exit is bounded by an optional
//! timeout that yields partial output rather than an error.

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{
    ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, ProcessStream, ProcessStreamFut,
    ProcessStreamItem, TokioProcessRunner,
};

use std::sync::Arc;

/// Entry point wiring a [`ProcessRunner`] implementation to callers.
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(runner::TokioProcessRunner))
    }

    #[cfg(test)]
    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }
}
