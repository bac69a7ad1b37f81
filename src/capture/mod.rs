//! Scoped interception of the process-wide output streams.
//!
//! The current destination of standard output and standard error is modeled
//! as an explicit [`OutputSink`] slot per [`StreamTarget`]. Code that wants
//! its output to be capturable prints through [`write_to`] instead of the OS
//! stream directly; by default that forwards to the real stream. A
//! [`StreamCatcher`] swaps a capture sink into the slot for its lifetime and
//! restores the previous sink when it is dropped or released, on every exit
//! path.

pub mod catcher;
pub mod escape;
pub mod sink;

#[cfg(test)]
mod tests;

pub use catcher::{CaptureOptions, StreamCatcher};
pub use sink::{flush, write_to, OutputSink, StreamTarget};
