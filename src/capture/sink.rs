use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

/// Identifies one of the two process-wide output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamTarget {
    Stdout,
    Stderr,
}

/// The write/flush surface the rest of the program prints through.
///
/// `write` returns the number of input bytes accepted by this call, following
/// stream-write conventions. `flush` defaults to a no-op; it exists for
/// interface compatibility with consumers that flush after printing.
pub trait OutputSink: Send {
    fn write(&mut self, data: &[u8]) -> usize;

    fn flush(&mut self) {}
}

/// Passthrough sink forwarding to the real OS stream.
struct RealStream(StreamTarget);

impl OutputSink for RealStream {
    fn write(&mut self, data: &[u8]) -> usize {
        let result = match self.0 {
            StreamTarget::Stdout => std::io::stdout().write_all(data),
            StreamTarget::Stderr => std::io::stderr().write_all(data),
        };
        match result {
            Ok(()) => data.len(),
            Err(_) => 0,
        }
    }

    fn flush(&mut self) {
        let _ = match self.0 {
            StreamTarget::Stdout => std::io::stdout().flush(),
            StreamTarget::Stderr => std::io::stderr().flush(),
        };
    }
}

static STDOUT_SLOT: Lazy<Mutex<Box<dyn OutputSink>>> =
    Lazy::new(|| Mutex::new(Box::new(RealStream(StreamTarget::Stdout))));
static STDERR_SLOT: Lazy<Mutex<Box<dyn OutputSink>>> =
    Lazy::new(|| Mutex::new(Box::new(RealStream(StreamTarget::Stderr))));

// Restore runs from Drop, possibly during unwinding; a poisoned slot must not
// turn that into a double panic.
fn lock(target: StreamTarget) -> MutexGuard<'static, Box<dyn OutputSink>> {
    let slot = match target {
        StreamTarget::Stdout => &STDOUT_SLOT,
        StreamTarget::Stderr => &STDERR_SLOT,
    };
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write through the currently installed sink for `target`.
pub fn write_to(target: StreamTarget, data: &[u8]) -> usize {
    lock(target).write(data)
}

/// Flush the currently installed sink for `target`.
pub fn flush(target: StreamTarget) {
    lock(target).flush();
}

/// Swap the installed sink, returning the previous one.
pub(crate) fn replace(target: StreamTarget, sink: Box<dyn OutputSink>) -> Box<dyn OutputSink> {
    std::mem::replace(&mut *lock(target), sink)
}
