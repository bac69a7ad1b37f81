use std::sync::{Arc, Mutex, PoisonError};

use super::escape::escape;
use super::sink::{self, OutputSink, StreamTarget};

/// Options controlling what a capture sink stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    /// Render captured bytes through a printable escape representation.
    pub escaped: bool,
    /// Upper bound on stored output, in characters; 0 means unbounded. Once
    /// the bound is reached further writes are silently dropped.
    pub max_length: usize,
}

/// Sink installed in place of the previous one while a catcher is active.
///
/// Interception is exclusive: nothing is forwarded to the displaced sink.
struct CaptureSink {
    options: CaptureOptions,
    buffer: Arc<Mutex<String>>,
    /// Characters appended so far. Only this sink writes the buffer, so the
    /// count stays accurate without rescanning it on every write.
    stored: usize,
}

impl OutputSink for CaptureSink {
    fn write(&mut self, data: &[u8]) -> usize {
        let text = if self.options.escaped {
            escape(data)
        } else {
            String::from_utf8_lossy(data).into_owned()
        };
        let mut output = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.options.max_length == 0 {
            output.push_str(&text);
            // Callers expect the count of bytes they handed in, not the
            // post-escape length.
            return data.len();
        }
        let remaining = self.options.max_length.saturating_sub(self.stored);
        if remaining == 0 {
            return 0;
        }
        let mut appended = 0;
        for ch in text.chars().take(remaining) {
            output.push(ch);
            appended += 1;
        }
        self.stored += appended;
        appended
    }
}

/// Guard that intercepts one process-wide output stream for its lifetime.
///
/// Installing swaps the stream's current sink for a capture sink and saves the
/// displaced one; dropping the guard (or calling [`release`]) puts the
/// original back unconditionally, whether the scope ends normally or by
/// unwinding.
///
/// Only one catcher per target should be active at a time: overlapping
/// catchers on the same target from unrelated callers race on save/restore.
///
/// ```
/// use outcatch::{write_to, StreamCatcher, StreamTarget};
///
/// let catcher = StreamCatcher::install(StreamTarget::Stdout);
/// write_to(StreamTarget::Stdout, b"captured, not printed");
/// assert_eq!(catcher.output(), "captured, not printed");
/// drop(catcher); // stdout flows to the real stream again
/// ```
///
/// [`release`]: StreamCatcher::release
pub struct StreamCatcher {
    target: StreamTarget,
    buffer: Arc<Mutex<String>>,
    original: Option<Box<dyn OutputSink>>,
}

impl StreamCatcher {
    /// Intercept `target` with default options (unescaped, unbounded).
    pub fn install(target: StreamTarget) -> Self {
        Self::with_options(target, CaptureOptions::default())
    }

    /// Intercept `target` with explicit capture options.
    pub fn with_options(target: StreamTarget, options: CaptureOptions) -> Self {
        let buffer = Arc::new(Mutex::new(String::new()));
        let capture = CaptureSink {
            options,
            buffer: Arc::clone(&buffer),
            stored: 0,
        };
        let original = sink::replace(target, Box::new(capture));
        Self {
            target,
            buffer,
            original: Some(original),
        }
    }

    /// The stream this catcher intercepts.
    pub fn target(&self) -> StreamTarget {
        self.target
    }

    /// Captured output accumulated so far. Readable both while the catcher is
    /// active and after release.
    pub fn output(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Restore the displaced sink. Idempotent; also runs on drop.
    pub fn release(&mut self) {
        if let Some(original) = self.original.take() {
            // The returned capture sink is dropped; the buffer stays alive
            // through our Arc.
            let _ = sink::replace(self.target, original);
        }
    }
}

impl Drop for StreamCatcher {
    fn drop(&mut self) {
        self.release();
    }
}
