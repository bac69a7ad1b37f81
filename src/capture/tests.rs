use std::sync::{Mutex, MutexGuard, PoisonError};

use super::*;

// The sink slots are process-wide; tests touching the same target must not
// interleave.
static SLOT_GUARD: Mutex<()> = Mutex::new(());

fn serialize() -> MutexGuard<'static, ()> {
    SLOT_GUARD.lock().unwrap_or_else(PoisonError::into_inner)
}

#[test]
fn catches_stdout_writes() {
    let _guard = serialize();
    let text = "This is a test for the stdout catcher.";

    let mut catcher = StreamCatcher::install(StreamTarget::Stdout);
    let written = write_to(StreamTarget::Stdout, text.as_bytes());
    catcher.release();

    assert_eq!(written, text.len());
    assert_eq!(catcher.output(), text);
}

#[test]
fn catches_stderr_writes() {
    let _guard = serialize();
    let text = "This is a test for the stderr catcher.";

    let mut catcher = StreamCatcher::install(StreamTarget::Stderr);
    write_to(StreamTarget::Stderr, text.as_bytes());
    catcher.release();

    assert_eq!(catcher.output(), text);
}

#[test]
fn both_targets_catch_simultaneously() {
    let _guard = serialize();

    let mut out = StreamCatcher::install(StreamTarget::Stdout);
    let mut err = StreamCatcher::install(StreamTarget::Stderr);
    write_to(StreamTarget::Stdout, b"to stdout");
    write_to(StreamTarget::Stderr, b"to stderr");
    err.release();
    out.release();

    assert_eq!(out.output(), "to stdout");
    assert_eq!(err.output(), "to stderr");
}

#[test]
fn escaped_capture_renders_controls() {
    let _guard = serialize();
    let options = CaptureOptions {
        escaped: true,
        ..Default::default()
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stderr, options);
    let written = write_to(StreamTarget::Stderr, b"\tescaped line\n");
    catcher.release();

    // Unbounded writes report the pre-escape byte count.
    assert_eq!(written, "\tescaped line\n".len());
    assert_eq!(catcher.output(), "\\tescaped line\\n");
    assert!(!catcher.output().chars().any(char::is_control));
}

#[test]
fn escaped_capture_accepts_invalid_utf8() {
    let _guard = serialize();
    let options = CaptureOptions {
        escaped: true,
        ..Default::default()
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stdout, options);
    write_to(StreamTarget::Stdout, &[0xff, 0x00, b'x']);
    catcher.release();

    assert!(!catcher.output().chars().any(char::is_control));
    assert!(catcher.output().ends_with('x'));
}

#[test]
fn bounded_capture_truncates_mid_write() {
    let _guard = serialize();
    let text = "This is a test for the bounded catcher.";
    let options = CaptureOptions {
        escaped: false,
        max_length: 10,
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stdout, options);
    let first = write_to(StreamTarget::Stdout, text.as_bytes());
    // The bound is reached; further writes are dropped and report 0.
    let second = write_to(StreamTarget::Stdout, b"okay");
    catcher.release();

    assert_eq!(first, 10);
    assert_eq!(second, 0);
    assert!(catcher.output().len() <= 10);
    assert_eq!(catcher.output(), &text[..10]);
}

#[test]
fn bounded_capture_never_exceeds_limit() {
    let _guard = serialize();
    let options = CaptureOptions {
        escaped: false,
        max_length: 7,
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stdout, options);
    let mut accepted = 0;
    for chunk in ["ab", "cde", "fgh", "ij", ""] {
        accepted += write_to(StreamTarget::Stdout, chunk.as_bytes());
        assert!(catcher.output().chars().count() <= 7);
    }
    catcher.release();

    assert_eq!(accepted, 7);
    // First 7 characters of the pre-truncation concatenation.
    assert_eq!(catcher.output(), "abcdefg");
}

#[test]
fn bounded_capture_tracks_count_across_many_writes() {
    let _guard = serialize();
    let options = CaptureOptions {
        escaped: false,
        max_length: 1501,
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stdout, options);
    let mut accepted = 0;
    for _ in 0..1000 {
        accepted += write_to(StreamTarget::Stdout, b"ab");
    }
    catcher.release();

    // 750 full writes, then one clipped to a single character at the bound.
    assert_eq!(accepted, 1501);
    assert_eq!(catcher.output().len(), 1501);
    assert!(catcher.output().ends_with('a'));
}

#[test]
fn bounded_capture_counts_post_escape_characters() {
    let _guard = serialize();
    let options = CaptureOptions {
        escaped: true,
        max_length: 4,
    };

    let mut catcher = StreamCatcher::with_options(StreamTarget::Stdout, options);
    // Escapes to "\\n\\n\\n" (6 characters); only 4 fit.
    let appended = write_to(StreamTarget::Stdout, b"\n\n\n");
    catcher.release();

    assert_eq!(appended, 4);
    assert_eq!(catcher.output(), "\\n\\n");
}

#[test]
fn release_restores_previous_sink() {
    let _guard = serialize();

    // Outer catcher stands in for the real stream so the test never prints.
    let outer = StreamCatcher::install(StreamTarget::Stdout);
    {
        let inner = StreamCatcher::install(StreamTarget::Stdout);
        write_to(StreamTarget::Stdout, b"inner only");
        assert_eq!(inner.output(), "inner only");
    }
    write_to(StreamTarget::Stdout, b"outer again");

    assert_eq!(outer.output(), "outer again");
}

#[test]
fn release_is_idempotent() {
    let _guard = serialize();

    let outer = StreamCatcher::install(StreamTarget::Stdout);
    let mut inner = StreamCatcher::install(StreamTarget::Stdout);
    inner.release();
    inner.release();
    write_to(StreamTarget::Stdout, b"after double release");

    assert_eq!(outer.output(), "after double release");
}

#[test]
fn restores_on_unwind() {
    let _guard = serialize();

    let outer = StreamCatcher::install(StreamTarget::Stdout);
    let result = std::panic::catch_unwind(|| {
        let inner = StreamCatcher::install(StreamTarget::Stdout);
        write_to(StreamTarget::Stdout, b"before the panic");
        assert_eq!(inner.output(), "before the panic");
        panic!("scope exits by unwinding");
    });
    assert!(result.is_err());

    write_to(StreamTarget::Stdout, b"outer survives");
    assert_eq!(outer.output(), "outer survives");
}

#[test]
fn flush_is_accepted_while_active() {
    let _guard = serialize();

    let mut catcher = StreamCatcher::install(StreamTarget::Stdout);
    write_to(StreamTarget::Stdout, b"data");
    flush(StreamTarget::Stdout);
    catcher.release();

    assert_eq!(catcher.output(), "data");
}
