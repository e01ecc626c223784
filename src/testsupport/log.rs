//! A minimal test-diagnostic channel, grounded on `C-kern/test/test.c`.
//!
//! This crate carries no runtime logging dependency (see `SPEC_FULL.md`
//! §4.5.2 — the four CORE subsystems must not perform hidden I/O on their
//! hot paths), so this is intentionally `eprintln!`-based rather than a
//! `log`/`tracing` facade; it is test scaffolding, not an ambient service.

/// Prints a diagnostic line to stderr, prefixed with `test_name`, so
/// interleaved parallel test output stays attributable.
pub fn trace(test_name: &str, message: impl std::fmt::Display) {
    eprintln!("[{test_name}] {message}");
}

/// Calls [`trace`], taking the attributing name as its first argument
/// (typically `module_path!()`) followed by `format!`-style arguments.
/// There is no way to recover the caller's identity generically in stable
/// Rust, so the caller supplies it explicitly rather than this macro
/// reporting a name that is always the same placeholder string.
#[macro_export]
macro_rules! test_trace {
    ($name:expr, $($arg:tt)*) => {
        $crate::testsupport::log::trace($name, format!($($arg)*))
    };
}
