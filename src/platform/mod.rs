//! Platform layer: monotonic time, thread suspend/resume, atomics, anonymous
//! pages and pipes with timeout semantics, and process/thread spawn.
//!
//! Every core subsystem (`sort`, `rbtree`, `eventcount`, `perftest`) is
//! written against this module instead of calling `libc` directly, mirroring
//! the teacher crate's habit of funnelling every raw syscall through
//! `ffi::syscall` rather than scattering `unsafe { libc::* }` across the
//! higher-level modules.

pub mod atomic;
pub mod clock;
pub mod pages;
pub mod pipe;
pub mod process;
pub mod thread;

use thiserror::Error;

/// Errors raised by the platform layer itself (as opposed to the
/// higher-level error enums each core subsystem defines for its own
/// semantics).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("allocation of {bytes} bytes failed: {source}")]
    Alloc {
        bytes: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("pipe operation timed out after {0}ms")]
    TimedOut(u64),
    #[error("pipe peer closed the connection")]
    BrokenPipe,
    #[error("process/thread spawn failed: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
