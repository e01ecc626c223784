//! Thread spawn/join and a suspend/resume-with-timeout primitive built on the
//! Linux futex syscall, the way the teacher crate reaches for a raw
//! `libc::syscall` instead of inventing its own blocking primitive.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WORD_PARKED: i32 = 0;
const WORD_NOTIFIED: i32 = 1;

/// A suspend/resume endpoint for exactly one thread. Cloning a handle gives
/// another thread the ability to [`resume`] the owner; only the owning
/// thread should call [`suspend`].
#[derive(Clone)]
pub struct ThreadHandle {
    word: Arc<AtomicI32>,
}

impl ThreadHandle {
    pub fn new() -> Self {
        Self {
            word: Arc::new(AtomicI32::new(WORD_PARKED)),
        }
    }
}

impl Default for ThreadHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SuspendOutcome {
    Resumed,
    TimedOut,
}

/// Suspends the calling thread until [`resume`] is called on `handle` (from
/// any thread) or `timeout` elapses. A `None` timeout blocks indefinitely.
///
/// This is the only user-visible suspension point of the whole crate besides
/// [`crate::eventcount::EventCount::wait`], which is itself built on this
/// function.
pub fn suspend(handle: &ThreadHandle, timeout: Option<Duration>) -> SuspendOutcome {
    loop {
        if handle.word.load(Ordering::Acquire) == WORD_NOTIFIED {
            handle.word.store(WORD_PARKED, Ordering::Release);
            return SuspendOutcome::Resumed;
        }
        let ts = timeout.map(|d| libc::timespec {
            tv_sec: d.as_secs() as i64,
            tv_nsec: d.subsec_nanos() as i64,
        });
        let ts_ptr = ts
            .as_ref()
            .map(|t| t as *const libc::timespec)
            .unwrap_or(std::ptr::null());
        // SAFETY: `word` points at a live `AtomicI32` for the lifetime of
        // this call; `FUTEX_WAIT` only blocks while the observed value still
        // equals `WORD_PARKED`.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_futex,
                handle.word.as_ptr(),
                libc::FUTEX_WAIT,
                WORD_PARKED,
                ts_ptr,
                std::ptr::null::<u32>(),
                0u32,
            )
        };
        if rc == 0 {
            continue; // Re-check the word; may be a spurious wake.
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ETIMEDOUT) => return SuspendOutcome::TimedOut,
            Some(libc::EAGAIN) | Some(libc::EINTR) => continue,
            _ => continue,
        }
    }
}

/// Wakes the thread parked on `handle`. Safe to call even if the thread has
/// not yet called [`suspend`] — the notification is latched in the word so a
/// subsequent `suspend` returns immediately, matching spec.md's "no missed
/// wakeup" requirement for `EventCount::count`.
pub fn resume(handle: &ThreadHandle) {
    handle.word.store(WORD_NOTIFIED, Ordering::Release);
    // SAFETY: waking on an address with no waiters is a harmless no-op.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            handle.word.as_ptr(),
            libc::FUTEX_WAKE,
            1,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

/// Spawns a thread running `f`, returning a joinable handle.
pub fn spawn<F, T>(f: F) -> std::thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .spawn(f)
        .expect("OS refused to spawn a thread")
}

/// Joins a previously spawned thread, propagating its return value.
/// Panicking threads are reported as `None`.
pub fn join<T>(handle: std::thread::JoinHandle<T>) -> Option<T> {
    handle.join().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resume_before_suspend_is_not_missed() {
        let handle = ThreadHandle::new();
        resume(&handle);
        assert_eq!(
            suspend(&handle, Some(Duration::from_millis(50))),
            SuspendOutcome::Resumed
        );
    }

    #[test]
    fn suspend_times_out() {
        let handle = ThreadHandle::new();
        let start = std::time::Instant::now();
        let outcome = suspend(&handle, Some(Duration::from_millis(30)));
        assert_eq!(outcome, SuspendOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn resume_wakes_suspended_thread() {
        let handle = ThreadHandle::new();
        let waiter = handle.clone();
        let t = spawn(move || suspend(&waiter, None));
        std::thread::sleep(Duration::from_millis(20));
        resume(&handle);
        assert_eq!(join(t), Some(SuspendOutcome::Resumed));
    }
}
