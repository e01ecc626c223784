//! Monotonic clock, grounded on `C-kern/platform/Linux/time/sysclock.c`.

use std::time::Duration;

/// A steady, non-decreasing timestamp (`CLOCK_MONOTONIC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid out-pointer for `clock_gettime`.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        assert_eq!(rc, 0, "CLOCK_MONOTONIC must always be available");
        Self {
            secs: ts.tv_sec as i64,
            nanos: ts.tv_nsec as i32,
        }
    }

    /// Elapsed duration since `earlier`. Saturates to zero if `earlier` is
    /// actually later (should not happen for a monotonic clock, but callers
    /// must not panic on clock jitter).
    pub fn since(&self, earlier: Timestamp) -> Duration {
        let secs = self.secs - earlier.secs;
        let nanos = self.nanos - earlier.nanos;
        let (secs, nanos) = if nanos < 0 {
            (secs - 1, nanos + 1_000_000_000)
        } else {
            (secs, nanos)
        };
        if secs < 0 {
            Duration::ZERO
        } else {
            Duration::new(secs as u64, nanos as u32)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn monotonic_non_decreasing() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b >= a);
    }

    #[test]
    fn since_measures_elapsed() {
        let a = Timestamp::now();
        std::thread::sleep(Duration::from_millis(5));
        let b = Timestamp::now();
        assert!(b.since(a) >= Duration::from_millis(4));
    }
}
