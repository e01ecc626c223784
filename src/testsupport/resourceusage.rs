//! A resource-leak checker, grounded on `C-kern/test/resourceusage.c`: snap
//! the process's open-fd count before a test body and compare after, so a
//! forgotten `Pages`/pipe/process handle shows up as a test failure instead
//! of a slow fd leak.

use std::fs;

/// A point-in-time count of open file descriptors for the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    open_fds: usize,
}

impl ResourceUsage {
    /// Snapshots the current process's resource usage.
    pub fn capture() -> Self {
        let open_fds = fs::read_dir("/proc/self/fd")
            .map(|entries| entries.count())
            .unwrap_or(0);
        Self { open_fds }
    }

    /// Compares `self` (taken before a test body) against `after`, returning
    /// the number of descriptors leaked (negative if descriptors were
    /// closed, which is never a leak).
    pub fn leaked_fds(&self, after: ResourceUsage) -> isize {
        after.open_fds as isize - self.open_fds as isize
    }
}

/// Runs `body`, then asserts it did not leak any file descriptors.
pub fn assert_no_leaks<F: FnOnce()>(body: F) {
    let before = ResourceUsage::capture();
    body();
    let after = ResourceUsage::capture();
    let leaked = before.leaked_fds(after);
    assert!(
        leaked <= 0,
        "test body leaked {} file descriptor(s): before={:?} after={:?}",
        leaked,
        before,
        after
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clean_body_leaks_nothing() {
        assert_no_leaks(|| {
            let _v = vec![0u8; 1024];
        });
    }

    #[test]
    fn closing_a_fd_is_not_a_leak() {
        let before = ResourceUsage::capture();
        let f = std::fs::File::open("/dev/null").unwrap();
        drop(f);
        let after = ResourceUsage::capture();
        assert!(before.leaked_fds(after) <= 0);
    }
}
