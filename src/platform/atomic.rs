//! Thin wrappers over the handful of atomic primitives the core subsystems
//! depend on. These exist as named crossings (spec.md §6's `atomic_add`,
//! `atomic_cmpxchg`, `atomic_testset`, `atomic_clear`) rather than scattering
//! `Ordering::SeqCst` choices across `eventcount` and `rbtree`.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Adds `delta` to `*target`, returning the value that was there before.
#[inline]
pub fn add(target: &AtomicI32, delta: i32) -> i32 {
    target.fetch_add(delta, Ordering::AcqRel)
}

/// Compare-and-swap: if `*target == expected`, stores `new` and returns
/// `expected`; otherwise leaves `*target` alone and returns the value that
/// was actually observed.
#[inline]
pub fn cmpxchg(target: &AtomicI32, expected: i32, new: i32) -> i32 {
    match target.compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire) {
        Ok(old) => old,
        Err(observed) => observed,
    }
}

/// Test-and-set: atomically sets the flag and returns whether it was already
/// set (`true` means the caller did not acquire it).
#[inline]
pub fn testset(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::Acquire)
}

/// Clears the flag, releasing whatever it guarded.
#[inline]
pub fn clear(flag: &AtomicBool) {
    flag.store(false, Ordering::Release);
}

/// A spinning test-and-set lock, used by [`crate::eventcount::EventCount`]'s
/// counter lock and by a waiter's per-thread lock (spec.md §4.3's "Lock
/// discipline").
#[derive(Debug, Default)]
pub struct SpinLock {
    flag: AtomicBool,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Spins until the flag is acquired.
    pub fn lock(&self) {
        while testset(&self.flag) {
            std::hint::spin_loop();
        }
    }

    pub fn unlock(&self) {
        clear(&self.flag);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn spinlock_mutual_exclusion() {
        let lock = SpinLock::new();
        lock.lock();
        assert!(testset(&lock.flag));
        lock.unlock();
        assert!(!testset(&lock.flag));
        lock.unlock();
    }

    #[test]
    fn add_returns_old_value() {
        let v = AtomicI32::new(5);
        assert_eq!(add(&v, 3), 5);
        assert_eq!(v.load(Ordering::Acquire), 8);
    }

    #[test]
    fn cmpxchg_semantics() {
        let v = AtomicI32::new(1);
        assert_eq!(cmpxchg(&v, 1, 2), 1);
        assert_eq!(v.load(Ordering::Acquire), 2);
        assert_eq!(cmpxchg(&v, 1, 3), 2);
        assert_eq!(v.load(Ordering::Acquire), 2);
    }
}
