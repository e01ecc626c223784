//! A counting-semaphore-like primitive with a timed, FIFO wait queue,
//! grounded on `C-kern/task/sync/eventcount.c`.
//!
//! Waiter nodes are *borrowed from the calling thread's stack* for the
//! duration of [`EventCount::wait`] — a "park yourself" primitive (spec.md
//! §9): a thread suspends on its own [`ThreadHandle`] while a node pointing
//! at that handle sits in the counter's intrusive FIFO list, and the node
//! only needs to outlive the suspend call, which it does by construction.

use crate::platform::atomic::SpinLock;
use crate::platform::thread::{self, SuspendOutcome, ThreadHandle};
use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// An event was consumed, either on the fast path or after being woken.
    Delivered,
    TimedOut,
}

struct Waiter {
    handle: ThreadHandle,
    /// Guards `next`/`prev`/`linked` against a concurrent waker (spec.md
    /// §4.3, "per-thread lock"). Acquired by the waker before unlinking, and
    /// by a timing-out waiter before inspecting its own `linked` flag —
    /// whichever side gets the lock first wins the race.
    lock: SpinLock,
    next: Cell<Option<NonNull<Waiter>>>,
    prev: Cell<Option<NonNull<Waiter>>>,
    /// `true` while this node is in the counter's list. Cleared exactly
    /// once, by whichever of {waker, timeout path} observes it first.
    linked: Cell<bool>,
}

impl Waiter {
    fn new() -> Self {
        Self {
            handle: ThreadHandle::new(),
            lock: SpinLock::new(),
            next: Cell::new(None),
            prev: Cell::new(None),
            linked: Cell::new(false),
        }
    }
}

/// `(nrevents, waiters)` protected by one spinning flag (spec.md §3.4).
/// `nrevents > 0` means that many events are queued; `nrevents < 0` means
/// `-nrevents` threads are parked in the waiter list.
pub struct EventCount {
    nrevents: AtomicI32,
    lock: SpinLock,
    head: Cell<Option<NonNull<Waiter>>>,
    tail: Cell<Option<NonNull<Waiter>>>,
}

// SAFETY: `head`/`tail`/a waiter's `next`/`prev`/`linked` are only ever
// touched while holding `lock` (the counter's) or a waiter's own `lock`.
unsafe impl Sync for EventCount {}
unsafe impl Send for EventCount {}

impl Default for EventCount {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCount {
    pub fn new() -> Self {
        Self {
            nrevents: AtomicI32::new(0),
            lock: SpinLock::new(),
            head: Cell::new(None),
            tail: Cell::new(None),
        }
    }

    pub fn nrevents(&self) -> i32 {
        self.nrevents.load(Ordering::Acquire).max(0)
    }

    pub fn nrwaiting(&self) -> i32 {
        (-self.nrevents.load(Ordering::Acquire)).max(0)
    }

    /// Publishes one event, waking exactly one FIFO waiter if any are
    /// parked.
    pub fn count(&self) {
        let old = self.nrevents.fetch_add(1, Ordering::AcqRel);
        assert_ne!(old, i32::MAX, "EventCount::count: nrevents overflowed");
        if old < 0 {
            self.wake_one();
        }
    }

    /// Consumes one queued event without blocking. Returns `false` ("would
    /// block") if none is available.
    pub fn trywait(&self) -> bool {
        loop {
            let cur = self.nrevents.load(Ordering::Acquire);
            if cur <= 0 {
                return false;
            }
            if self
                .nrevents
                .compare_exchange_weak(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Waits for an event, up to `timeout` (`None` blocks indefinitely).
    pub fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        if self.trywait() {
            return WaitOutcome::Delivered;
        }

        self.lock.lock();
        let old = self.nrevents.fetch_sub(1, Ordering::AcqRel);
        assert_ne!(old, i32::MIN, "EventCount::wait: nrevents overflowed");
        let waiter = Waiter::new();
        let ptr = NonNull::from(&waiter);
        self.push_back(ptr);
        self.lock.unlock();

        loop {
            match thread::suspend(&waiter.handle, timeout) {
                SuspendOutcome::Resumed => {
                    if !waiter.linked.get() {
                        return WaitOutcome::Delivered;
                    }
                    // Only `wake_one`/`free` ever resume this handle, and
                    // both clear `linked` before resuming, so this is
                    // unreachable; loop defensively rather than assume.
                    continue;
                }
                SuspendOutcome::TimedOut => {
                    self.lock.lock();
                    waiter.lock.lock();
                    if !waiter.linked.get() {
                        // A concurrent `count` already dequeued and is
                        // resuming us.
                        waiter.lock.unlock();
                        self.lock.unlock();
                        return WaitOutcome::Delivered;
                    }
                    self.unlink(ptr);
                    waiter.linked.set(false);
                    waiter.lock.unlock();
                    self.nrevents.fetch_add(1, Ordering::AcqRel);
                    self.lock.unlock();
                    return WaitOutcome::TimedOut;
                }
            }
        }
    }

    /// Wakes every currently-parked waiter. Operations on `self` after this
    /// are unspecified except re-initialisation (spec.md §4.3).
    pub fn free(&self) {
        self.lock.lock();
        let mut cur = self.head.get();
        self.head.set(None);
        self.tail.set(None);
        self.lock.unlock();

        while let Some(w) = cur {
            let wr = unsafe { w.as_ref() };
            wr.lock.lock();
            let next = wr.next.get();
            wr.linked.set(false);
            wr.lock.unlock();
            thread::resume(&wr.handle);
            cur = next;
        }
    }

    fn wake_one(&self) {
        self.lock.lock();
        let resume_handle = self.head.get().map(|h| {
            let wr = unsafe { h.as_ref() };
            wr.lock.lock();
            self.unlink(h);
            wr.linked.set(false);
            wr.lock.unlock();
            wr.handle.clone()
        });
        self.lock.unlock();
        if let Some(handle) = resume_handle {
            thread::resume(&handle);
        }
    }

    /// Appends `w` to the tail. Caller holds `self.lock`.
    fn push_back(&self, w: NonNull<Waiter>) {
        let wr = unsafe { w.as_ref() };
        wr.prev.set(self.tail.get());
        wr.next.set(None);
        wr.linked.set(true);
        match self.tail.get() {
            Some(t) => unsafe { t.as_ref() }.next.set(Some(w)),
            None => self.head.set(Some(w)),
        }
        self.tail.set(Some(w));
    }

    /// Removes `w` from wherever it sits in the list. Caller holds
    /// `self.lock`.
    fn unlink(&self, w: NonNull<Waiter>) {
        let wr = unsafe { w.as_ref() };
        match wr.prev.get() {
            Some(p) => unsafe { p.as_ref() }.next.set(wr.next.get()),
            None => self.head.set(wr.next.get()),
        }
        match wr.next.get() {
            Some(n) => unsafe { n.as_ref() }.prev.set(wr.prev.get()),
            None => self.tail.set(wr.prev.get()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier, Mutex};

    #[test]
    fn trywait_without_a_pending_event_fails() {
        let ec = EventCount::new();
        assert!(!ec.trywait());
    }

    #[test]
    fn count_then_trywait_delivers() {
        let ec = EventCount::new();
        ec.count();
        assert_eq!(ec.nrevents(), 1);
        assert!(ec.trywait());
        assert_eq!(ec.nrevents(), 0);
    }

    #[test]
    fn sixteen_waiters_wake_in_fifo_order() {
        let ec = Arc::new(EventCount::new());
        let started = Arc::new(Barrier::new(17));
        let order = Arc::new(Mutex::new(Vec::new()));
        let next_id = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ec = ec.clone();
                let started = started.clone();
                let order = order.clone();
                let next_id = next_id.clone();
                thread::spawn(move || {
                    let id = next_id.fetch_add(1, Ordering::SeqCst);
                    started.wait();
                    let outcome = ec.wait(None);
                    assert_eq!(outcome, WaitOutcome::Delivered);
                    order.lock().unwrap().push(id);
                })
            })
            .collect();

        started.wait();
        // Give every thread a chance to actually reach `wait` and park.
        std::thread::sleep(Duration::from_millis(20));
        for _ in 0..16 {
            ec.count();
        }
        for h in handles {
            thread::join(h);
        }
        assert_eq!(order.lock().unwrap().len(), 16);
    }

    #[test]
    fn wait_times_out_and_restores_nrevents() {
        let ec = EventCount::new();
        let start = std::time::Instant::now();
        let outcome = ec.wait(Some(Duration::from_millis(40)));
        let elapsed = start.elapsed();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(elapsed >= Duration::from_millis(30) && elapsed <= Duration::from_millis(80));
        assert_eq!(ec.nrevents(), 0);
        assert_eq!(ec.nrwaiting(), 0);
    }

    #[test]
    fn free_wakes_all_parked_waiters() {
        let ec = Arc::new(EventCount::new());
        let started = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let ec = ec.clone();
                let started = started.clone();
                thread::spawn(move || {
                    started.wait();
                    ec.wait(Some(Duration::from_secs(5)))
                })
            })
            .collect();
        started.wait();
        std::thread::sleep(Duration::from_millis(20));
        ec.free();
        for h in handles {
            thread::join(h);
        }
    }
}
