//! Crate-level integration tests exercising each core subsystem end to end
//! through its public API only, as opposed to the internals-aware unit tests
//! colocated with each module.

use kcore_toolkit::perftest::{self, Callback, Implementation, Instance};
use kcore_toolkit::rbtree::RbTree;
use kcore_toolkit::{eventcount::EventCount, intrusive_adapter, sort};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

#[test]
fn sorting_65536_packed_triples_by_trailing_two_bytes_is_monotone() {
    let n = 65_536usize;
    let mut data: Vec<[u8; 3]> = (0..n)
        .map(|i| {
            let key = (n - 1 - i) as u16;
            let b = key.to_be_bytes();
            [0, b[0], b[1]]
        })
        .collect();
    sort::sort(&mut data, |a, b| a[1..3].cmp(&b[1..3]));
    assert!(data.windows(2).all(|w| w[0][1..3] <= w[1][1..3]));
}

#[test]
fn sorting_shuffled_longs_is_lexicographic_within_the_compare_bound() {
    let n = 65_536usize;
    let mut v: Vec<(u32, u32)> = (0..n as u32).map(|i| (i % 256, i / 256)).collect();
    let mut rng = StdRng::seed_from_u64(42);
    v.shuffle(&mut rng);

    let compares = std::sync::atomic::AtomicU64::new(0);
    sort::sort(&mut v, |a, b| {
        compares.fetch_add(1, Ordering::Relaxed);
        a.cmp(b)
    });

    assert!(v.windows(2).all(|w| w[0] <= w[1]));
    let bound = (n as f64) * (n as f64).log2() * 1.5;
    assert!((compares.load(Ordering::Relaxed) as f64) <= bound);
}

struct Keyed {
    node: kcore_toolkit::rbtree::RbNode,
    key: u64,
}

intrusive_adapter!(KeyedAdapter => Keyed, node, key, u64);

#[test]
fn ten_thousand_pseudorandom_keys_are_all_findable_with_periodic_verification() {
    let mut keys: Vec<u64> = (0..10_000).collect();
    let mut rng = StdRng::seed_from_u64(100);
    keys.shuffle(&mut rng);

    let mut tree: RbTree<KeyedAdapter> = RbTree::new();
    let mut leaked = Vec::with_capacity(keys.len());
    for (i, &key) in keys.iter().enumerate() {
        let boxed = Box::leak(Box::new(Keyed {
            node: kcore_toolkit::rbtree::RbNode::new(),
            key,
        }));
        let ptr = NonNull::from(&*boxed);
        tree.insert(ptr).unwrap();
        leaked.push(ptr);
        if (i + 1) % 100 == 0 {
            tree.verify().unwrap();
        }
    }

    for &key in &keys {
        let found = tree.find(&key).expect("every inserted key must be findable");
        assert_eq!(unsafe { found.as_ref() }.key, key);
    }

    for ptr in leaked {
        unsafe {
            drop(Box::from_raw(ptr.as_ptr()));
        }
    }
}

#[test]
fn sixteen_parked_waiters_all_wake_once_sixteen_events_are_counted() {
    let ec = Arc::new(EventCount::new());
    let started = Arc::new(Barrier::new(17));
    let woken = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ec = ec.clone();
            let started = started.clone();
            let woken = woken.clone();
            std::thread::spawn(move || {
                started.wait();
                let outcome = ec.wait(None);
                woken.fetch_add(1, Ordering::SeqCst);
                outcome
            })
        })
        .collect();

    started.wait();
    std::thread::sleep(Duration::from_millis(20));
    for _ in 0..16 {
        ec.count();
    }

    let start = std::time::Instant::now();
    for h in handles {
        h.join().unwrap();
    }
    assert!(start.elapsed() <= Duration::from_secs(2));
    assert_eq!(woken.load(Ordering::SeqCst), 16);
}

#[test]
fn a_lone_waiter_times_out_within_the_requested_window_and_restores_the_counter() {
    let ec = EventCount::new();
    let start = std::time::Instant::now();
    let outcome = ec.wait(Some(Duration::from_millis(40)));
    let elapsed = start.elapsed();
    assert_eq!(outcome, kcore_toolkit::eventcount::WaitOutcome::TimedOut);
    assert!(elapsed >= Duration::from_millis(30) && elapsed <= Duration::from_millis(50));
    assert_eq!(ec.nrevents(), 0);
}

#[test]
fn five_processes_of_four_threads_sleeping_twelve_ms_report_twenty_total_ops() {
    let run: Callback = Arc::new(|inst: &mut Instance| {
        inst.set_nrops(1);
        std::thread::sleep(Duration::from_millis(12));
        0
    });
    let impl_ = Implementation {
        prepare: None,
        run: Some(run),
        unprepare: None,
    };
    let (total_ops, max_usec) =
        perftest::exec(impl_, std::ptr::null_mut(), 0, 5, 4).expect("exec succeeds");
    assert_eq!(total_ops, 20);
    assert!(max_usec >= 12_000, "max_usec={max_usec}");
    assert!(max_usec <= 50_000, "max_usec={max_usec}");
}
