//! A stable, adaptive, natural mergesort, grounded on
//! `C-kern/ds/sort/mergesort.c`.
//!
//! The public entry point is [`sort`], a safe generic facade over
//! [`sort_raw`], the byte-oriented contract the teacher's C library exposes
//! directly (`sortblob_mergesort`). [`sort_raw`] dispatches to one of three
//! copy kernels ([`kernel::Kernel`]) purely by element size/alignment, then
//! runs the same run-detection/stack/merge machinery regardless of shape.

mod kernel;
mod merge;
mod run;

use kernel::{Kernel, Scratch};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SortError {
    #[error("element size is zero")]
    ZeroElementSize,
    #[error("element_size * n overflows the address space")]
    SizeOverflow,
    #[error("scratch allocation failed: {0}")]
    ScratchExhausted(#[from] crate::platform::PlatformError),
}

/// Maximum run-stack depth for 64-bit lengths: the smallest `D` with
/// `MIN_RUN * fib(D+2) > 2^64` (spec.md §3.1). A hard invariant, not a
/// heuristic — [`Sorter::push_run`] asserts it never needs more.
const MAX_STACK_DEPTH: usize = 85;

/// Reusable sort state: the run stack and the auxiliary scratch buffer
/// (spec.md §3.1). Reusing a `Sorter` across calls avoids reallocating
/// scratch for every sort; [`Sorter::sort_raw`] still releases any
/// heap-allocated scratch back to the inline buffer when it finishes.
pub struct Sorter {
    scratch: Scratch,
    stack: arrayvec::ArrayVec<Run, MAX_STACK_DEPTH>,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    /// Offset in elements from the start of the array.
    start: usize,
    len: usize,
}

impl Default for Sorter {
    fn default() -> Self {
        Self::new()
    }
}

impl Sorter {
    pub fn new() -> Self {
        Self {
            scratch: Scratch::new(),
            stack: arrayvec::ArrayVec::new(),
        }
    }

    /// Sorts `n` elements of `elem_size` bytes at `base`, comparing with
    /// `cmp`. On success the elements are in non-decreasing order under
    /// `cmp` and equal-key elements keep their relative input order.
    ///
    /// # Safety
    /// `base` must point to `n * elem_size` initialized, writable,
    /// exclusively-held bytes.
    pub unsafe fn sort_raw(
        &mut self,
        base: *mut u8,
        elem_size: usize,
        n: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
    ) -> std::result::Result<(), SortError> {
        self.sort_with_kernel(base, elem_size, n, cmp, None)
    }

    /// Sorts `n` pointer-sized, pointer-aligned elements at `base`, forcing
    /// the dedicated [`Kernel::Pointer`] copy kernel instead of letting
    /// [`Kernel::select`] infer it from `elem_size`/alignment (spec.md
    /// §4.1's `sortptr_mergesort` entry point, for callers that already
    /// know their element is a bare pointer).
    ///
    /// # Safety
    /// Same contract as [`Self::sort_raw`], with `elem_size` fixed at
    /// `size_of::<usize>()` and `base` required to be `usize`-aligned.
    pub unsafe fn sort_ptr_raw(
        &mut self,
        base: *mut u8,
        n: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
    ) -> std::result::Result<(), SortError> {
        let elem_size = std::mem::size_of::<usize>();
        debug_assert_eq!(base as usize % elem_size, 0, "pointer kernel requires a word-aligned base");
        self.sort_with_kernel(base, elem_size, n, cmp, Some(Kernel::Pointer))
    }

    unsafe fn sort_with_kernel(
        &mut self,
        base: *mut u8,
        elem_size: usize,
        n: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
        forced_kernel: Option<Kernel>,
    ) -> std::result::Result<(), SortError> {
        if elem_size == 0 {
            return Err(SortError::ZeroElementSize);
        }
        if n > usize::MAX / elem_size {
            return Err(SortError::SizeOverflow);
        }
        self.stack.clear();
        if n < 2 {
            self.scratch.release();
            return Ok(());
        }

        let kernel = forced_kernel.unwrap_or_else(|| Kernel::select(base, elem_size));
        let min_run = run::min_run(n);
        let mut pos = 0usize;
        while pos < n {
            let mut run_len = run::count_presorted(base, elem_size, pos, n, cmp, kernel);
            if run_len < min_run {
                let extend_to = min_run.min(n - pos);
                run::insertion_sort(base, elem_size, pos, run_len, extend_to, cmp, kernel);
                run_len = extend_to;
            }
            self.push_run(Run { start: pos, len: run_len }, base, elem_size, cmp, kernel)?;
            pos += run_len;
        }

        while self.stack.len() > 1 {
            self.merge_top_two(base, elem_size, cmp, kernel)?;
        }
        self.scratch.release();
        Ok(())
    }

    /// Pushes a freshly detected run and re-establishes the stack invariant
    /// (spec.md §3.2) by repeatedly merging until it holds.
    fn push_run(
        &mut self,
        run: Run,
        base: *mut u8,
        elem_size: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
        kernel: Kernel,
    ) -> std::result::Result<(), SortError> {
        self.stack
            .try_push(run)
            .expect("MAX_STACK_DEPTH is provisioned for any n that fits in a usize");
        loop {
            let depth = self.stack.len();
            if depth >= 3
                && self.stack[depth - 3].len <= self.stack[depth - 2].len + self.stack[depth - 1].len
            {
                if self.stack[depth - 3].len < self.stack[depth - 1].len {
                    self.merge_at(depth - 3, base, elem_size, cmp, kernel)?;
                } else {
                    self.merge_at(depth - 2, base, elem_size, cmp, kernel)?;
                }
            } else if depth >= 2 && self.stack[depth - 2].len <= self.stack[depth - 1].len {
                self.merge_at(depth - 2, base, elem_size, cmp, kernel)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn merge_top_two(
        &mut self,
        base: *mut u8,
        elem_size: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
        kernel: Kernel,
    ) -> std::result::Result<(), SortError> {
        let depth = self.stack.len();
        self.merge_at(depth - 2, base, elem_size, cmp, kernel)
    }

    /// Merges `stack[i]` with `stack[i+1]` in place, replacing both with
    /// one combined run.
    fn merge_at(
        &mut self,
        i: usize,
        base: *mut u8,
        elem_size: usize,
        cmp: &dyn Fn(*const u8, *const u8) -> Ordering,
        kernel: Kernel,
    ) -> std::result::Result<(), SortError> {
        let left = self.stack[i];
        let right = self.stack[i + 1];
        debug_assert_eq!(left.start + left.len, right.start);
        let run_base = unsafe { base.add(left.start * elem_size) };
        merge::merge_runs(run_base, elem_size, left.len, right.len, cmp, kernel, &mut self.scratch)?;
        self.stack[i] = Run {
            start: left.start,
            len: left.len + right.len,
        };
        self.stack.remove(i + 1);
        Ok(())
    }
}

/// Sorts `slice` in place using `cmp`, stably.
pub fn sort<T>(slice: &mut [T], cmp: impl Fn(&T, &T) -> Ordering) {
    if std::mem::size_of::<T>() == 0 || slice.len() < 2 {
        return;
    }
    let cmp_raw = |a: *const u8, b: *const u8| unsafe {
        cmp(&*(a as *const T), &*(b as *const T))
    };
    let base = slice.as_mut_ptr() as *mut u8;
    let n = slice.len();
    let elem_size = std::mem::size_of::<T>();
    let mut sorter = Sorter::new();
    // SAFETY: `base` points to `n` initialized, exclusively-borrowed `T`s;
    // `elem_size` is `size_of::<T>()` by construction, never zero here.
    unsafe {
        sorter
            .sort_raw(base, elem_size, n, &cmp_raw)
            .expect("elem_size and n come from a valid slice, so they never overflow or vanish")
    };
}

/// Sorts a slice of raw pointers in place using `cmp`, stably, through the
/// dedicated pointer-copy kernel ([`Sorter::sort_ptr_raw`]) rather than
/// `sort`'s alignment-inferred dispatch.
pub fn sort_ptr_slice<T>(slice: &mut [*mut T], cmp: impl Fn(*mut T, *mut T) -> Ordering) {
    if slice.len() < 2 {
        return;
    }
    let cmp_raw = |a: *const u8, b: *const u8| unsafe {
        cmp(*(a as *const *mut T), *(b as *const *mut T))
    };
    let base = slice.as_mut_ptr() as *mut u8;
    let n = slice.len();
    let mut sorter = Sorter::new();
    // SAFETY: `base` points to `n` initialized, exclusively-borrowed
    // pointer-sized slots; a `*mut T` slice is always `usize`-aligned.
    unsafe {
        sorter
            .sort_ptr_raw(base, n, &cmp_raw)
            .expect("pointer elements never overflow or carry a zero size")
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::cell::Cell;
    use std::cmp::Ordering;

    #[test]
    fn sorts_small_arrays() {
        let mut v = vec![5, 3, 4, 1, 2];
        sort(&mut v, |a, b| a.cmp(b));
        assert_eq!(v, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_and_singleton_are_noops() {
        let mut v: Vec<i32> = vec![];
        sort(&mut v, |a, b| a.cmp(b));
        assert!(v.is_empty());

        let mut v = vec![42];
        sort(&mut v, |a, b| a.cmp(b));
        assert_eq!(v, vec![42]);
    }

    #[test]
    fn stable_on_equal_keys() {
        let mut v: Vec<(u32, u32)> = (0..5000).map(|i| (i % 7, i)).collect();
        sort(&mut v, |a, b| a.0.cmp(&b.0));
        for w in v.windows(2) {
            assert!(w[0].0 <= w[1].0);
        }
        let mut by_key: std::collections::HashMap<u32, Vec<u32>> = std::collections::HashMap::new();
        for &(k, idx) in &v {
            by_key.entry(k).or_default().push(idx);
        }
        for idxs in by_key.values() {
            assert!(idxs.windows(2).all(|w| w[0] < w[1]), "stability violated");
        }
    }

    #[test]
    fn reverse_sorted_input_is_linear_in_presort_detection() {
        let mut v: Vec<i32> = (0..10_000).rev().collect();
        sort(&mut v, |a, b| a.cmp(b));
        assert!(v.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn idempotent_sort_does_minimal_compares() {
        let mut v: Vec<i32> = (0..2000).collect();
        let compares = Cell::new(0u64);
        sort(&mut v, |a, b| {
            compares.set(compares.get() + 1);
            a.cmp(b)
        });
        assert!(v.windows(2).all(|w| w[0] <= w[1]));
        assert!(compares.get() <= (v.len() as u64) * 2);
    }

    #[test]
    fn bytes_kernel_sorts_packed_triples_by_trailing_u16() {
        // element size 3: two filler bytes + a big-endian-ish key encoded
        // in the low byte, forcing the byte-copy kernel (size 3 is not a
        // multiple of the word size).
        let n = 2000usize;
        let mut data: Vec<[u8; 3]> = (0..n).map(|i| [0, 0, (255 - (i % 256)) as u8]).collect();
        sort(&mut data, |a, b| a[2].cmp(&b[2]));
        assert!(data.windows(2).all(|w| w[0][2] <= w[1][2]));
    }

    #[test]
    fn large_shuffled_long_kernel_sorts_correctly() {
        let mut v: Vec<u64> = (0..65536u64).collect();
        let mut rng = StdRng::seed_from_u64(7);
        v.shuffle(&mut rng);
        sort(&mut v, |a, b| a.cmp(b));
        assert!(v.windows(2).all(|w| w[0] <= w[1]));
        for (i, &x) in v.iter().enumerate() {
            assert_eq!(x, i as u64);
        }
    }

    #[test]
    fn pointer_kernel_sorts_by_pointee() {
        let mut values: Vec<i32> = (0..500).rev().collect();
        let mut ptrs: Vec<*mut i32> = values.iter_mut().map(|v| v as *mut i32).collect();
        sort_ptr_slice(&mut ptrs, |a, b| unsafe { (*a).cmp(&*b) });
        for w in ptrs.windows(2) {
            unsafe { assert!(*w[0] <= *w[1]) };
        }
    }

    #[test]
    fn compare_count_is_within_n_log_n_bound() {
        let n = 65536usize;
        let mut v: Vec<(u32, u32)> = (0..n as u32).map(|i| (i % 256, i / 256)).collect();
        let mut rng = StdRng::seed_from_u64(100);
        v.shuffle(&mut rng);
        let compares = Cell::new(0u64);
        sort(&mut v, |a, b| {
            compares.set(compares.get() + 1);
            (a.0, a.1).cmp(&(b.0, b.1))
        });
        for w in v.windows(2) {
            assert_ne!(w[0].0.cmp(&w[1].0).then(w[0].1.cmp(&w[1].1)), Ordering::Greater);
        }
        let bound = (n as f64) * (n as f64).log2() * 1.5;
        assert!((compares.get() as f64) <= bound, "compares={} bound={}", compares.get(), bound);
    }
}
