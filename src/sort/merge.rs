//! Two-run merge with trimming and galloping, grounded on the merge
//! description in spec.md §4.1 (`merge_adjacent_slices` /
//! `rmerge_adjacent_slices` in `C-kern/ds/sort/mergesort.c`, whose generic
//! per-shape bodies live in a header this pack does not carry — the
//! algorithm below is derived from the `.c` file's prose and from spec.md's
//! literal restatement of it).

use super::kernel::{Kernel, Scratch};
use std::cmp::Ordering;

/// After this many consecutive wins by the same side, switch to galloping.
const MIN_BLK_LEN: usize = 7;

pub(super) type Cmp<'a> = dyn Fn(*const u8, *const u8) -> Ordering + 'a;

/// Finds the boundary index in `[0, len)` such that every element before it
/// fails `probe` and every element from it on satisfies `probe`, assuming
/// `probe` is monotonic over the (sorted) range. `hint` is a starting index
/// used to gallop outward exponentially before bisecting — with `hint == 0`
/// this degenerates into plain binary search.
fn gallop_boundary(
    base: *const u8,
    elem_size: usize,
    len: usize,
    hint: usize,
    probe: &dyn Fn(*const u8) -> bool,
) -> usize {
    if len == 0 {
        return 0;
    }
    let elem_at = |i: usize| unsafe { base.add(i * elem_size) };
    let hint = hint.min(len - 1);

    let (mut lo, mut hi) = if probe(elem_at(hint)) {
        let mut hi = hint;
        let mut lo = 0usize;
        let mut step = 1usize;
        let mut cur = hint;
        while cur > 0 {
            let probe_at = cur.saturating_sub(step);
            if probe(elem_at(probe_at)) {
                hi = probe_at;
                cur = probe_at;
                step *= 2;
            } else {
                lo = probe_at;
                break;
            }
        }
        (lo, hi)
    } else {
        let mut lo = hint;
        let mut hi = len;
        let mut step = 1usize;
        loop {
            let next = lo + step;
            if next >= len {
                break;
            }
            if probe(elem_at(next)) {
                hi = next;
                break;
            }
            lo = next;
            step *= 2;
        }
        (lo, hi)
    };

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if probe(elem_at(mid)) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

fn lower_bound(base: *const u8, elem_size: usize, len: usize, cmp: &Cmp, key: *const u8) -> usize {
    gallop_boundary(base, elem_size, len, 0, &|p| cmp(p, key) != Ordering::Less)
}

fn upper_bound(base: *const u8, elem_size: usize, len: usize, cmp: &Cmp, key: *const u8) -> usize {
    gallop_boundary(base, elem_size, len, 0, &|p| cmp(p, key) == Ordering::Greater)
}

/// Merges the adjacent sorted runs `[base, base + l_len)` and
/// `[base + l_len*elem_size, base + (l_len+r_len)*elem_size)` in place.
pub(super) fn merge_runs(
    base: *mut u8,
    elem_size: usize,
    l_len: usize,
    r_len: usize,
    cmp: &Cmp,
    kernel: Kernel,
    scratch: &mut Scratch,
) -> crate::platform::Result<()> {
    if l_len == 0 || r_len == 0 {
        return Ok(());
    }
    let l_ptr = base;
    let r_ptr = unsafe { base.add(l_len * elem_size) };

    // Trim: elements of L already known to precede all of R, and elements
    // of R already known to follow all of L, need no merging.
    let l_last = unsafe { l_ptr.add((l_len - 1) * elem_size) } as *const u8;
    let l_skip = upper_bound(l_ptr as *const u8, elem_size, l_len, cmp, r_ptr as *const u8);
    let r_keep = lower_bound(r_ptr as *const u8, elem_size, r_len, cmp, l_last);

    let l_ptr = unsafe { l_ptr.add(l_skip * elem_size) };
    let l_len = l_len - l_skip;
    let r_len = r_keep;
    if l_len == 0 || r_len == 0 {
        return Ok(());
    }

    if l_len <= r_len {
        merge_left_to_right(l_ptr, r_ptr, elem_size, l_len, r_len, cmp, kernel, scratch)
    } else {
        merge_right_to_left(l_ptr, r_ptr, elem_size, l_len, r_len, cmp, kernel, scratch)
    }
}

/// `L` is the smaller (or equal) run: copy it to scratch, then fill the
/// destination front-to-back. Ties favor `L` (stable).
fn merge_left_to_right(
    l_ptr: *mut u8,
    r_ptr: *mut u8,
    elem_size: usize,
    l_len: usize,
    r_len: usize,
    cmp: &Cmp,
    kernel: Kernel,
    scratch: &mut Scratch,
) -> crate::platform::Result<()> {
    scratch.ensure(l_len * elem_size)?;
    let scratch_base = scratch.as_mut_ptr();
    unsafe { kernel.copy(l_ptr, scratch_base, elem_size, l_len) };

    let dest = l_ptr;
    let mut i = 0usize; // index into scratch (copy of L)
    let mut j = 0usize; // index into R, in place
    let mut k = 0usize; // index into dest
    let mut left_streak = 0usize;
    let mut right_streak = 0usize;

    let scratch_at = |i: usize| unsafe { scratch_base.add(i * elem_size) as *const u8 };
    let r_at = |j: usize| unsafe { r_ptr.add(j * elem_size) as *const u8 };

    while i < l_len && j < r_len {
        if left_streak >= MIN_BLK_LEN {
            // L has been winning: gallop through the scratch copy of L to
            // find how many more elements starting at `i` are still <=
            // R[j] (i.e. still win), and bulk-copy all of them at once.
            let run = upper_bound(scratch_at(i), elem_size, l_len - i, cmp, r_at(j));
            if run == 0 {
                left_streak = 0;
                continue;
            }
            unsafe { kernel.copy(scratch_at(i), dest.add(k * elem_size), elem_size, run) };
            i += run;
            k += run;
            left_streak = 0;
            continue;
        }
        if right_streak >= MIN_BLK_LEN {
            // R has been winning: gallop through R to find how many more
            // elements starting at `j` are still < scratch[i].
            let run = lower_bound(r_at(j), elem_size, r_len - j, cmp, scratch_at(i));
            if run == 0 {
                right_streak = 0;
                continue;
            }
            unsafe { kernel.copy(r_at(j), dest.add(k * elem_size), elem_size, run) };
            j += run;
            k += run;
            right_streak = 0;
            continue;
        }

        if cmp(scratch_at(i), r_at(j)) != Ordering::Greater {
            unsafe { kernel.copy(scratch_at(i), dest.add(k * elem_size), elem_size, 1) };
            i += 1;
            left_streak += 1;
            right_streak = 0;
        } else {
            unsafe { kernel.copy(r_at(j), dest.add(k * elem_size), elem_size, 1) };
            j += 1;
            right_streak += 1;
            left_streak = 0;
        }
        k += 1;
    }
    if i < l_len {
        unsafe { kernel.copy(scratch_at(i), dest.add(k * elem_size), elem_size, l_len - i) };
    }
    // Remaining R (if any) is already correctly placed at the tail.
    Ok(())
}

/// `R` is the smaller run: copy it to scratch, then fill the destination
/// back-to-front. Ties favor `L` (placed first), i.e. `R` is taken last.
fn merge_right_to_left(
    l_ptr: *mut u8,
    r_ptr: *mut u8,
    elem_size: usize,
    l_len: usize,
    r_len: usize,
    cmp: &Cmp,
    kernel: Kernel,
    scratch: &mut Scratch,
) -> crate::platform::Result<()> {
    scratch.ensure(r_len * elem_size)?;
    let scratch_base = scratch.as_mut_ptr();
    unsafe { kernel.copy(r_ptr, scratch_base, elem_size, r_len) };

    let dest_end = l_ptr; // destination spans [l_ptr, l_ptr + (l_len+r_len)*elem_size)
    let mut i = l_len as isize - 1; // index into L, in place
    let mut j = r_len as isize - 1; // index into scratch (copy of R)
    let mut k = (l_len + r_len) as isize - 1;
    let mut left_streak = 0usize;
    let mut right_streak = 0usize;

    let l_at = |i: isize| unsafe { dest_end.add(i as usize * elem_size) as *const u8 };
    let scratch_at = |j: isize| unsafe { scratch_base.add(j as usize * elem_size) as *const u8 };

    while i >= 0 && j >= 0 {
        if right_streak >= MIN_BLK_LEN {
            // Count trailing scratch (R) elements that are still >= L[i] —
            // all lose to L's current candidate and can move as one block.
            let key = l_at(i);
            let count = (j + 1) as usize
                - lower_bound(scratch_base as *const u8, elem_size, (j + 1) as usize, cmp, key);
            if count == 0 {
                right_streak = 0;
                continue;
            }
            let src_start = (j + 1) as usize - count;
            let dst_start = (k + 1) as usize - count;
            unsafe {
                kernel.copy(
                    scratch_at(src_start as isize),
                    dest_end.add(dst_start * elem_size),
                    elem_size,
                    count,
                )
            };
            j -= count as isize;
            k -= count as isize;
            right_streak = 0;
            continue;
        }
        if left_streak >= MIN_BLK_LEN {
            let key = scratch_at(j);
            let count = (i + 1) as usize
                - upper_bound(dest_end as *const u8, elem_size, (i + 1) as usize, cmp, key);
            if count == 0 {
                left_streak = 0;
                continue;
            }
            let src_start = (i + 1) as usize - count;
            let dst_start = (k + 1) as usize - count;
            if src_start != dst_start {
                unsafe {
                    kernel.copy(
                        l_at(src_start as isize),
                        dest_end.add(dst_start * elem_size),
                        elem_size,
                        count,
                    )
                };
            }
            i -= count as isize;
            k -= count as isize;
            left_streak = 0;
            continue;
        }

        if cmp(l_at(i), scratch_at(j)) == Ordering::Greater {
            unsafe { kernel.copy(l_at(i), dest_end.add(k as usize * elem_size), elem_size, 1) };
            i -= 1;
            left_streak += 1;
            right_streak = 0;
        } else {
            unsafe { kernel.copy(scratch_at(j), dest_end.add(k as usize * elem_size), elem_size, 1) };
            j -= 1;
            right_streak += 1;
            left_streak = 0;
        }
        k -= 1;
    }
    if j >= 0 {
        unsafe {
            kernel.copy(
                scratch_base as *const u8,
                dest_end.add((k + 1 - (j + 1)) as usize * elem_size),
                elem_size,
                (j + 1) as usize,
            )
        };
    }
    // Remaining L (if any) is already correctly placed at the front.
    Ok(())
}
