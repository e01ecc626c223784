//! Element-shape dispatch and the scratch-memory allocator, grounded on
//! `C-kern/ds/sort/mergesort.c`'s `sortblob_mergesort`/`sortlong_mergesort`/
//! `sortbytes_mergesort` trio.
//!
//! The three kernels differ only in how they move bytes; selection is
//! mechanical (spec.md §4.1): a pointer-sized, pointer-aligned element goes
//! through the `Pointer` kernel directly (callers opt into this), a
//! word-multiple, word-aligned element goes through `Long`, everything else
//! falls back to `Bytes`.

use crate::platform::pages::Pages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Kernel {
    Pointer,
    Long,
    Bytes,
}

impl Kernel {
    /// Selects a kernel for `elem_size`-byte elements stored at `base`,
    /// mirroring `sortblob_mergesort`'s alignment check.
    pub(super) fn select(base: *const u8, elem_size: usize) -> Kernel {
        let word = std::mem::size_of::<usize>();
        if (base as usize) % word == 0 && elem_size % word == 0 {
            Kernel::Long
        } else {
            Kernel::Bytes
        }
    }

    /// Copies `count` elements of `elem_size` bytes from `src` to `dst`
    /// (regions must not overlap).
    ///
    /// # Safety
    /// `src` and `dst` must each point to `count * elem_size` readable (for
    /// `src`) / writable (for `dst`) bytes, and the two ranges must be
    /// disjoint.
    pub(super) unsafe fn copy(self, src: *const u8, dst: *mut u8, elem_size: usize, count: usize) {
        let bytes = elem_size * count;
        match self {
            Kernel::Pointer | Kernel::Long => {
                debug_assert_eq!(bytes % std::mem::size_of::<usize>(), 0);
                std::ptr::copy_nonoverlapping(src as *const usize, dst as *mut usize, bytes / std::mem::size_of::<usize>());
            }
            Kernel::Bytes => {
                std::ptr::copy_nonoverlapping(src, dst, bytes);
            }
        }
    }
}

const INLINE_SCRATCH_BYTES: usize = 256 * std::mem::size_of::<usize>();

/// The sorter's auxiliary buffer: an inline array good for at least 256
/// word-sized elements, promoted to a fresh page-aligned [`Pages`] mapping
/// when a merge needs more (spec.md §4.1, "Scratch-memory policy").
pub(super) enum Scratch {
    Inline([u8; INLINE_SCRATCH_BYTES]),
    Heap(Pages),
}

impl Scratch {
    pub(super) fn new() -> Self {
        Scratch::Inline([0; INLINE_SCRATCH_BYTES])
    }

    pub(super) fn capacity(&self) -> usize {
        match self {
            Scratch::Inline(buf) => buf.len(),
            Scratch::Heap(pages) => pages.len(),
        }
    }

    pub(super) fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Scratch::Inline(buf) => buf.as_mut_ptr(),
            Scratch::Heap(pages) => pages.as_ptr(),
        }
    }

    /// Ensures at least `bytes` of scratch capacity, replacing an
    /// undersized inline buffer with a fresh heap mapping. A heap mapping
    /// from a previous sort that is already large enough is kept.
    pub(super) fn ensure(&mut self, bytes: usize) -> crate::platform::Result<()> {
        if self.capacity() >= bytes {
            return Ok(());
        }
        *self = Scratch::Heap(Pages::alloc(bytes, false)?);
        Ok(())
    }

    /// Releases any heap-allocated scratch, reverting to the inline buffer
    /// (spec.md §4.1: "When the sort finishes... any heap-allocated scratch
    /// is released").
    pub(super) fn release(&mut self) {
        if matches!(self, Scratch::Heap(_)) {
            *self = Scratch::new();
        }
    }
}
