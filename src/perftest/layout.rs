//! The shared-memory region's binary layout: one [`Header`] followed by
//! `N` [`InstanceRecord`]s, grounded on `perftest_t`/`perftest_instance_t`
//! in `C-kern/test/perftest.c`.

use std::mem::{align_of, size_of};

/// Fields every process can see after `fork`, since they live in the
/// `MAP_SHARED` region (spec.md §3.5/§4.4, "Memory layout").
#[repr(C)]
pub(super) struct Header {
    pub(super) pagesize: usize,
    pub(super) nrinstance: u32,
    pub(super) nrprocess: u16,
    pub(super) nrthread: u16,
    pub(super) shared_addr: usize,
    pub(super) shared_size: usize,
    /// Monotonic start time, written by the parent just before releasing
    /// the run barrier (spec.md §4.4, "Timing").
    pub(super) start_secs: i64,
    pub(super) start_nanos: i32,
    _pad: i32,
}

/// One worker's user-writable fields (spec.md §3.5): `nrops`, `usec`,
/// `addr`, `size`, plus the `id` the worker reads to find its own record.
#[repr(C)]
pub(super) struct InstanceRecord {
    pub(super) id: u32,
    pub(super) nrops: u64,
    pub(super) usec: u64,
    pub(super) addr: usize,
    pub(super) size: usize,
}

pub(super) const HEADER_SIZE: usize = size_of::<Header>();
pub(super) const INSTANCE_SIZE: usize = size_of::<InstanceRecord>();
pub(super) const INSTANCE_ALIGN: usize = align_of::<InstanceRecord>();

/// Total byte size of a region holding `nrinstance` instance records after
/// the header, rounded so the instance array starts on an aligned offset.
pub(super) fn region_size(nrinstance: u32) -> Option<usize> {
    let header_end = HEADER_SIZE.next_multiple_of(INSTANCE_ALIGN);
    let instances = (nrinstance as usize).checked_mul(INSTANCE_SIZE)?;
    header_end.checked_add(instances)
}

fn instance_array_offset() -> usize {
    HEADER_SIZE.next_multiple_of(INSTANCE_ALIGN)
}

/// A typed view over a raw shared-memory byte pointer. `base` must point
/// to at least [`region_size`]`(nrinstance)` bytes, writable, for the
/// lifetime of every accessor call below.
#[derive(Clone, Copy)]
pub(super) struct Region {
    base: *mut u8,
}

// SAFETY: every accessor derives a pointer computed from a fixed offset
// into the caller-provided region; the region itself is `MAP_SHARED`
// memory shared across processes by construction (spec.md §3.5).
unsafe impl Send for Region {}

impl Region {
    pub(super) fn new(base: *mut u8) -> Self {
        Self { base }
    }

    pub(super) fn as_ptr(self) -> *mut u8 {
        self.base
    }

    fn header_ptr(self) -> *mut Header {
        self.base as *mut Header
    }

    /// Read-only access used by worker threads after the run barrier has
    /// released them — the barrier's pipe read is the happens-before edge
    /// against the parent's one-time header write, so no atomics are
    /// needed here (mirroring the original C code, which has none either).
    ///
    /// # Safety
    /// No writer may be concurrently active; see above for why that holds.
    pub(super) unsafe fn header(self) -> &'static Header {
        &*self.header_ptr()
    }

    /// Exclusive access, used only by the parent before fork and for the
    /// one-time `start_secs`/`start_nanos` write before the run barrier.
    ///
    /// # Safety
    /// Caller must ensure no other reference to the header is live.
    pub(super) unsafe fn header_mut(self) -> &'static mut Header {
        &mut *self.header_ptr()
    }

    fn instance_ptr(self, id: u32) -> *mut InstanceRecord {
        unsafe {
            self.base
                .add(instance_array_offset() + id as usize * INSTANCE_SIZE)
        }
        .cast()
    }

    /// # Safety
    /// Callers must not alias the same `id` across the program; every
    /// instance's record is touched by exactly one thread.
    pub(super) unsafe fn instance(self, id: u32) -> &'static mut InstanceRecord {
        &mut *self.instance_ptr(id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn region_size_fits_header_and_instances() {
        let size = region_size(12).unwrap();
        assert!(size >= HEADER_SIZE + 12 * INSTANCE_SIZE);
    }

    #[test]
    fn header_and_instance_round_trip() {
        let mut buf = vec![0u8; region_size(4).unwrap()];
        let region = Region::new(buf.as_mut_ptr());
        unsafe {
            region.header_mut().nrinstance = 4;
            region.instance(2).nrops = 99;
        }
        unsafe {
            assert_eq!(region.header().nrinstance, 4);
            assert_eq!(region.instance(2).nrops, 99);
            assert_eq!(region.instance(1).nrops, 0);
        }
    }
}
