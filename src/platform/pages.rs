//! Anonymous page allocation, grounded on `C-kern/os/Linux/virtmemory.c`.
//!
//! Two flavors: private pages (for [`crate::sort`]'s scratch buffer) and
//! shared pages (for [`crate::perftest`]'s cross-process region, which must
//! survive a `fork`).

use super::{PlatformError, Result};
use std::ptr::NonNull;

/// An anonymous `mmap`-backed region, unmapped on drop.
pub struct Pages {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the region is either process-private or explicitly shared via
// `MAP_SHARED`; callers establish their own synchronization over its
// contents (spec.md §5, "PerfTest: shared region... no intra-instance
// synchronisation required").
unsafe impl Send for Pages {}
unsafe impl Sync for Pages {}

impl Pages {
    /// Allocates `bytes` (rounded up to a whole number of pages) of
    /// zero-filled anonymous memory.
    ///
    /// `shared` selects `MAP_SHARED` (visible across `fork`, used by
    /// [`crate::perftest`]) vs `MAP_PRIVATE` (copy-on-write, used by
    /// [`crate::sort`]'s scratch allocator).
    pub fn alloc(bytes: usize, shared: bool) -> Result<Self> {
        let len = round_up_to_page(bytes.max(1));
        let flags = libc::MAP_ANONYMOUS | if shared { libc::MAP_SHARED } else { libc::MAP_PRIVATE };
        // SAFETY: a fresh anonymous mapping with no backing file.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(PlatformError::Alloc {
                bytes: len,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(Self {
            // SAFETY: mmap succeeded, so `ptr` is non-null.
            ptr: unsafe { NonNull::new_unchecked(ptr as *mut u8) },
            len,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `len` bytes were mapped and remain mapped until `Drop`.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: exclusive borrow of `self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Pages {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe exactly the mapping created in `alloc`.
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

fn round_up_to_page(bytes: usize) -> usize {
    let page = page_size();
    (bytes + page - 1) / page * page
}

/// The platform's page size, queried once per process.
pub fn page_size() -> usize {
    // SAFETY: `sysconf` with `_SC_PAGESIZE` never fails on a real Linux host.
    let rc = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    rc.max(4096) as usize
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn alloc_rounds_up_and_zero_fills() {
        let pages = Pages::alloc(1, false).unwrap();
        assert!(pages.len() >= page_size());
        assert!(pages.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn shared_pages_survive_a_write() {
        let mut pages = Pages::alloc(64, true).unwrap();
        pages.as_mut_slice()[0] = 42;
        assert_eq!(pages.as_slice()[0], 42);
    }
}
