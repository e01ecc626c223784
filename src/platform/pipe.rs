//! Bidirectional byte pipes with blocking and timeout semantics, grounded on
//! `C-kern/platform/Linux/io/pipe.c`. Used directly by [`crate::perftest`]'s
//! three barrier pipes.

use super::{PlatformError, Result};
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

pub struct PipeRead(OwnedFd);
pub struct PipeWrite(OwnedFd);

/// Creates a pipe, returning its read and write ends.
pub fn create() -> Result<(PipeRead, PipeWrite)> {
    let mut fds = [0i32; 2];
    // SAFETY: `fds` is a valid 2-element out-array for `pipe2`.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if rc != 0 {
        return Err(PlatformError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: `pipe2` returned two freshly-owned, valid file descriptors.
    let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    Ok((PipeRead(read), PipeWrite(write)))
}

fn poll_readable(fd: RawFd, timeout_ms: i32) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd entry.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            return Ok(false);
        }
        return Err(PlatformError::Io(err));
    }
    Ok(rc > 0)
}

fn poll_writable(fd: RawFd, timeout_ms: i32) -> Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLOUT,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd entry.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            return Ok(false);
        }
        return Err(PlatformError::Io(err));
    }
    Ok(rc > 0)
}

impl PipeRead {
    pub fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }

    pub fn into_raw_fd(self) -> RawFd {
        self.0.into_raw_fd()
    }

    /// Wraps an already-open, owned file descriptor as a read end.
    ///
    /// # Safety
    /// `fd` must be a valid, open, otherwise-unowned file descriptor.
    pub(crate) unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self(OwnedFd::from_raw_fd(fd))
    }

    /// Reads exactly `buf.len()` bytes, polling with `timeout_ms` before
    /// each underlying `read`. Returns `Ok(())` on success,
    /// `Err(TimedOut)` if no data arrived within the timeout, and
    /// `Err(BrokenPipe)` on EOF before `buf` is filled.
    pub fn read_all(&self, buf: &mut [u8], timeout_ms: u64) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if !poll_readable(self.0.as_raw_fd(), timeout_ms as i32)? {
                return Err(PlatformError::TimedOut(timeout_ms));
            }
            // SAFETY: writing into the unfilled tail of `buf`.
            let n = unsafe {
                libc::read(
                    self.0.as_raw_fd(),
                    buf[filled..].as_mut_ptr() as *mut libc::c_void,
                    buf.len() - filled,
                )
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(PlatformError::Io(err));
            }
            if n == 0 {
                return Err(PlatformError::BrokenPipe);
            }
            filled += n as usize;
        }
        Ok(())
    }

    /// Reads a single byte (the common case for PerfTest's barrier bytes).
    pub fn read_byte(&self, timeout_ms: u64) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_all(&mut b, timeout_ms)?;
        Ok(b[0])
    }
}

impl PipeWrite {
    pub fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }

    pub fn into_raw_fd(self) -> RawFd {
        self.0.into_raw_fd()
    }

    /// Wraps an already-open, owned file descriptor as a write end.
    ///
    /// # Safety
    /// `fd` must be a valid, open, otherwise-unowned file descriptor.
    pub(crate) unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self(OwnedFd::from_raw_fd(fd))
    }

    pub fn write_all(&self, buf: &[u8], timeout_ms: u64) -> Result<()> {
        let mut sent = 0;
        while sent < buf.len() {
            if !poll_writable(self.0.as_raw_fd(), timeout_ms as i32)? {
                return Err(PlatformError::TimedOut(timeout_ms));
            }
            // SAFETY: reading from the unsent prefix of `buf`.
            let n = unsafe {
                libc::write(
                    self.0.as_raw_fd(),
                    buf[sent..].as_ptr() as *const libc::c_void,
                    buf.len() - sent,
                )
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                match err.raw_os_error() {
                    Some(libc::EINTR) => continue,
                    Some(libc::EPIPE) => return Err(PlatformError::BrokenPipe),
                    _ => return Err(PlatformError::Io(err)),
                }
            }
            sent += n as usize;
        }
        Ok(())
    }

    pub fn write_byte(&self, byte: u8, timeout_ms: u64) -> Result<()> {
        self.write_all(&[byte], timeout_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_byte() {
        let (r, w) = create().unwrap();
        w.write_byte(7, 1000).unwrap();
        assert_eq!(r.read_byte(1000).unwrap(), 7);
    }

    #[test]
    fn read_times_out_when_nothing_written() {
        let (r, _w) = create().unwrap();
        let err = r.read_byte(20).unwrap_err();
        assert!(matches!(err, PlatformError::TimedOut(_)));
    }

    #[test]
    fn eof_after_writer_drops() {
        let (r, w) = create().unwrap();
        drop(w);
        let err = r.read_byte(1000).unwrap_err();
        assert!(matches!(err, PlatformError::BrokenPipe));
    }
}
