//! Terminal line-discipline controller, grounded on
//! `C-kern/platform/Linux/io/terminal.c`. Toggles canonical ("cooked") mode,
//! echo, and signal generation on a tty file descriptor.

use std::os::fd::{AsRawFd, RawFd};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TermError {
    #[error("fd {0} is not a terminal")]
    NotATerminal(RawFd),
    #[error("termios syscall failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The subset of line-discipline flags this controller toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub canonical: bool,
    pub echo: bool,
    pub signals: bool,
}

impl Mode {
    pub const COOKED: Mode = Mode {
        canonical: true,
        echo: true,
        signals: true,
    };
    pub const RAW: Mode = Mode {
        canonical: false,
        echo: false,
        signals: false,
    };
}

/// A saved termios state for one fd, restored on [`Controller::restore`] or
/// `Drop`.
pub struct Controller {
    fd: RawFd,
    original: libc::termios,
}

impl Controller {
    /// Captures the current line discipline of `fd` so it can be restored
    /// later. Fails if `fd` is not backed by a terminal.
    pub fn capture(fd: &impl AsRawFd) -> Result<Self, TermError> {
        let raw = fd.as_raw_fd();
        let original = get_termios(raw)?;
        Ok(Self {
            fd: raw,
            original,
        })
    }

    /// Applies `mode`, translating each flag into the matching `c_lflag` bit.
    pub fn set_mode(&self, mode: Mode) -> Result<(), TermError> {
        let mut termios = get_termios(self.fd)?;
        set_flag(&mut termios.c_lflag, libc::ICANON, mode.canonical);
        set_flag(&mut termios.c_lflag, libc::ECHO, mode.echo);
        set_flag(&mut termios.c_lflag, libc::ISIG, mode.signals);
        if !mode.canonical {
            // Single-byte reads in raw mode: return as soon as 1 byte is
            // available, no inter-byte timeout.
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;
        }
        set_termios(self.fd, &termios)
    }

    /// Restores the line discipline captured by [`Controller::capture`].
    pub fn restore(&self) -> Result<(), TermError> {
        set_termios(self.fd, &self.original)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn get_termios(fd: RawFd) -> Result<libc::termios, TermError> {
    let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
    // SAFETY: `termios` is a valid out-pointer for `tcgetattr`.
    let rc = unsafe { libc::tcgetattr(fd, &mut termios) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOTTY) {
            return Err(TermError::NotATerminal(fd));
        }
        return Err(TermError::Io(err));
    }
    Ok(termios)
}

fn set_termios(fd: RawFd, termios: &libc::termios) -> Result<(), TermError> {
    // SAFETY: `termios` is a valid, fully-initialized `libc::termios`.
    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) };
    if rc != 0 {
        return Err(TermError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

fn set_flag(field: &mut libc::tcflag_t, bit: libc::tcflag_t, on: bool) {
    if on {
        *field |= bit;
    } else {
        *field &= !bit;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::File;

    #[test]
    fn non_terminal_fd_is_rejected() {
        let f = File::open("/dev/null").unwrap();
        assert!(matches!(
            Controller::capture(&f),
            Err(TermError::NotATerminal(_))
        ));
    }
}
