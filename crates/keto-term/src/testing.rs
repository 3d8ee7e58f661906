// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// In-memory terminal for tests.
//
// `MemoryDevice` records every attribute change and can be told to fail
// any of its three operations, so raw-mode entry, restoration and the
// geometry probe can be exercised without a TTY. Compiled for this crate's
// own tests and, through the `testing` feature, for downstream crates.

use std::cell::{Cell, RefCell};
use std::io;

use crate::error::{Error, Result};
use crate::terminal::{Attributes, Size, TerminalDevice};

/// A typical cooked-mode termios: echo, canonical input, signals, CR→NL,
/// flow control, output post-processing, 7-bit characters.
#[must_use]
pub fn cooked_attributes() -> Attributes {
    let mut t: libc::termios = unsafe { std::mem::zeroed() };
    t.c_iflag = libc::ICRNL | libc::IXON | libc::BRKINT | libc::IMAXBEL;
    t.c_oflag = libc::OPOST | libc::ONLCR;
    t.c_cflag = libc::CS7 | libc::CREAD;
    t.c_lflag =
        libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN | libc::ECHOE | libc::ECHOK;
    t.c_cc[libc::VMIN] = 1;
    t.c_cc[libc::VTIME] = 0;
    Attributes::from_termios(t)
}

/// A scripted terminal device.
#[derive(Debug)]
pub struct MemoryDevice {
    current: Cell<Attributes>,
    size: Size,
    fail_get: bool,
    fail_set: bool,
    fail_window_size: bool,
    history: RefCell<Vec<Attributes>>,
}

impl MemoryDevice {
    /// A cooked-mode device of the given size.
    #[must_use]
    pub fn new(size: Size) -> Self {
        Self {
            current: Cell::new(cooked_attributes()),
            size,
            fail_get: false,
            fail_set: false,
            fail_window_size: false,
            history: RefCell::new(Vec::new()),
        }
    }

    /// Make `attributes()` fail with `ENOTTY`.
    #[must_use]
    pub fn fail_get(mut self) -> Self {
        self.fail_get = true;
        self
    }

    /// Make every `set_attributes()` fail with `EIO`.
    #[must_use]
    pub fn fail_set(mut self) -> Self {
        self.fail_set = true;
        self
    }

    /// Make `window_size()` fail with `ENOTTY`.
    #[must_use]
    pub fn fail_window_size(mut self) -> Self {
        self.fail_window_size = true;
        self
    }

    /// Attributes currently in effect.
    #[must_use]
    pub fn current(&self) -> Attributes {
        self.current.get()
    }

    /// Whether the device is in raw mode (echo and canonical input off).
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.current().local_flags() & (libc::ECHO | libc::ICANON) == 0
    }

    /// Number of successful `set_attributes()` calls.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.history.borrow().len()
    }

    /// Every attribute set applied, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Attributes> {
        self.history.borrow().clone()
    }
}

impl TerminalDevice for MemoryDevice {
    fn attributes(&self) -> Result<Attributes> {
        if self.fail_get {
            return Err(Error::Terminal {
                op: "tcgetattr",
                cause: io::Error::from_raw_os_error(libc::ENOTTY),
            });
        }
        Ok(self.current.get())
    }

    fn set_attributes(&self, attrs: &Attributes) -> Result<()> {
        if self.fail_set {
            return Err(Error::Terminal {
                op: "tcsetattr",
                cause: io::Error::from_raw_os_error(libc::EIO),
            });
        }
        self.current.set(*attrs);
        self.history.borrow_mut().push(*attrs);
        Ok(())
    }

    fn window_size(&self) -> Result<Size> {
        if self.fail_window_size {
            return Err(Error::Geometry {
                op: "ioctl(TIOCGWINSZ)",
                reason: io::Error::from_raw_os_error(libc::ENOTTY).to_string(),
            });
        }
        Ok(self.size)
    }
}
