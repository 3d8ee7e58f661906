// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Single-byte key reader.
//
// Raw mode sets VMIN = 0 and VTIME = n, so a `read()` on the terminal
// returns after at most n tenths of a second, with or without a byte. That
// gives three kinds of outcome per attempt:
//
//   a byte          → the key
//   nothing         → timeout (Ok(0)) or a transient error (EAGAIN, EINTR)
//   anything else   → fatal
//
// `classify` makes the transient/fatal split explicit instead of checking a
// particular errno inline. `poll_key` is one attempt; `read_key` loops
// until a byte arrives.
//
// Input is read with `libc::read` on fd 0 rather than through `io::stdin()`,
// whose internal buffer would hide the one-byte-per-syscall behavior and
// turn EBADF into a silent EOF.

use std::io::{self, Read};

use tracing::trace;

use crate::error::{Error, Result};

// ─── Classification ─────────────────────────────────────────────────────────

/// What a failed `read()` means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFailure {
    /// No data right now; try again.
    Transient,
    /// The input is gone or broken.
    Fatal,
}

/// Sort a read error into retry-or-die.
///
/// Would-block (`EAGAIN`, which some systems return instead of a zero-byte
/// read when VTIME expires), interrupted system calls (a signal landed
/// during the read) and timeouts are transient. Everything else is fatal.
#[must_use]
pub fn classify(err: &io::Error) -> ReadFailure {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => {
            ReadFailure::Transient
        }
        _ => ReadFailure::Fatal,
    }
}

// ─── Stdin ──────────────────────────────────────────────────────────────────

/// Unbuffered standard input: every `read` is one `read(2)` on fd 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinFd;

impl Read for StdinFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
        Ok(n as usize)
    }
}

// ─── KeyReader ──────────────────────────────────────────────────────────────

/// Reads one keypress (one byte) at a time.
///
/// No escape-sequence decoding: an arrow key arrives as three separate
/// bytes.
pub struct KeyReader<R = StdinFd> {
    input: R,
}

impl<R: Read> KeyReader<R> {
    /// Wrap any byte source.
    #[must_use]
    pub const fn new(input: R) -> Self {
        Self { input }
    }

    /// The wrapped byte source.
    #[must_use]
    pub const fn get_ref(&self) -> &R {
        &self.input
    }

    /// One timeout-bounded attempt.
    ///
    /// Returns `Ok(None)` when the timeout expired or the read hit a
    /// transient error; nothing was consumed and nothing was written.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] for any read failure [`classify`] calls fatal.
    pub fn poll_key(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.input.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => {
                trace!(key = byte[0], "key read");
                Ok(Some(byte[0]))
            }
            Err(err) => match classify(&err) {
                ReadFailure::Transient => {
                    trace!(%err, "transient read failure, retrying");
                    Ok(None)
                }
                ReadFailure::Fatal => Err(Error::io("read", err)),
            },
        }
    }

    /// Block until a byte arrives, retrying through timeouts.
    ///
    /// On a source that has reached end of file this never returns; a
    /// terminal in raw mode reports "no byte yet" the same way.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] for any read failure [`classify`] calls fatal.
    pub fn read_key(&mut self) -> Result<u8> {
        loop {
            if let Some(key) = self.poll_key()? {
                return Ok(key);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
