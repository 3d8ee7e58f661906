// SPDX-License-Identifier: MIT
//
// Key inspector — print what each keypress sends.
//
// Useful for finding out what a terminal actually delivers in raw mode:
// Enter is 13 (not 10), Ctrl-S is 19 now that flow control is off, an
// arrow key is 27 followed by two printable bytes. One line per byte:
//
//   97 ('a')
//   13
//
// Control bytes and bytes above 127 print as a bare number. Plain `q`
// quits. Timeouts print nothing.

use std::io::{Read, Write};

use keto_term::reader::KeyReader;
use keto_term::signal;
use keto_term::terminal::{RawMode, ReadTimeout, TerminalDevice};
use keto_term::{Error, Result, ansi};
use tracing::{info, warn};

use crate::session::ExitReason;

/// The key that ends inspection. Not a control key, so it can't collide
/// with anything being inspected except itself.
pub const INSPECT_QUIT: u8 = b'q';

/// Format one byte the way the inspector prints it.
#[must_use]
pub fn describe(key: u8) -> String {
    if key.is_ascii_graphic() || key == b' ' {
        format!("{key} ('{}')", char::from(key))
    } else {
        key.to_string()
    }
}

/// Raw-mode byte printer.
pub struct KeyInspector<'d, D: TerminalDevice + ?Sized, R, W> {
    device: &'d D,
    keys: KeyReader<R>,
    out: W,
    timeout: ReadTimeout,
    interrupt: fn() -> Option<i32>,
}

impl<'d, D, R, W> KeyInspector<'d, D, R, W>
where
    D: TerminalDevice + ?Sized,
    R: Read,
    W: Write,
{
    /// An inspector on `device`, reading from `input` and printing to
    /// `output`. Signals come from [`signal::take_pending`].
    #[must_use]
    pub fn new(device: &'d D, input: R, output: W) -> Self {
        Self {
            device,
            keys: KeyReader::new(input),
            out: output,
            timeout: ReadTimeout::default(),
            interrupt: signal::take_pending,
        }
    }

    /// Wait at most `timeout` per read before checking for signals again.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: ReadTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the termination-signal check, consulted before every read.
    #[must_use]
    pub fn with_interrupt_check(mut self, check: fn() -> Option<i32>) -> Self {
        self.interrupt = check;
        self
    }

    /// Print bytes until `q` or a termination signal. Restores the
    /// terminal before returning.
    ///
    /// # Errors
    ///
    /// Raw-mode entry/restoration failures and fatal read/write errors.
    pub fn run(mut self) -> Result<ExitReason> {
        let raw = RawMode::enter(self.device, self.timeout)?;
        info!("key inspector started");

        let result = self.run_inner();
        let restored = raw.restore();

        match result {
            Ok(reason) => {
                restored?;
                Ok(reason)
            }
            Err(err) => {
                if let Err(e) = restored {
                    warn!(%e, "could not restore terminal after error");
                }
                Err(err)
            }
        }
    }

    fn run_inner(&mut self) -> Result<ExitReason> {
        loop {
            if let Some(sig) = (self.interrupt)() {
                return Ok(ExitReason::Signal(sig));
            }
            let Some(key) = self.keys.poll_key()? else {
                continue;
            };

            self.print(key).map_err(|e| Error::io("write", e))?;
            if key == INSPECT_QUIT {
                return Ok(ExitReason::Quit);
            }
        }
    }

    fn print(&mut self, key: u8) -> std::io::Result<()> {
        self.out.write_all(describe(key).as_bytes())?;
        ansi::crlf(&mut self.out)?;
        self.out.flush()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
