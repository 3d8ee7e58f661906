// SPDX-License-Identifier: MIT
//
// Editor session — render, read, dispatch, until quit.
//
//   Uninitialized ──enter raw + probe──▶ RawActive ──quit / signal──▶ Terminated
//                         │                  │
//                         └──── error ───────┴──▶ (restored) Err
//
// `run` consumes the session, so Terminated is absorbing by construction:
// once it returns there is nothing left to read with.
//
// The raw-mode guard lives on `run`'s stack. Every way out of the loop,
// quit, signal, or a fatal error from any component, passes through the same
// epilogue: clear the screen, restore the attributes, report. If the
// epilogue itself fails on an error path, the original error wins and the
// secondary failure is logged.
//
// Geometry is read once. Keys other than quit are dropped without a
// redraw-visible effect; the next frame is byte-identical to the last.

use std::io::{Read, Write};

use keto_term::Result;
use keto_term::reader::KeyReader;
use keto_term::screen::Screen;
use keto_term::signal;
use keto_term::terminal::{self, RawMode, ReadTimeout, TerminalDevice};
use tracing::{debug, info, trace, warn};

use crate::key::{Command, Keymap};

// ─── State ───────────────────────────────────────────────────────────────────

/// Terminal input mode as far as the session knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Cooked,
    Raw,
}

/// Geometry and mode for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub rows: u16,
    pub cols: u16,
    pub mode: Mode,
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The quit key was pressed.
    Quit,
    /// A termination signal arrived while waiting for a key.
    Signal(i32),
}

/// How a session that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub reason: ExitReason,
    /// Keys read and dispatched, the quit key included.
    pub keys_read: usize,
    /// Final state; `mode` is always [`Mode::Cooked`].
    pub state: SessionState,
}

/// Result of waiting for one key.
enum Wait {
    Key(u8),
    Signal(i32),
}

// ─── EditorSession ──────────────────────────────────────────────────────────

/// One run of the editor screen.
///
/// ```no_run
/// use std::io;
///
/// use keto_editor::session::EditorSession;
/// use keto_term::reader::StdinFd;
/// use keto_term::terminal::Stdio;
///
/// let outcome = EditorSession::new(&Stdio, StdinFd, io::stdout()).run()?;
/// println!("read {} keys", outcome.keys_read);
/// # Ok::<(), keto_term::Error>(())
/// ```
pub struct EditorSession<'d, D: TerminalDevice + ?Sized, R, W> {
    device: &'d D,
    keys: KeyReader<R>,
    out: W,
    screen: Screen,
    keymap: Keymap,
    timeout: ReadTimeout,
    interrupt: fn() -> Option<i32>,
    state: SessionState,
    keys_read: usize,
}

impl<'d, D, R, W> EditorSession<'d, D, R, W>
where
    D: TerminalDevice + ?Sized,
    R: Read,
    W: Write,
{
    /// A session on `device`, reading keys from `input` and drawing to
    /// `output`, with the default timeout, keymap and screen.
    ///
    /// Termination signals are taken from [`signal::take_pending`]; call
    /// [`signal::install`] first for them to be recorded.
    #[must_use]
    pub fn new(device: &'d D, input: R, output: W) -> Self {
        Self {
            device,
            keys: KeyReader::new(input),
            out: output,
            screen: Screen::new(),
            keymap: Keymap::default(),
            timeout: ReadTimeout::default(),
            interrupt: signal::take_pending,
            state: SessionState {
                rows: 0,
                cols: 0,
                mode: Mode::Cooked,
            },
            keys_read: 0,
        }
    }

    /// Wait at most `timeout` per read before checking for signals again.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: ReadTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `keymap` to decide which key quits.
    #[must_use]
    pub fn with_keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = keymap;
        self
    }

    /// Draw rows with `screen` instead of the default `~` placeholder.
    #[must_use]
    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen = screen;
        self
    }

    /// Replace the termination-signal check, consulted before every read
    /// attempt.
    #[must_use]
    pub fn with_interrupt_check(mut self, check: fn() -> Option<i32>) -> Self {
        self.interrupt = check;
        self
    }

    /// Enter raw mode, probe geometry, and loop until quit or signal.
    ///
    /// The terminal is restored before this returns, whatever it returns.
    ///
    /// # Errors
    ///
    /// The first fatal error: [`Terminal`](keto_term::Error::Terminal) from
    /// raw-mode entry or restoration, [`Geometry`](keto_term::Error::Geometry)
    /// from the probe, [`Io`](keto_term::Error::Io) from reading or drawing.
    pub fn run(mut self) -> Result<Outcome> {
        let raw = RawMode::enter(self.device, self.timeout)?;
        self.state.mode = Mode::Raw;

        let result = self.run_inner();

        let cleared = self.screen.clear(&mut self.out);
        let restored = raw.restore();
        self.state.mode = Mode::Cooked;

        match result {
            Ok(reason) => {
                cleared?;
                restored?;
                info!(?reason, keys = self.keys_read, "session ended");
                Ok(Outcome {
                    reason,
                    keys_read: self.keys_read,
                    state: self.state,
                })
            }
            Err(err) => {
                if let Err(e) = cleared {
                    warn!(%e, "could not clear screen after error");
                }
                if let Err(e) = restored {
                    warn!(%e, "could not restore terminal after error");
                }
                Err(err)
            }
        }
    }

    /// The RawActive phase, separated so the epilogue runs regardless of outcome.
    fn run_inner(&mut self) -> Result<ExitReason> {
        let size = terminal::probe(self.device)?;
        self.state.rows = size.rows;
        self.state.cols = size.cols;
        info!(rows = size.rows, cols = size.cols, "session active");

        loop {
            self.screen.refresh(&mut self.out, self.state.rows)?;

            let key = match self.wait_key()? {
                Wait::Key(key) => key,
                Wait::Signal(sig) => {
                    warn!(sig, "termination signal received");
                    return Ok(ExitReason::Signal(sig));
                }
            };
            self.keys_read += 1;

            match self.keymap.dispatch(key) {
                Command::Quit => {
                    debug!("quit key pressed");
                    return Ok(ExitReason::Quit);
                }
                Command::Ignore => trace!(key, "ignored"),
            }
        }
    }

    /// Poll until a key arrives, checking for termination before every
    /// read attempt so a steady stream of input cannot hold off a signal.
    fn wait_key(&mut self) -> Result<Wait> {
        loop {
            if let Some(sig) = (self.interrupt)() {
                return Ok(Wait::Signal(sig));
            }
            if let Some(key) = self.keys.poll_key()? {
                return Ok(Wait::Key(key));
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    use keto_term::Error;
    use keto_term::terminal::Size;
    use keto_term::testing::{MemoryDevice, cooked_attributes};
    use pretty_assertions::assert_eq;

    use crate::key::{CTRL_Q, ctrl_key};

    const SIZE: Size = Size { cols: 80, rows: 24 };
    const CLEAR: &[u8] = b"\x1b[2J\x1b[H";

    fn no_signal() -> Option<i32> {
        None
    }

    fn sigterm() -> Option<i32> {
        Some(15)
    }

    fn frame(rows: u16) -> Vec<u8> {
        let mut out = Vec::new();
        Screen::new().refresh(&mut out, rows).unwrap();
        out
    }

    fn session<'a>(
        device: &'a MemoryDevice,
        input: &'a mut Cursor<Vec<u8>>,
        out: &'a mut Vec<u8>,
    ) -> EditorSession<'a, MemoryDevice, &'a mut Cursor<Vec<u8>>, &'a mut Vec<u8>> {
        EditorSession::new(device, input, out).with_interrupt_check(no_signal)
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingRead;

    impl Read for FailingRead {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    // ── quit ────────────────────────────────────────────────────────

    #[test]
    fn quit_after_two_ignored_keys() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![b'a', b'b', CTRL_Q, b'z']);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out).run().unwrap();

        assert_eq!(outcome.reason, ExitReason::Quit);
        assert_eq!(outcome.keys_read, 3);
        assert_eq!(input.position(), 3, "no read after quit");

        let mut expected = Vec::new();
        for _ in 0..3 {
            expected.extend_from_slice(&frame(24));
        }
        expected.extend_from_slice(CLEAR);
        assert_eq!(out, expected);
    }

    #[test]
    fn immediate_quit_draws_one_frame() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out).run().unwrap();

        assert_eq!(outcome.keys_read, 1);
        assert_eq!(out, [frame(24), CLEAR.to_vec()].concat());
    }

    #[test]
    fn plain_q_does_not_quit() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![b'q', b'Q', CTRL_Q]);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out).run().unwrap();
        assert_eq!(outcome.keys_read, 3);
    }

    #[test]
    fn custom_quit_key() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q, ctrl_key(b'x')]);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out)
            .with_keymap(Keymap::with_quit_letter(b'x').unwrap())
            .run()
            .unwrap();
        assert_eq!(outcome.keys_read, 2);
    }

    // ── terminal restoration ────────────────────────────────────────

    #[test]
    fn quit_restores_original_attributes() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![b'a', CTRL_Q]);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out).run().unwrap();

        assert_eq!(device.current(), cooked_attributes());
        assert!(!device.is_raw());
        assert_eq!(outcome.state.mode, Mode::Cooked);
        // Exactly one switch to raw and one back.
        assert_eq!(device.set_calls(), 2);
    }

    #[test]
    fn session_runs_in_raw_mode() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        session(&device, &mut input, &mut out).run().unwrap();

        let history = device.history();
        let raw = history[0];
        assert_eq!(raw.min_bytes(), 0);
        assert_eq!(raw.read_timeout(), 1);
        assert_eq!(history[1], cooked_attributes());
    }

    #[test]
    fn read_timeout_is_applied() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        session(&device, &mut input, &mut out)
            .with_read_timeout(ReadTimeout::from_tenths(5).unwrap())
            .run()
            .unwrap();
        assert_eq!(device.history()[0].read_timeout(), 5);
    }

    #[test]
    fn read_failure_restores_terminal() {
        let device = MemoryDevice::new(SIZE);
        let mut out = Vec::new();

        let err = EditorSession::new(&device, FailingRead, &mut out)
            .with_interrupt_check(no_signal)
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::Io { op: "read", .. }), "{err:?}");
        assert!(!device.is_raw());
        assert!(out.ends_with(CLEAR), "screen cleared on error");
    }

    #[test]
    fn write_failure_restores_terminal() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);

        let err = EditorSession::new(&device, &mut input, Broken)
            .with_interrupt_check(no_signal)
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::Io { op: "write", .. }), "{err:?}");
        assert!(!device.is_raw());
        assert_eq!(input.position(), 0, "no read after a failed draw");
    }

    // ── geometry ────────────────────────────────────────────────────

    #[test]
    fn state_records_geometry() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        let outcome = session(&device, &mut input, &mut out).run().unwrap();
        assert_eq!(outcome.state.rows, 24);
        assert_eq!(outcome.state.cols, 80);
    }

    #[test]
    fn frame_has_one_line_per_row() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        session(&device, &mut input, &mut out).run().unwrap();
        let lines = out.windows(3).filter(|w| *w == b"~\r\n").count();
        assert_eq!(lines, 24);
    }

    #[test]
    fn zero_columns_aborts_and_restores() {
        let device = MemoryDevice::new(Size { cols: 0, rows: 24 });
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        let err = session(&device, &mut input, &mut out).run().unwrap_err();

        assert!(matches!(err, Error::Geometry { .. }), "{err:?}");
        assert!(!device.is_raw());
        assert_eq!(device.current(), cooked_attributes());
        assert_eq!(input.position(), 0, "no key read");
        assert!(!out.windows(3).any(|w| w == b"~\r\n"), "no frame drawn");
    }

    #[test]
    fn geometry_query_failure_aborts() {
        let device = MemoryDevice::new(SIZE).fail_window_size();
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        let err = session(&device, &mut input, &mut out).run().unwrap_err();
        assert!(matches!(err, Error::Geometry { .. }));
        assert!(!device.is_raw());
    }

    // ── startup failure ─────────────────────────────────────────────

    #[test]
    fn attribute_failure_touches_nothing() {
        let device = MemoryDevice::new(SIZE).fail_get();
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        let err = session(&device, &mut input, &mut out).run().unwrap_err();

        assert!(matches!(err, Error::Terminal { op: "tcgetattr", .. }));
        assert!(out.is_empty());
        assert_eq!(device.set_calls(), 0);
        assert_eq!(input.position(), 0);
    }

    // ── timeouts and signals ────────────────────────────────────────

    #[test]
    fn timeouts_have_no_visible_effect() {
        // A reader that times out twice before every byte.
        struct Slow {
            bytes: Vec<u8>,
            polls: usize,
        }
        impl Read for Slow {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                self.polls += 1;
                if self.polls % 3 != 0 || self.bytes.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.bytes.remove(0);
                Ok(1)
            }
        }

        let device = MemoryDevice::new(SIZE);
        let mut out = Vec::new();
        let slow = Slow {
            bytes: vec![b'a', CTRL_Q],
            polls: 0,
        };

        let outcome = EditorSession::new(&device, slow, &mut out)
            .with_interrupt_check(no_signal)
            .run()
            .unwrap();

        assert_eq!(outcome.keys_read, 2);
        // One frame per key, nothing extra for the four timeouts.
        assert_eq!(out, [frame(24), frame(24), CLEAR.to_vec()].concat());
    }

    #[test]
    fn signal_ends_session_cleanly() {
        let device = MemoryDevice::new(SIZE);
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();

        let outcome = EditorSession::new(&device, &mut input, &mut out)
            .with_interrupt_check(sigterm)
            .run()
            .unwrap();

        assert_eq!(outcome.reason, ExitReason::Signal(15));
        assert_eq!(outcome.keys_read, 0);
        assert!(!device.is_raw());
        assert_eq!(out, [frame(24), CLEAR.to_vec()].concat());
    }

    #[test]
    fn signal_wins_over_pending_input() {
        let device = MemoryDevice::new(SIZE);
        let mut keys = vec![b'a'; 1000];
        keys.push(CTRL_Q);
        let mut input = Cursor::new(keys);
        let mut out = Vec::new();

        let outcome = EditorSession::new(&device, &mut input, &mut out)
            .with_interrupt_check(sigterm)
            .run()
            .unwrap();
        assert_eq!(outcome.reason, ExitReason::Signal(15));
        assert_eq!(outcome.keys_read, 0);
        assert_eq!(input.position(), 0);
        assert!(!device.is_raw());
    }

    // ── screen ──────────────────────────────────────────────────────

    #[test]
    fn custom_placeholder_reaches_output() {
        let device = MemoryDevice::new(Size { cols: 10, rows: 2 });
        let mut input = Cursor::new(vec![CTRL_Q]);
        let mut out = Vec::new();

        session(&device, &mut input, &mut out)
            .with_screen(Screen::with_placeholder(b'.').unwrap())
            .run()
            .unwrap();
        assert_eq!(out, b"\x1b[2J\x1b[H.\r\n.\r\n\x1b[H\x1b[2J\x1b[H");
    }
}
