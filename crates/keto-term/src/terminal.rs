// SPDX-License-Identifier: MIT
//
// Terminal control — raw mode, window size, and RAII restoration.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr) and ioctl (TIOCGWINSZ). These are the standard POSIX
// interfaces for terminal control — there is no safe alternative. Each
// unsafe block is minimal.
#![allow(unsafe_code)]
//
// Entering raw mode hands back a `RawMode` guard that owns the attribute
// snapshot taken just before the switch. Releasing the guard, explicitly
// through `restore()` or implicitly on drop, puts the snapshot back. There
// is no process-global copy: whoever holds the guard holds the only way
// back to cooked mode, and unwinding drops it like any other value.
//
// All device access goes through the `TerminalDevice` trait so the session
// logic can run against an in-memory terminal in tests.

use std::fmt;
use std::io;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::error::{Error, Result};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

// ─── Read timeout ───────────────────────────────────────────────────────────

/// How long a raw-mode `read()` waits for a byte, in tenths of a second.
///
/// Maps directly onto `VTIME`. Zero is not representable: with `VMIN = 0`
/// a zero timeout turns every read into a busy poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTimeout(u8);

impl ReadTimeout {
    /// A timeout of `tenths` tenths of a second. `None` for zero.
    #[must_use]
    pub const fn from_tenths(tenths: u8) -> Option<Self> {
        if tenths == 0 { None } else { Some(Self(tenths)) }
    }

    /// The timeout in tenths of a second.
    #[inline]
    #[must_use]
    pub const fn tenths(self) -> u8 {
        self.0
    }
}

impl Default for ReadTimeout {
    /// 100 ms.
    fn default() -> Self {
        Self(1)
    }
}

// ─── Raw mode adjustments ───────────────────────────────────────────────────

bitflags! {
    /// The individual attribute changes that make up raw mode.
    ///
    /// [`RawMode::enter`] always applies [`RawAdjust::all()`]; the set is
    /// typed so [`Attributes::to_raw`] can be checked one flag at a time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RawAdjust: u16 {
        /// Clear `IXON`: Ctrl-S / Ctrl-Q reach us instead of pausing output.
        const FLOW_CONTROL = 1 << 0;
        /// Clear `ICRNL`: Enter reads as `\r`, Ctrl-M as 13.
        const CR_TO_NL = 1 << 1;
        /// Clear `BRKINT`: a break condition does not raise SIGINT.
        const BREAK_SIGNAL = 1 << 2;
        /// Clear `INPCK`: no input parity checking.
        const PARITY_CHECK = 1 << 3;
        /// Clear `ISTRIP`: keep the 8th bit of every input byte.
        const STRIP_HIGH_BIT = 1 << 4;
        /// Clear `OPOST`: no `\n` → `\r\n` translation on output.
        const OUTPUT_PROCESSING = 1 << 5;
        /// Clear `ECHO`.
        const ECHO = 1 << 6;
        /// Clear `ICANON`: bytes arrive one at a time, not per line.
        const CANONICAL = 1 << 7;
        /// Clear `ISIG`: Ctrl-C / Ctrl-Z arrive as bytes.
        const SIGNALS = 1 << 8;
        /// Clear `IEXTEN`: Ctrl-V / Ctrl-O arrive as bytes.
        const EXTENDED_INPUT = 1 << 9;
        /// Set `CS8`: 8-bit characters.
        const EIGHT_BIT_CHARS = 1 << 10;
    }
}

// ─── Attributes ─────────────────────────────────────────────────────────────

/// Snapshot of a terminal's mode (termios).
///
/// Opaque apart from read-only accessors. The snapshot taken by
/// [`RawMode::enter`] is never mutated; raw mode is applied from a derived
/// copy built by [`to_raw`](Self::to_raw).
#[derive(Clone, Copy)]
pub struct Attributes {
    termios: libc::termios,
}

impl Attributes {
    /// Wrap a termios struct.
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self { termios }
    }

    /// The underlying termios struct.
    #[inline]
    #[must_use]
    pub const fn as_termios(&self) -> &libc::termios {
        &self.termios
    }

    #[inline]
    #[must_use]
    pub const fn input_flags(&self) -> libc::tcflag_t {
        self.termios.c_iflag
    }

    #[inline]
    #[must_use]
    pub const fn output_flags(&self) -> libc::tcflag_t {
        self.termios.c_oflag
    }

    #[inline]
    #[must_use]
    pub const fn control_flags(&self) -> libc::tcflag_t {
        self.termios.c_cflag
    }

    #[inline]
    #[must_use]
    pub const fn local_flags(&self) -> libc::tcflag_t {
        self.termios.c_lflag
    }

    /// `VMIN`: bytes a read waits for before returning.
    #[inline]
    #[must_use]
    pub const fn min_bytes(&self) -> libc::cc_t {
        self.termios.c_cc[libc::VMIN]
    }

    /// `VTIME`: read timeout in tenths of a second.
    #[inline]
    #[must_use]
    pub const fn read_timeout(&self) -> libc::cc_t {
        self.termios.c_cc[libc::VTIME]
    }

    /// Derive the raw-mode attributes: apply `adjust`, then set `VMIN = 0`
    /// and `VTIME = timeout` so reads come back empty-handed after the
    /// timeout instead of blocking forever.
    #[must_use]
    pub fn to_raw(&self, adjust: RawAdjust, timeout: ReadTimeout) -> Self {
        let mut raw = self.termios;

        let mut iflag: libc::tcflag_t = 0;
        if adjust.contains(RawAdjust::FLOW_CONTROL) {
            iflag |= libc::IXON;
        }
        if adjust.contains(RawAdjust::CR_TO_NL) {
            iflag |= libc::ICRNL;
        }
        if adjust.contains(RawAdjust::BREAK_SIGNAL) {
            iflag |= libc::BRKINT;
        }
        if adjust.contains(RawAdjust::PARITY_CHECK) {
            iflag |= libc::INPCK;
        }
        if adjust.contains(RawAdjust::STRIP_HIGH_BIT) {
            iflag |= libc::ISTRIP;
        }
        raw.c_iflag &= !iflag;

        if adjust.contains(RawAdjust::OUTPUT_PROCESSING) {
            raw.c_oflag &= !libc::OPOST;
        }

        let mut lflag: libc::tcflag_t = 0;
        if adjust.contains(RawAdjust::ECHO) {
            lflag |= libc::ECHO;
        }
        if adjust.contains(RawAdjust::CANONICAL) {
            lflag |= libc::ICANON;
        }
        if adjust.contains(RawAdjust::SIGNALS) {
            lflag |= libc::ISIG;
        }
        if adjust.contains(RawAdjust::EXTENDED_INPUT) {
            lflag |= libc::IEXTEN;
        }
        raw.c_lflag &= !lflag;

        if adjust.contains(RawAdjust::EIGHT_BIT_CHARS) {
            raw.c_cflag = (raw.c_cflag & !libc::CSIZE) | libc::CS8;
        }

        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = timeout.tenths();

        Self { termios: raw }
    }
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (&self.termios, &other.termios);
        a.c_iflag == b.c_iflag
            && a.c_oflag == b.c_oflag
            && a.c_cflag == b.c_cflag
            && a.c_lflag == b.c_lflag
            && a.c_cc == b.c_cc
    }
}

impl Eq for Attributes {}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("iflag", &format_args!("{:#o}", self.termios.c_iflag))
            .field("oflag", &format_args!("{:#o}", self.termios.c_oflag))
            .field("cflag", &format_args!("{:#o}", self.termios.c_cflag))
            .field("lflag", &format_args!("{:#o}", self.termios.c_lflag))
            .field("vmin", &self.min_bytes())
            .field("vtime", &self.read_timeout())
            .finish_non_exhaustive()
    }
}

// ─── Device ─────────────────────────────────────────────────────────────────

/// The terminal's control channel: attribute get/set and window size.
pub trait TerminalDevice {
    /// Read the current attributes (`tcgetattr`).
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the device refuses the query.
    fn attributes(&self) -> Result<Attributes>;

    /// Apply attributes, flushing pending input first (`TCSAFLUSH`).
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if the device rejects the change.
    fn set_attributes(&self, attrs: &Attributes) -> Result<()>;

    /// The raw window size as the device reports it. May be zero-width;
    /// [`probe`] is the checked entry point.
    ///
    /// # Errors
    ///
    /// [`Error::Geometry`] if the query is unsupported.
    fn window_size(&self) -> Result<Size>;
}

/// The process's controlling terminal: attributes on stdin, size on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stdio;

impl TerminalDevice for Stdio {
    fn attributes(&self) -> Result<Attributes> {
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) } != 0 {
            return Err(Error::terminal("tcgetattr"));
        }
        Ok(Attributes::from_termios(termios))
    }

    fn set_attributes(&self, attrs: &Attributes) -> Result<()> {
        // TCSAFLUSH waits for output to drain, and the termination handler
        // is installed without SA_RESTART, so a signal can cut the wait short.
        retry_interrupted(|| {
            if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, attrs.as_termios()) }
                != 0
            {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        })
        .map_err(|cause| Error::Terminal {
            op: "tcsetattr",
            cause,
        })
    }

    fn window_size(&self) -> Result<Size> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
            return Err(Error::Geometry {
                op: GEOMETRY_OP,
                reason: io::Error::last_os_error().to_string(),
            });
        }
        Ok(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    }
}

/// Run `op` again for as long as it fails with EINTR.
fn retry_interrupted(mut op: impl FnMut() -> io::Result<()>) -> io::Result<()> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                debug!("interrupted system call, retrying");
            }
            other => return other,
        }
    }
}

// ─── Geometry ───────────────────────────────────────────────────────────────

const GEOMETRY_OP: &str = "ioctl(TIOCGWINSZ)";

/// Query the terminal size, rejecting a zero-width result.
///
/// There is no fallback geometry: a terminal that cannot report its width
/// cannot be drawn on.
///
/// # Errors
///
/// [`Error::Geometry`] if the query fails or reports zero columns.
pub fn probe(device: &(impl TerminalDevice + ?Sized)) -> Result<Size> {
    let size = device.window_size()?;
    if size.cols == 0 {
        return Err(Error::Geometry {
            op: GEOMETRY_OP,
            reason: "terminal reported zero columns".into(),
        });
    }
    debug!(rows = size.rows, cols = size.cols, "probed terminal geometry");
    Ok(size)
}

// ─── Raw mode guard ─────────────────────────────────────────────────────────

/// Raw mode, held for as long as this guard lives.
///
/// ```no_run
/// use keto_term::terminal::{RawMode, ReadTimeout, Stdio};
///
/// let raw = RawMode::enter(&Stdio, ReadTimeout::default())?;
/// // ... read keys, draw frames ...
/// raw.restore()?;
/// # Ok::<(), keto_term::Error>(())
/// ```
#[must_use = "dropping the guard leaves raw mode immediately"]
pub struct RawMode<'a, D: TerminalDevice + ?Sized> {
    device: &'a D,
    original: Attributes,
    armed: bool,
}

impl<'a, D: TerminalDevice + ?Sized> RawMode<'a, D> {
    /// Snapshot the current attributes and switch the device to raw mode.
    ///
    /// Restoration is armed as soon as the snapshot exists, so a failed
    /// switch still puts the snapshot back on the way out.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if either the get or the set fails.
    pub fn enter(device: &'a D, timeout: ReadTimeout) -> Result<Self> {
        let original = device.attributes()?;
        let guard = Self {
            device,
            original,
            armed: true,
        };

        let raw = original.to_raw(RawAdjust::all(), timeout);
        device.set_attributes(&raw)?;

        debug!(vtime = timeout.tenths(), "entered raw mode");
        Ok(guard)
    }

    /// The attributes captured before raw mode.
    #[inline]
    #[must_use]
    pub const fn original(&self) -> &Attributes {
        &self.original
    }

    /// Put the original attributes back, reporting failure.
    ///
    /// Consumes the guard, so restoration happens at most once.
    ///
    /// # Errors
    ///
    /// [`Error::Terminal`] if `tcsetattr` fails.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.device.set_attributes(&self.original)?;
        debug!("restored terminal attributes");
        Ok(())
    }
}

impl<D: TerminalDevice + ?Sized> Drop for RawMode<'_, D> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.device.set_attributes(&self.original) {
            Ok(()) => debug!("restored terminal attributes on drop"),
            Err(err) => warn!(%err, "failed to restore terminal attributes"),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryDevice, cooked_attributes};

    fn raw_all() -> Attributes {
        cooked_attributes().to_raw(RawAdjust::all(), ReadTimeout::default())
    }

    // ── retry_interrupted ───────────────────────────────────────────

    #[test]
    fn interrupted_set_is_retried() {
        let mut calls = 0;
        let result = retry_interrupted(|| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from_raw_os_error(libc::EINTR))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn other_set_failures_are_not_retried() {
        let mut calls = 0;
        let err = retry_interrupted(|| {
            calls += 1;
            Err(io::Error::from_raw_os_error(libc::EIO))
        })
        .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EIO));
        assert_eq!(calls, 1);
    }

    // ── ReadTimeout ─────────────────────────────────────────────────

    #[test]
    fn timeout_default_is_one_tenth() {
        assert_eq!(ReadTimeout::default().tenths(), 1);
    }

    #[test]
    fn timeout_rejects_zero() {
        assert!(ReadTimeout::from_tenths(0).is_none());
        assert_eq!(ReadTimeout::from_tenths(5).map(ReadTimeout::tenths), Some(5));
    }

    // ── to_raw ──────────────────────────────────────────────────────

    #[test]
    fn raw_clears_input_flags() {
        let raw = raw_all();
        for flag in [libc::IXON, libc::ICRNL, libc::BRKINT, libc::INPCK, libc::ISTRIP] {
            assert_eq!(raw.input_flags() & flag, 0, "iflag {flag:#o} still set");
        }
    }

    #[test]
    fn raw_disables_output_processing() {
        assert_eq!(raw_all().output_flags() & libc::OPOST, 0);
    }

    #[test]
    fn raw_clears_local_flags() {
        let raw = raw_all();
        for flag in [libc::ECHO, libc::ICANON, libc::ISIG, libc::IEXTEN] {
            assert_eq!(raw.local_flags() & flag, 0, "lflag {flag:#o} still set");
        }
    }

    #[test]
    fn raw_sets_eight_bit_chars() {
        assert_eq!(raw_all().control_flags() & libc::CSIZE, libc::CS8);
    }

    #[test]
    fn raw_sets_read_timing() {
        let raw = cooked_attributes().to_raw(
            RawAdjust::all(),
            ReadTimeout::from_tenths(3).unwrap(),
        );
        assert_eq!(raw.min_bytes(), 0);
        assert_eq!(raw.read_timeout(), 3);
    }

    #[test]
    fn raw_leaves_unrelated_bits_alone() {
        let cooked = cooked_attributes();
        let raw = raw_all();
        assert_eq!(
            raw.input_flags() & libc::IMAXBEL,
            cooked.input_flags() & libc::IMAXBEL
        );
        assert_eq!(
            raw.local_flags() & libc::ECHOE,
            cooked.local_flags() & libc::ECHOE
        );
    }

    #[test]
    fn partial_adjust_only_touches_named_flags() {
        let raw = cooked_attributes().to_raw(RawAdjust::ECHO, ReadTimeout::default());
        assert_eq!(raw.local_flags() & libc::ECHO, 0);
        assert_ne!(raw.local_flags() & libc::ICANON, 0);
        assert_ne!(raw.input_flags() & libc::IXON, 0);
        assert_ne!(raw.output_flags() & libc::OPOST, 0);
    }

    #[test]
    fn to_raw_does_not_mutate_source() {
        let cooked = cooked_attributes();
        let before = cooked;
        let _ = cooked.to_raw(RawAdjust::all(), ReadTimeout::default());
        assert_eq!(cooked, before);
    }

    #[test]
    fn attributes_debug_shows_timing() {
        let s = format!("{:?}", raw_all());
        assert!(s.contains("vmin: 0"), "{s}");
        assert!(s.contains("vtime: 1"), "{s}");
    }

    // ── probe ───────────────────────────────────────────────────────

    #[test]
    fn probe_reports_device_size() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 });
        assert_eq!(probe(&device).unwrap(), Size { cols: 80, rows: 24 });
    }

    #[test]
    fn probe_rejects_zero_columns() {
        let device = MemoryDevice::new(Size { cols: 0, rows: 24 });
        let err = probe(&device).unwrap_err();
        assert!(matches!(err, Error::Geometry { .. }), "{err:?}");
    }

    #[test]
    fn probe_propagates_query_failure() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 }).fail_window_size();
        assert!(matches!(probe(&device), Err(Error::Geometry { .. })));
    }

    #[test]
    fn stdio_probe_does_not_panic() {
        // Under `cargo test` stdout is usually not a TTY; either outcome is fine.
        let _ = probe(&Stdio);
    }

    // ── RawMode ─────────────────────────────────────────────────────

    #[test]
    fn enter_applies_raw_attributes() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 });
        let raw = RawMode::enter(&device, ReadTimeout::default()).unwrap();
        assert_eq!(device.current(), raw_all());
        assert_eq!(*raw.original(), cooked_attributes());
        raw.restore().unwrap();
    }

    #[test]
    fn restore_puts_original_back() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 });
        let raw = RawMode::enter(&device, ReadTimeout::default()).unwrap();
        raw.restore().unwrap();
        assert_eq!(device.current(), cooked_attributes());
        assert_eq!(device.set_calls(), 2);
    }

    #[test]
    fn drop_restores() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 });
        {
            let _raw = RawMode::enter(&device, ReadTimeout::default()).unwrap();
            assert_eq!(device.current().local_flags() & libc::ECHO, 0);
        }
        assert_eq!(device.current(), cooked_attributes());
    }

    #[test]
    fn restore_then_drop_restores_once() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 });
        let raw = RawMode::enter(&device, ReadTimeout::default()).unwrap();
        raw.restore().unwrap();
        // enter + restore; the drop inside `restore` must not set again.
        assert_eq!(device.set_calls(), 2);
    }

    #[test]
    fn enter_fails_when_get_fails() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 }).fail_get();
        let err = RawMode::enter(&device, ReadTimeout::default()).err().unwrap();
        assert_eq!(err.op(), "tcgetattr");
        assert_eq!(device.set_calls(), 0);
    }

    #[test]
    fn enter_fails_when_set_fails() {
        let device = MemoryDevice::new(Size { cols: 80, rows: 24 }).fail_set();
        let err = RawMode::enter(&device, ReadTimeout::default()).err().unwrap();
        assert_eq!(err.op(), "tcsetattr");
        assert_eq!(device.current(), cooked_attributes());
    }
}
