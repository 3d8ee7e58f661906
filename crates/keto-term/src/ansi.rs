// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when to emit — that's the `Screen`'s job. This module
// just knows the byte-level encoding of the handful of VT100 commands a
// full-redraw screen needs.
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to `OutputBuffer` (backed by a Vec).
use std::io::{self, Write};

/// Erase the whole display (ED 2). Does not move the cursor.
pub const CLEAR_SCREEN: &[u8] = b"\x1b[2J";

/// Cursor to row 1, column 1 (CUP with no parameters).
pub const CURSOR_HOME: &[u8] = b"\x1b[H";

/// Line terminator for raw mode. With `OPOST` off the terminal does not
/// turn `\n` into `\r\n`, so both bytes go out explicitly.
pub const CRLF: &[u8] = b"\r\n";

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CLEAR_SCREEN)
}

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to the top-left cell.
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CURSOR_HOME)
}

// ─── Lines ───────────────────────────────────────────────────────────────────

/// End the current line: carriage return, then line feed.
#[inline]
pub fn crlf(w: &mut impl Write) -> io::Result<()> {
    w.write_all(CRLF)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
