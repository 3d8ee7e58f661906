// SPDX-License-Identifier: MIT
//
// Full-screen redraw.
//
// Every frame is drawn from scratch: clear, home, one placeholder glyph per
// row, home again. There is nothing to diff against (no document, no cells)
// so the output for a given row count is always the same bytes, and drawing
// twice is indistinguishable from drawing once.
//
// Output processing is off in raw mode, so rows end in an explicit "\r\n".

use std::io::{self, Write};

use tracing::trace;

use crate::ansi;
use crate::error::{Error, Result};
use crate::output::OutputBuffer;

/// Glyph drawn at the start of each empty row.
pub const DEFAULT_PLACEHOLDER: u8 = b'~';

/// The screen renderer.
pub struct Screen {
    placeholder: u8,
    buf: OutputBuffer,
}

impl Screen {
    /// A renderer that draws `~` on each row.
    #[must_use]
    pub fn new() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER,
            buf: OutputBuffer::new(),
        }
    }

    /// A renderer with a custom row glyph.
    ///
    /// Returns `None` unless `glyph` is printable ASCII (`!` through `~`).
    /// Anything else is either invisible or a control byte.
    #[must_use]
    pub fn with_placeholder(glyph: u8) -> Option<Self> {
        glyph.is_ascii_graphic().then(|| Self {
            placeholder: glyph,
            buf: OutputBuffer::new(),
        })
    }

    /// The row glyph.
    #[inline]
    #[must_use]
    pub const fn placeholder(&self) -> u8 {
        self.placeholder
    }

    /// Redraw the whole screen with `rows` placeholder lines and park the
    /// cursor at the top-left.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if writing the frame to `out` fails.
    pub fn refresh(&mut self, out: &mut impl Write, rows: u16) -> Result<()> {
        self.compose(rows)
            .and_then(|()| self.buf.flush_to(out))
            .map_err(|e| Error::io("write", e))?;
        trace!(rows, "frame drawn");
        Ok(())
    }

    /// Clear the screen and home the cursor, leaving nothing drawn.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the write fails.
    pub fn clear(&mut self, out: &mut impl Write) -> Result<()> {
        ansi::clear_screen(&mut self.buf)
            .and_then(|()| ansi::cursor_home(&mut self.buf))
            .and_then(|()| self.buf.flush_to(out))
            .map_err(|e| Error::io("write", e))
    }

    fn compose(&mut self, rows: u16) -> io::Result<()> {
        self.buf.clear();
        ansi::clear_screen(&mut self.buf)?;
        ansi::cursor_home(&mut self.buf)?;
        for _ in 0..rows {
            self.buf.write_all(&[self.placeholder])?;
            ansi::crlf(&mut self.buf)?;
        }
        ansi::cursor_home(&mut self.buf)
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
