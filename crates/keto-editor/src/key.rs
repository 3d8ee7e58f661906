// SPDX-License-Identifier: MIT
//
// Key bytes and what they do.
//
// Holding Ctrl while pressing a letter sends the letter's code with its
// top three bits cleared: `q` (0x71) becomes 0x11, and so does `Q` (0x51).
// That is the whole of key decoding here. There is exactly one command,
// quit, and every other byte is deliberately ignored; there is no cursor,
// no document and no resize handling to route keys to.

/// The byte sent for Ctrl+`letter`.
#[inline]
#[must_use]
pub const fn ctrl_key(letter: u8) -> u8 {
    letter & 0x1f
}

/// Ctrl+Q, the default quit key.
pub const CTRL_Q: u8 = ctrl_key(b'q');

/// What a keypress asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// End the session.
    Quit,
    /// Nothing. Unrecognized keys have no effect.
    Ignore,
}

/// Byte → command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keymap {
    quit: u8,
}

impl Keymap {
    /// Quit on Ctrl+`letter`.
    ///
    /// Returns `None` unless `letter` is an ASCII letter; Ctrl+digit and
    /// Ctrl+punctuation are not consistent across terminals.
    #[must_use]
    pub const fn with_quit_letter(letter: u8) -> Option<Self> {
        if letter.is_ascii_alphabetic() {
            Some(Self {
                quit: ctrl_key(letter),
            })
        } else {
            None
        }
    }

    /// The byte that quits.
    #[inline]
    #[must_use]
    pub const fn quit_key(&self) -> u8 {
        self.quit
    }

    /// Map a key byte to its command.
    #[must_use]
    pub const fn dispatch(&self, key: u8) -> Command {
        if key == self.quit {
            Command::Quit
        } else {
            Command::Ignore
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self { quit: CTRL_Q }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
