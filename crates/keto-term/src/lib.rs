// SPDX-License-Identifier: MIT
//
// keto-term — terminal control for keto.
//
// The smallest complete raw-mode toolkit: switch the terminal into raw
// mode and guarantee the switch back, ask it how big it is, read one byte
// at a time under a short timeout, and redraw the whole screen. POSIX
// termios only, straight through libc, no terminal abstraction layer.

pub mod ansi;
pub mod error;
pub mod output;
pub mod reader;
pub mod screen;
pub mod signal;
pub mod terminal;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
