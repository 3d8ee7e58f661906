// SPDX-License-Identifier: MIT
//
// Error kinds for terminal control.
//
// Three kinds, one per failing surface: the attribute channel (tcgetattr /
// tcsetattr), the geometry query (TIOCGWINSZ), and plain byte I/O on
// stdin/stdout. Every variant names the operation that failed so the
// binary can print a perror-style `op: reason` line and exit.
//
// Recoverable conditions (read timeouts, EINTR) never become an `Error`;
// the reader retries those itself.
//
// The OS error is part of the message rather than a `source()`: the
// binary prints the whole chain, and `op: reason` once is the goal.

use std::io;

use thiserror::Error;

/// Result alias for terminal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A fatal terminal failure.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing terminal attributes failed.
    #[error("{op}: {cause}")]
    Terminal { op: &'static str, cause: io::Error },

    /// The window-size query failed or reported an unusable geometry.
    #[error("{op}: {reason}")]
    Geometry { op: &'static str, reason: String },

    /// An unrecoverable read from stdin or write to stdout.
    #[error("{op}: {cause}")]
    Io { op: &'static str, cause: io::Error },
}

impl Error {
    /// Attribute-channel failure, capturing `errno`.
    #[must_use]
    pub fn terminal(op: &'static str) -> Self {
        Self::Terminal {
            op,
            cause: io::Error::last_os_error(),
        }
    }

    /// Stream failure with an explicit cause.
    #[must_use]
    pub const fn io(op: &'static str, cause: io::Error) -> Self {
        Self::Io { op, cause }
    }

    /// The operation that failed (`"tcsetattr"`, `"read"`, ...).
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Terminal { op, .. } | Self::Geometry { op, .. } | Self::Io { op, .. } => *op,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
