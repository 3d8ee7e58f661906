// SPDX-License-Identifier: MIT
//
// Configuration file.
//
// `~/.keto/config.toml`, every key optional:
//
//   read_timeout = 1        # tenths of a second a read waits for a key
//   quit_key = "q"          # Ctrl+<letter> ends the session
//   placeholder = "~"       # glyph drawn on each empty row
//   log_file = "/tmp/keto.log"
//
// An explicit `--config` path must exist. The default path is optional:
// missing means defaults. Values are checked here, before the terminal is
// touched, so a bad config never leaves a half-initialized screen.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use keto_editor::key::Keymap;
use keto_term::screen::Screen;
use keto_term::terminal::ReadTimeout;
use serde::Deserialize;

/// Settings loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Raw-mode read timeout in tenths of a second (1..=255).
    pub read_timeout: u8,
    /// Letter whose Ctrl chord quits.
    pub quit_key: char,
    /// Row placeholder glyph (printable ASCII).
    pub placeholder: char,
    /// Where tracing output goes. Defaults to `~/.keto/keto.log`.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_timeout: 1,
            quit_key: 'q',
            placeholder: '~',
            log_file: None,
        }
    }
}

impl Config {
    /// Load from `explicit` if given, else from the default path if it
    /// exists, else defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed file, or an out-of-range value.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => match default_dir().map(|d| d.join("config.toml")) {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it.
    ///
    /// # Errors
    ///
    /// The file cannot be read or is not valid TOML for [`Config`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Check every value converts to its runtime type.
    ///
    /// # Errors
    ///
    /// Names the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.timeout()?;
        self.keymap()?;
        self.screen()?;
        Ok(())
    }

    /// # Errors
    ///
    /// `read_timeout` is zero.
    pub fn timeout(&self) -> Result<ReadTimeout> {
        match ReadTimeout::from_tenths(self.read_timeout) {
            Some(t) => Ok(t),
            None => bail!("read_timeout must be between 1 and 255 tenths of a second"),
        }
    }

    /// # Errors
    ///
    /// `quit_key` is not an ASCII letter.
    pub fn keymap(&self) -> Result<Keymap> {
        u8::try_from(self.quit_key)
            .ok()
            .and_then(Keymap::with_quit_letter)
            .with_context(|| format!("quit_key must be an ASCII letter, got {:?}", self.quit_key))
    }

    /// # Errors
    ///
    /// `placeholder` is not printable ASCII.
    pub fn screen(&self) -> Result<Screen> {
        u8::try_from(self.placeholder)
            .ok()
            .and_then(Screen::with_placeholder)
            .with_context(|| {
                format!(
                    "placeholder must be a printable ASCII character, got {:?}",
                    self.placeholder
                )
            })
    }

    /// The configured log file, or `~/.keto/keto.log`.
    #[must_use]
    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| default_dir().map(|d| d.join("keto.log")))
    }
}

/// `~/.keto`.
fn default_dir() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".keto"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
