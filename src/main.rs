// SPDX-License-Identifier: MIT
//
// keto — a raw-mode terminal screen.
//
// This is the main binary that wires together the crates:
//
//   keto-term   → raw mode, geometry, key reading, full-screen redraw
//   keto-editor → the session loop and the quit decision
//
// It parses the command line, loads the config, points tracing at a log
// file (stdout belongs to the screen), runs either the editor session or
// the key inspector, and maps the result to an exit status:
//
//   0          quit key
//   1          fatal error (config, terminal, geometry, I/O)
//   2          bad command line
//   128 + n    terminated by signal n
//
// Errors are printed after the session has restored the terminal, so they
// land on a cooked-mode screen.

mod config;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Result;
use keto_editor::inspect::KeyInspector;
use keto_editor::session::{EditorSession, ExitReason};
use keto_term::reader::StdinFd;
use keto_term::signal;
use keto_term::terminal::Stdio;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "KETO_LOG";

// ─── Command line ───────────────────────────────────────────────────────────

/// Which loop to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Editor,
    Inspect,
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    mode: Mode,
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Cli {
    Run(Args),
    Help,
    Version,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> std::result::Result<Cli, String> {
    let mut parsed = Args {
        mode: Mode::Editor,
        config: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Cli::Help),
            "-V" | "--version" => return Ok(Cli::Version),
            "-k" | "--keys" => parsed.mode = Mode::Inspect,
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| format!("{arg} requires a path"))?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Cli::Run(parsed))
}

fn print_help() {
    eprintln!("keto {VERSION} - raw-mode terminal screen");
    eprintln!();
    eprintln!("Usage: keto [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -k, --keys            Print the code of each key pressed (q quits)");
    eprintln!("  -c, --config <PATH>   Read settings from PATH");
    eprintln!("  -V, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  Ctrl+Q                Quit (see quit_key in the config)");
    eprintln!();
    eprintln!("Configuration: ~/.keto/config.toml");
    eprintln!("Logging:       ~/.keto/keto.log, filter with {LOG_ENV}=debug");
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Send tracing output to `path`. Without a writable log file the program
/// runs with no subscriber at all.
fn init_logging(path: &Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let Ok(file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

// ─── Run ────────────────────────────────────────────────────────────────────

fn exit_status(reason: ExitReason) -> u8 {
    match reason {
        ExitReason::Quit => 0,
        ExitReason::Signal(sig) => u8::try_from(128 + sig).unwrap_or(1),
    }
}

fn run(args: &Args) -> Result<u8> {
    let config = Config::load(args.config.as_deref())?;
    if let Some(path) = config.log_path() {
        init_logging(&path);
    }
    info!(version = VERSION, mode = ?args.mode, "keto starting");

    let timeout = config.timeout()?;
    signal::install();

    let reason = match args.mode {
        Mode::Editor => {
            EditorSession::new(&Stdio, StdinFd, io::stdout())
                .with_read_timeout(timeout)
                .with_keymap(config.keymap()?)
                .with_screen(config.screen()?)
                .run()?
                .reason
        }
        Mode::Inspect => KeyInspector::new(&Stdio, StdinFd, io::stdout())
            .with_read_timeout(timeout)
            .run()?,
    };

    info!(?reason, "keto exiting");
    Ok(exit_status(reason))
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(Cli::Run(args)) => args,
        Ok(Cli::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Cli::Version) => {
            eprintln!("keto {VERSION}");
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("keto: {msg}");
            eprintln!("Try 'keto --help' for more information.");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("keto: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
