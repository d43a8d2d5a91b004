//! `tracing` subscriber installation.
//!
//! Logs go to stderr, or to `ANSWER_STREAM_LOG_FILE` without ANSI colors, so
//! rendered answers on stdout stay clean.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

pub const DEFAULT_LOG_FILTER: &str = "warn";
pub const VERBOSE_LOG_FILTER: &str = "answer_stream=debug,assistant_cli=debug";

/// Installs the global subscriber. Returns `Ok` if one is already installed.
pub fn init(config: &EnvConfig, verbose: bool) -> io::Result<()> {
    let filter = build_filter(config, verbose);

    match config.log_file.as_deref() {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
    }

    Ok(())
}

fn build_filter(config: &EnvConfig, verbose: bool) -> EnvFilter {
    let directives = match (config.log_filter.as_deref(), verbose) {
        (Some(directives), _) => directives,
        (None, true) => VERBOSE_LOG_FILTER,
        (None, false) => DEFAULT_LOG_FILTER,
    };

    EnvFilter::try_new(directives).unwrap_or_else(|error| {
        eprintln!("warning: invalid log filter {directives:?}: {error}");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}
