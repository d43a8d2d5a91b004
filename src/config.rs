//! Environment configuration.

use std::env;

use crate::context::DEFAULT_CONTEXT_MAX_BYTES;
use crate::core::history::HistoryWindow;

pub const HISTORY_WINDOW_ENV: &str = "ANSWER_STREAM_HISTORY_WINDOW";
pub const LOG_FILTER_ENV: &str = "ANSWER_STREAM_LOG";
pub const LOG_FILE_ENV: &str = "ANSWER_STREAM_LOG_FILE";
pub const CONTEXT_MAX_BYTES_ENV: &str = "ANSWER_STREAM_CONTEXT_MAX_BYTES";
pub const PROVIDER_ENV: &str = "ANSWER_STREAM_PROVIDER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub history_window: HistoryWindow,
    pub log_filter: Option<String>,
    pub log_file: Option<String>,
    pub context_max_bytes: usize,
    pub provider: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            history_window: HistoryWindow::default(),
            log_filter: None,
            log_file: None,
            context_max_bytes: DEFAULT_CONTEXT_MAX_BYTES,
            provider: None,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            history_window: env_parse_or(HISTORY_WINDOW_ENV, defaults.history_window),
            log_filter: env_string_opt(LOG_FILTER_ENV),
            log_file: env_string_opt(LOG_FILE_ENV),
            context_max_bytes: env_parse_or(CONTEXT_MAX_BYTES_ENV, defaults.context_max_bytes),
            provider: env_string_opt(PROVIDER_ENV),
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

// Logging may not be installed yet, so invalid values go to stderr directly.
fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = env_string_opt(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(error) => {
            eprintln!("warning: ignoring {key}={raw:?}: {error}");
            default
        }
    }
}
