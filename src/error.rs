use std::path::PathBuf;

use agent_provider::RunId;
use thiserror::Error;

use crate::core::history::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Navigation or replacement on an empty history. Indicates a caller bug.
    #[error("{operation} requires a non-empty exchange history")]
    InvalidState { operation: &'static str },

    /// Navigation past the first or last exchange.
    #[error("cannot navigate {direction} from exchange {cursor} of {len}")]
    OutOfRange {
        direction: Direction,
        cursor: usize,
        len: usize,
    },
}

impl HistoryError {
    #[must_use]
    pub fn invalid_state(operation: &'static str) -> Self {
        Self::InvalidState { operation }
    }
}

/// Failure surfaced by the backend for one run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend run {run_id} failed: {message}")]
pub struct BackendError {
    pub run_id: RunId,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(run_id: RunId, message: impl Into<String>) -> Self {
        Self {
            run_id,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to read context '{id}' at {path}: {source}")]
    Io {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("context id must not be empty")]
    EmptyId,
}

impl ContextError {
    #[must_use]
    pub fn io(id: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            id: id.into(),
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// A question was submitted while another request is still in flight.
    #[error("request {run_id} is still in flight; cancel it or wait for it to finish")]
    ConcurrentRequest { run_id: RunId },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("failed to spawn backend worker for run {run_id}: {source}")]
    WorkerSpawn {
        run_id: RunId,
        #[source]
        source: std::io::Error,
    },
}
