//! Minimal backend contract for streaming one answer into a conversation.
//!
//! This crate defines the run lifecycle shared by the session engine and
//! concrete backends: what a backend receives (replayed history plus resolved
//! context), what it emits (fragments terminated by exactly one terminal
//! event), and how cancellation is observed. Transport, authentication and
//! prompt construction live elsewhere.

use std::fmt;
use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};

/// Identifier for one backend run.
pub type RunId = u64;

/// Shared cancellation flag for a run. Backends poll it between fragments.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a backend before any run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

/// One replayed conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RunMessage {
    UserText { text: String },
    AssistantText { text: String },
}

impl RunMessage {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::UserText { text } | Self::AssistantText { text } => text,
        }
    }
}

/// A contextual resource already resolved to its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub id: String,
    pub content: String,
}

impl ContextDocument {
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Input required to start a backend run.
///
/// `messages` holds the replayed history window followed by the new question,
/// when the run answers one. System-initiated runs end with an assistant turn
/// or carry no messages at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub messages: Vec<RunMessage>,
    pub context: Vec<ContextDocument>,
}

impl RunRequest {
    /// Returns the question this run answers, if the last message is a user turn.
    #[must_use]
    pub fn question(&self) -> Option<&str> {
        match self.messages.last() {
            Some(RunMessage::UserText { text }) => Some(text),
            _ => None,
        }
    }
}

/// Backend-emitted lifecycle event for a run.
///
/// A well-behaved backend emits `Started`, any number of `Chunk`s, then
/// exactly one of `Finished`, `Failed` or `Cancelled`. `Finished` may carry the
/// full answer when the backend does not stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Started {
        run_id: RunId,
    },
    Chunk {
        run_id: RunId,
        text: String,
    },
    Finished {
        run_id: RunId,
        final_text: Option<String>,
    },
    Failed {
        run_id: RunId,
        error: String,
    },
    Cancelled {
        run_id: RunId,
    },
}

impl RunEvent {
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Started { run_id }
            | Self::Chunk { run_id, .. }
            | Self::Finished { run_id, .. }
            | Self::Failed { run_id, .. }
            | Self::Cancelled { run_id } => *run_id,
        }
    }

    /// Returns true when this event terminates the run lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Immutable metadata describing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Backend interface for producing one streamed answer.
pub trait RunProvider: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    /// Executes a run and emits lifecycle events in backend order.
    ///
    /// Runs on a worker thread owned by the caller. Returning `Err` without
    /// having emitted a terminal event is reported as a failed run.
    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String>;
}
