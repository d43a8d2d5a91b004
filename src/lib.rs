//! Streaming answer pipeline and conversation session engine.
//!
//! Answer text arrives from a backend as arbitrary fragments. The
//! [`BlockSegmenter`] turns it into prose and fenced-code [`Block`]s as soon as
//! each block is complete, the [`DeliveryQueue`] hands blocks to a renderer
//! strictly in order, and the [`Session`] records finished answers in an
//! [`ExchangeHistory`] the user can navigate and branch from.
//!
//! # Public API Overview
//! - Drive a backend end to end with [`SessionController`].
//! - Apply backend events by hand with [`Session`] (tests, custom drivers).
//! - Segment complete or streamed text with [`BlockSegmenter`].
//! - Resolve attached context with a [`ContextProvider`].

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod logging;
pub mod runtime;

pub use crate::config::EnvConfig;
pub use crate::context::{ContextProvider, FileContextProvider, NoContext};
pub use crate::core::block::{Block, BlockKind, GENERIC_CODE_TAG};
pub use crate::core::history::{Direction, Exchange, ExchangeHistory, HistoryWindow};
pub use crate::core::segmenter::{BlockSegmenter, StreamState};
pub use crate::error::{BackendError, ContextError, HistoryError, SessionError};
pub use crate::runtime::{
    BlockRenderer, DeliveryQueue, DrainHandle, ErrorReporter, NoopUsageSink, PendingRun,
    RunOutcome, Session, SessionConfig, SessionController, SessionState, Submission,
    TracingErrorReporter, UsageSink,
};

/// Backend contract types, re-exported for convenience.
pub use agent_provider::{
    CancelSignal, ContextDocument, ProviderProfile, RunEvent, RunId, RunMessage, RunProvider,
    RunRequest,
};
