//! Fire-and-forget observers notified at terminal transitions.

use std::panic::{catch_unwind, AssertUnwindSafe};

use agent_provider::RunId;

use crate::error::BackendError;

/// Receives the final answer text of every completed run, for usage accounting.
pub trait UsageSink: Send + Sync {
    fn record_answer(&self, run_id: RunId, answer_text: &str);
}

/// Receives raw backend failures for user-facing diagnostics (for example a
/// prompt for new credentials), separate from the in-conversation error block.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &BackendError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn record_answer(&self, _run_id: RunId, _answer_text: &str) {}
}

/// Logs backend failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &BackendError) {
        tracing::warn!(run_id = error.run_id, error = %error.message, "backend run failed");
    }
}

/// Invokes an observer, containing any panic so session state is unaffected.
pub(crate) fn notify(observer: &'static str, run_id: RunId, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(run_id, observer, "observer panicked; ignoring");
    }
}
