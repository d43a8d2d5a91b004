//! Conversation session state machine.
//!
//! A [`Session`] owns the exchange history and at most one in-flight request.
//! Backend events are applied through the `on_run_*` handlers; events for a
//! run that is no longer in flight (cancelled, or superseded) are ignored.
//! History is only mutated at terminal transitions and at submit time
//! (truncation of an abandoned branch).

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_provider::{CancelSignal, ContextDocument, RunEvent, RunId, RunMessage, RunRequest};

use crate::core::block::Block;
use crate::core::history::{Exchange, ExchangeHistory, HistoryWindow};
use crate::core::segmenter::{BlockSegmenter, StreamState};
use crate::error::{BackendError, HistoryError, SessionError};
use crate::runtime::delivery::DeliveryQueue;
use crate::runtime::sinks::{notify, ErrorReporter, NoopUsageSink, TracingErrorReporter, UsageSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub history_window: HistoryWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InFlight { run_id: RunId },
}

/// Terminal outcome of a run. `recorded` is false when duplicate suppression
/// left the history untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { recorded: bool },
    Errored { recorded: bool },
    Cancelled,
}

/// What the caller asks the session to answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub question: Option<String>,
    pub context: Vec<ContextDocument>,
    pub regenerate: bool,
}

impl Submission {
    #[must_use]
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: Some(question.into()),
            ..Self::default()
        }
    }

    /// A system-initiated request with no user question, such as an initial
    /// explanation of the attached context.
    #[must_use]
    pub fn system() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context(mut self, context: Vec<ContextDocument>) -> Self {
        self.context = context;
        self
    }

    /// Marks the submission as a retry of the newest exchange.
    #[must_use]
    pub fn regenerating(mut self) -> Self {
        self.regenerate = true;
        self
    }
}

/// A run accepted by [`Session::submit`], ready to hand to a backend.
#[derive(Debug, Clone)]
pub struct PendingRun {
    pub request: RunRequest,
    pub cancel: CancelSignal,
}

#[derive(Debug)]
struct InFlight {
    run_id: RunId,
    cancel: CancelSignal,
    segmenter: BlockSegmenter,
    question: Option<String>,
    context_refs: BTreeSet<String>,
    replaces_last: bool,
    blocks: Vec<Block>,
    streamed: bool,
}

pub struct Session {
    history: ExchangeHistory,
    in_flight: Option<InFlight>,
    delivery: DeliveryQueue,
    usage: Arc<dyn UsageSink>,
    errors: Arc<dyn ErrorReporter>,
    config: SessionConfig,
    next_run_id: RunId,
}

impl Session {
    pub fn new(delivery: DeliveryQueue, config: SessionConfig) -> Self {
        Self {
            history: ExchangeHistory::new(),
            in_flight: None,
            delivery,
            usage: Arc::new(NoopUsageSink),
            errors: Arc::new(TracingErrorReporter),
            config,
            next_run_id: 1,
        }
    }

    #[must_use]
    pub fn with_usage_sink(mut self, usage: Arc<dyn UsageSink>) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn with_error_reporter(mut self, errors: Arc<dyn ErrorReporter>) -> Self {
        self.errors = errors;
        self
    }

    pub fn state(&self) -> SessionState {
        match &self.in_flight {
            Some(in_flight) => SessionState::InFlight {
                run_id: in_flight.run_id,
            },
            None => SessionState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn active_run_id(&self) -> Option<RunId> {
        self.in_flight.as_ref().map(|in_flight| in_flight.run_id)
    }

    /// Parser state of the in-flight request.
    pub fn stream_state(&self) -> Option<&StreamState> {
        self.in_flight
            .as_ref()
            .map(|in_flight| in_flight.segmenter.state())
    }

    pub fn history(&self) -> &ExchangeHistory {
        &self.history
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }

    pub fn navigate_previous(&mut self) -> Result<&Exchange, HistoryError> {
        self.history.navigate_previous()
    }

    pub fn navigate_next(&mut self) -> Result<&Exchange, HistoryError> {
        self.history.navigate_next()
    }

    /// Opens a new in-flight request.
    ///
    /// Fails fast with [`SessionError::ConcurrentRequest`] while another
    /// request is in flight. When the cursor is not on the newest exchange,
    /// everything after it is discarded first. A regeneration on a non-empty
    /// history replaces the newest exchange when it completes.
    pub fn submit(&mut self, submission: Submission) -> Result<PendingRun, SessionError> {
        if let Some(in_flight) = &self.in_flight {
            return Err(SessionError::ConcurrentRequest {
                run_id: in_flight.run_id,
            });
        }

        let removed = self.history.truncate_after_cursor();
        if removed > 0 {
            tracing::debug!(removed, "discarded exchanges after cursor");
        }

        let replaces_last = submission.regenerate && !self.history.is_empty();
        let run_id = self.next_run_id;
        self.next_run_id += 1;

        let messages = self.replay_messages(replaces_last, submission.question.as_deref());
        let context_refs = submission
            .context
            .iter()
            .map(|document| document.id.clone())
            .collect::<BTreeSet<_>>();
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));

        tracing::info!(
            run_id,
            regenerate = replaces_last,
            replayed = messages.len(),
            context = context_refs.len(),
            "request submitted"
        );

        self.in_flight = Some(InFlight {
            run_id,
            cancel: Arc::clone(&cancel),
            segmenter: BlockSegmenter::new(),
            question: submission.question,
            context_refs,
            replaces_last,
            blocks: Vec::new(),
            streamed: false,
        });

        Ok(PendingRun {
            request: RunRequest {
                run_id,
                messages,
                context: submission.context,
            },
            cancel,
        })
    }

    fn replay_messages(&self, replaces_last: bool, question: Option<&str>) -> Vec<RunMessage> {
        let window = match (self.config.history_window, replaces_last) {
            (HistoryWindow::Last(count), true) => HistoryWindow::Last(count.saturating_add(1)),
            (window, _) => window,
        };

        let mut exchanges = self.history.windowed(window);
        if replaces_last {
            if let Some((_, earlier)) = exchanges.split_last() {
                exchanges = earlier;
            }
        }

        let mut messages = Vec::with_capacity(exchanges.len() * 2 + 1);
        for exchange in exchanges {
            if let Some(question) = exchange.question() {
                messages.push(RunMessage::UserText {
                    text: question.to_string(),
                });
            }
            messages.push(RunMessage::AssistantText {
                text: exchange.answer_text(),
            });
        }

        if let Some(question) = question {
            messages.push(RunMessage::UserText {
                text: question.to_string(),
            });
        }

        messages
    }

    /// Applies one backend event. Returns the outcome when the event ended the
    /// in-flight run.
    pub fn apply_run_event(&mut self, event: RunEvent) -> Option<RunOutcome> {
        match event {
            RunEvent::Started { run_id } => {
                self.on_run_started(run_id);
                None
            }
            RunEvent::Chunk { run_id, text } => {
                self.on_run_chunk(run_id, &text);
                None
            }
            RunEvent::Finished { run_id, final_text } => self.on_run_finished(run_id, final_text),
            RunEvent::Failed { run_id, error } => self.on_run_failed(run_id, &error),
            RunEvent::Cancelled { run_id } => self.on_run_cancelled(run_id),
        }
    }

    pub fn on_run_started(&mut self, run_id: RunId) {
        if self.active_run_id() == Some(run_id) {
            tracing::debug!(run_id, "backend started streaming");
        } else {
            tracing::debug!(run_id, "ignoring start of stale run");
        }
    }

    /// Segments one fragment and enqueues every completed block. Returns the
    /// number of blocks delivered.
    pub fn on_run_chunk(&mut self, run_id: RunId, text: &str) -> usize {
        let Some(in_flight) = self
            .in_flight
            .as_mut()
            .filter(|in_flight| in_flight.run_id == run_id)
        else {
            tracing::trace!(run_id, "ignoring fragment of stale run");
            return 0;
        };

        if !text.is_empty() {
            in_flight.streamed = true;
        }

        let blocks = in_flight.segmenter.process_fragment(text);
        let delivered = blocks.len();
        for block in blocks {
            deliver(&self.delivery, &mut in_flight.blocks, block);
        }

        delivered
    }

    /// Completes the in-flight run and records its exchange.
    ///
    /// `final_text` is the aggregate answer of a non-streaming backend; it is
    /// segmented exactly as streamed fragments would be. When fragments were
    /// already streamed it is ignored.
    pub fn on_run_finished(
        &mut self,
        run_id: RunId,
        final_text: Option<String>,
    ) -> Option<RunOutcome> {
        let mut in_flight = self.take_in_flight(run_id)?;

        match final_text {
            Some(text) if !in_flight.streamed => {
                for block in in_flight.segmenter.process_fragment(&text) {
                    deliver(&self.delivery, &mut in_flight.blocks, block);
                }
            }
            Some(_) => {
                tracing::debug!(run_id, "ignoring aggregate text of a streamed answer");
            }
            None => {}
        }

        if let Some(block) = in_flight.segmenter.flush() {
            deliver(&self.delivery, &mut in_flight.blocks, block);
        }

        let exchange = Exchange::new(
            in_flight.question,
            in_flight.blocks,
            in_flight.context_refs,
        );
        let answer_text = exchange.answer_text();
        let usage = Arc::clone(&self.usage);
        notify("usage_sink", run_id, || usage.record_answer(run_id, &answer_text));

        let blocks = exchange.blocks().len();
        let recorded = self.record_exchange(run_id, exchange, in_flight.replaces_last);
        tracing::info!(run_id, blocks, recorded, "run completed");

        Some(RunOutcome::Completed { recorded })
    }

    /// Records a failed run as a visible exchange ending in one error block,
    /// and forwards the raw failure to the error reporter.
    pub fn on_run_failed(&mut self, run_id: RunId, error: &str) -> Option<RunOutcome> {
        let mut in_flight = self.take_in_flight(run_id)?;

        if let Some(block) = in_flight.segmenter.flush() {
            deliver(&self.delivery, &mut in_flight.blocks, block);
        }

        let error = BackendError::new(run_id, error);
        deliver(
            &self.delivery,
            &mut in_flight.blocks,
            Block::prose(format!("Error: {}", error.message)),
        );

        let errors = Arc::clone(&self.errors);
        notify("error_reporter", run_id, || errors.report(&error));

        let exchange = Exchange::new(
            in_flight.question,
            in_flight.blocks,
            in_flight.context_refs,
        );
        let recorded = self.record_exchange(run_id, exchange, in_flight.replaces_last);
        tracing::warn!(run_id, recorded, error = %error.message, "run failed");

        Some(RunOutcome::Errored { recorded })
    }

    /// The backend stopped on its own or acknowledged a cancel. Nothing is
    /// recorded.
    pub fn on_run_cancelled(&mut self, run_id: RunId) -> Option<RunOutcome> {
        let in_flight = self.take_in_flight(run_id)?;
        Self::abort(in_flight);
        Some(RunOutcome::Cancelled)
    }

    /// Cancels the in-flight request, if any, and returns its run id.
    ///
    /// The cancel flag is raised so the backend stops producing; partially
    /// built blocks are discarded and no exchange is recorded. Calling this
    /// while idle is a no-op.
    pub fn cancel(&mut self) -> Option<RunId> {
        let in_flight = self.in_flight.take()?;
        let run_id = in_flight.run_id;
        Self::abort(in_flight);
        Some(run_id)
    }

    /// Cancels any in-flight request and stops block delivery.
    pub fn shutdown(&mut self) {
        self.cancel();
        self.delivery.shutdown();
    }

    fn abort(mut in_flight: InFlight) {
        in_flight.cancel.store(true, Ordering::SeqCst);
        let discarded = in_flight.segmenter.flush().is_some();
        tracing::info!(
            run_id = in_flight.run_id,
            delivered = in_flight.blocks.len(),
            discarded,
            "run cancelled"
        );
    }

    fn take_in_flight(&mut self, run_id: RunId) -> Option<InFlight> {
        if self.active_run_id() != Some(run_id) {
            tracing::debug!(run_id, "ignoring terminal event of stale run");
            return None;
        }

        self.in_flight.take()
    }

    fn record_exchange(&mut self, run_id: RunId, exchange: Exchange, replaces_last: bool) -> bool {
        let duplicate = self
            .history
            .last()
            .is_some_and(|previous| previous.answer_text() == exchange.answer_text());
        if duplicate {
            tracing::info!(run_id, "answer repeats the previous exchange; history unchanged");
            return false;
        }

        if !replaces_last {
            self.history.append(exchange);
            return true;
        }

        match self.history.replace_last(exchange) {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(run_id, %error, "regenerated answer had nothing to replace");
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("history_len", &self.history.len())
            .field("cursor", &self.history.cursor())
            .field("config", &self.config)
            .finish()
    }
}

fn deliver(delivery: &DeliveryQueue, collected: &mut Vec<Block>, block: Block) {
    if !delivery.enqueue(block.clone()) {
        tracing::debug!("delivery queue is shut down; block kept in history only");
    }
    collected.push(block);
}
