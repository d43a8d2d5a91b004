use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use agent_provider::{CancelSignal, ProviderProfile, RunEvent, RunId, RunProvider, RunRequest};

use crate::context::ContextProvider;
use crate::core::history::Exchange;
use crate::error::{HistoryError, SessionError};
use crate::runtime::delivery::lock_unpoisoned;
use crate::runtime::session::{PendingRun, RunOutcome, Session, Submission};

/// How long shutdown lets the block being rendered finish before tearing
/// down delivery.
const SHUTDOWN_RENDER_WAIT: Duration = Duration::from_secs(1);

struct ActiveWorker {
    run_id: RunId,
    join_handle: JoinHandle<()>,
}

/// Drives a [`Session`] with a [`RunProvider`].
///
/// Each accepted submission runs the provider on its own named worker thread.
/// Provider events are applied to the session as they arrive; the session's
/// delivery queue moves completed blocks to the renderer. Callers that need
/// to block until the run ends use [`SessionController::wait_until_idle`].
pub struct SessionController {
    session: Mutex<Session>,
    idle: Condvar,
    provider: Arc<dyn RunProvider>,
    context: Arc<dyn ContextProvider>,
    worker: Mutex<Option<ActiveWorker>>,
}

impl SessionController {
    pub fn new(
        session: Session,
        provider: Arc<dyn RunProvider>,
        context: Arc<dyn ContextProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(session),
            idle: Condvar::new(),
            provider,
            context,
            worker: Mutex::new(None),
        })
    }

    pub fn provider_profile(&self) -> ProviderProfile {
        self.provider.profile()
    }

    /// Submits a user question with the given context ids.
    pub fn submit(
        self: &Arc<Self>,
        question: impl Into<String>,
        context_ids: &[String],
    ) -> Result<RunId, SessionError> {
        self.start(Some(question.into()), context_ids, false)
    }

    /// Submits a system-initiated request (no user question).
    pub fn submit_system(self: &Arc<Self>, context_ids: &[String]) -> Result<RunId, SessionError> {
        self.start(None, context_ids, false)
    }

    /// Re-asks the exchange at the cursor and replaces it with the new answer.
    pub fn regenerate(self: &Arc<Self>) -> Result<RunId, SessionError> {
        let (question, context_ids) = {
            let session = self.lock_session();
            if let Some(run_id) = session.active_run_id() {
                return Err(SessionError::ConcurrentRequest { run_id });
            }

            let exchange = session
                .history()
                .current()
                .ok_or(HistoryError::invalid_state("regenerate"))?;
            (
                exchange.question().map(str::to_string),
                exchange.context_refs().iter().cloned().collect::<Vec<_>>(),
            )
        };

        self.start(question, &context_ids, true)
    }

    fn start(
        self: &Arc<Self>,
        question: Option<String>,
        context_ids: &[String],
        regenerate: bool,
    ) -> Result<RunId, SessionError> {
        if let Some(run_id) = self.lock_session().active_run_id() {
            return Err(SessionError::ConcurrentRequest { run_id });
        }

        let context = self.context.resolve(context_ids)?;
        let PendingRun { request, cancel } = self.lock_session().submit(Submission {
            question,
            context,
            regenerate,
        })?;
        let run_id = request.run_id;

        self.reap_worker();
        match self.spawn_worker(request, cancel) {
            Ok(join_handle) => {
                *lock_unpoisoned(&self.worker) = Some(ActiveWorker {
                    run_id,
                    join_handle,
                });
                Ok(run_id)
            }
            Err(source) => {
                self.lock_session().cancel();
                self.idle.notify_all();
                Err(SessionError::WorkerSpawn { run_id, source })
            }
        }
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: RunRequest,
        cancel: CancelSignal,
    ) -> std::io::Result<JoinHandle<()>> {
        let run_id = request.run_id;
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(format!("answer-stream-run-{run_id}"))
            .spawn(move || controller.run_worker(request, cancel))
    }

    fn run_worker(self: Arc<Self>, request: RunRequest, cancel: CancelSignal) {
        let run_id = request.run_id;
        let provider = Arc::clone(&self.provider);
        let mut terminal_emitted = false;

        let run_outcome = {
            let mut emit = |event: RunEvent| {
                if event.is_terminal() {
                    terminal_emitted = true;
                }
                self.apply_event(event);
            };
            catch_unwind(AssertUnwindSafe(|| provider.run(request, cancel, &mut emit)))
        };

        let failure = match run_outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(_) => Some("Backend panicked".to_string()),
        };

        match failure {
            Some(error) if !terminal_emitted => {
                self.apply_event(RunEvent::Failed { run_id, error });
            }
            Some(error) => {
                tracing::debug!(
                    run_id,
                    %error,
                    "backend reported an error after its terminal event"
                );
            }
            None if !terminal_emitted => {
                self.apply_event(RunEvent::Failed {
                    run_id,
                    error: "Backend exited without terminal event".to_string(),
                });
            }
            None => {}
        }
    }

    fn apply_event(&self, event: RunEvent) {
        let outcome: Option<RunOutcome> = self.lock_session().apply_run_event(event);
        if outcome.is_some() {
            self.idle.notify_all();
        }
    }

    fn reap_worker(&self) {
        let Some(previous) = lock_unpoisoned(&self.worker).take() else {
            return;
        };

        if previous.join_handle.is_finished() {
            let _ = previous.join_handle.join();
        } else {
            tracing::debug!(
                run_id = previous.run_id,
                "previous backend worker still winding down; detaching"
            );
        }
    }

    /// Cancels the in-flight request. A no-op returning `None` while idle.
    pub fn cancel(&self) -> Option<RunId> {
        let cancelled = self.lock_session().cancel();
        if cancelled.is_some() {
            self.idle.notify_all();
        }
        cancelled
    }

    pub fn navigate_previous(&self) -> Result<Exchange, HistoryError> {
        self.lock_session().navigate_previous().cloned()
    }

    pub fn navigate_next(&self) -> Result<Exchange, HistoryError> {
        self.lock_session().navigate_next().cloned()
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.lock_session())
    }

    /// Blocks until no request is in flight. Returns false on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let session = self.lock_session();
        match self
            .idle
            .wait_timeout_while(session, timeout, |session| !session.is_idle())
        {
            Ok((_, result)) => !result.timed_out(),
            Err(poisoned) => !poisoned.into_inner().1.timed_out(),
        }
    }

    /// Blocks until every delivered block has been rendered. Returns false on
    /// timeout. The session stays unlocked while waiting.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let drain = self.lock_session().delivery().drain_handle();
        drain.wait_until_drained(timeout)
    }

    /// Cancels any in-flight request, joins the backend worker and stops
    /// delivery.
    pub fn shutdown(&self) {
        self.cancel();

        if let Some(worker) = lock_unpoisoned(&self.worker).take() {
            if worker.join_handle.thread().id() != thread::current().id() {
                let _ = worker.join_handle.join();
            }
        }

        // Renderers may call back into the controller, so the block in progress
        // finishes without the session locked before the queue is joined.
        let drain = {
            let session = self.lock_session();
            session.delivery().stop();
            session.delivery().drain_handle()
        };
        if !drain.wait_until_drained(SHUTDOWN_RENDER_WAIT) {
            tracing::warn!("renderer still busy at shutdown");
        }

        self.lock_session().shutdown();
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        lock_unpoisoned(&self.session)
    }
}
