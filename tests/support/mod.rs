#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use answer_stream::{
    BackendError, Block, DeliveryQueue, ErrorReporter, RunId, Session, SessionConfig, UsageSink,
};

pub const DEADLINE: Duration = Duration::from_secs(5);

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rendered(Arc<Mutex<Vec<Block>>>);

impl Rendered {
    pub fn blocks(&self) -> Vec<Block> {
        lock_unpoisoned(&self.0).clone()
    }
}

pub fn recording_queue() -> (DeliveryQueue, Rendered) {
    let rendered = Rendered::default();
    let sink = Arc::clone(&rendered.0);
    let queue = DeliveryQueue::spawn(move |block: Block| lock_unpoisoned(&sink).push(block))
        .expect("delivery thread should spawn");
    (queue, rendered)
}

#[derive(Debug, Default)]
pub struct RecordingUsage {
    answers: Mutex<Vec<(RunId, String)>>,
}

impl RecordingUsage {
    pub fn answers(&self) -> Vec<(RunId, String)> {
        lock_unpoisoned(&self.answers).clone()
    }
}

impl UsageSink for RecordingUsage {
    fn record_answer(&self, run_id: RunId, answer_text: &str) {
        lock_unpoisoned(&self.answers).push((run_id, answer_text.to_string()));
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<BackendError>>,
}

impl RecordingReporter {
    pub fn errors(&self) -> Vec<BackendError> {
        lock_unpoisoned(&self.errors).clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &BackendError) {
        lock_unpoisoned(&self.errors).push(error.clone());
    }
}

pub struct Harness {
    pub session: Session,
    pub rendered: Rendered,
    pub usage: Arc<RecordingUsage>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(config: SessionConfig) -> Self {
        let (queue, rendered) = recording_queue();
        let usage = Arc::new(RecordingUsage::default());
        let reporter = Arc::new(RecordingReporter::default());
        let session = Session::new(queue, config)
            .with_usage_sink(usage.clone())
            .with_error_reporter(reporter.clone());

        Self {
            session,
            rendered,
            usage,
            reporter,
        }
    }

    /// Rendered blocks once every queued block has been delivered.
    pub fn drained_blocks(&self) -> Vec<Block> {
        assert!(
            self.session.delivery().wait_until_drained(DEADLINE),
            "delivery did not drain in time"
        );
        self.rendered.blocks()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
