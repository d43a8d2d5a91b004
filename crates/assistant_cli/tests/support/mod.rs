#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use answer_stream::{
    Block, Direction, Exchange, HistoryError, RunId, SessionError,
};
use assistant_cli::app::HostOps;

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// `Write` sink shared between the delivery thread and the test.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock_unpoisoned(&self.0)).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock_unpoisoned(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn exchange(question: &str, answer: &str) -> Exchange {
    Exchange::new(
        Some(question.to_string()),
        vec![Block::prose(answer)],
        Vec::new(),
    )
}

#[derive(Default)]
pub struct HostSpy {
    pub next_run_id: RunId,
    pub active_run: Option<RunId>,
    pub submitted: Vec<(String, Vec<String>)>,
    pub regenerations: usize,
    pub cancelled_runs: Vec<RunId>,
    pub exchanges: Vec<Exchange>,
    pub cursor: Option<usize>,
}

impl HostSpy {
    pub fn with_exchanges(exchanges: Vec<Exchange>) -> Self {
        let cursor = exchanges.len().checked_sub(1);
        Self {
            next_run_id: 1,
            exchanges,
            cursor,
            ..Self::default()
        }
    }

    fn start(&mut self) -> Result<RunId, SessionError> {
        if let Some(run_id) = self.active_run {
            return Err(SessionError::ConcurrentRequest { run_id });
        }
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.active_run = Some(run_id);
        Ok(run_id)
    }
}

impl HostOps for HostSpy {
    fn submit(&mut self, question: String, attachments: &[String]) -> Result<RunId, SessionError> {
        let run_id = self.start()?;
        self.submitted.push((question, attachments.to_vec()));
        Ok(run_id)
    }

    fn regenerate(&mut self) -> Result<RunId, SessionError> {
        if self.exchanges.is_empty() {
            return Err(HistoryError::invalid_state("regenerate").into());
        }
        let run_id = self.start()?;
        self.regenerations += 1;
        Ok(run_id)
    }

    fn cancel(&mut self) -> Option<RunId> {
        let run_id = self.active_run.take()?;
        self.cancelled_runs.push(run_id);
        Some(run_id)
    }

    fn navigate(&mut self, direction: Direction) -> Result<Exchange, HistoryError> {
        let Some(cursor) = self.cursor else {
            return Err(HistoryError::invalid_state("navigate"));
        };
        let target = match direction {
            Direction::Previous => cursor.checked_sub(1),
            Direction::Next => Some(cursor + 1).filter(|next| *next < self.exchanges.len()),
        };
        let Some(target) = target else {
            return Err(HistoryError::OutOfRange {
                direction,
                cursor,
                len: self.exchanges.len(),
            });
        };
        self.cursor = Some(target);
        Ok(self.exchanges[target].clone())
    }

    fn history(&mut self) -> (Vec<Exchange>, Option<usize>) {
        (self.exchanges.clone(), self.cursor)
    }
}
