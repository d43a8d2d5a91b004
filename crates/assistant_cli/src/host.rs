use std::sync::Arc;

use answer_stream::{Direction, Exchange, HistoryError, RunId, SessionController, SessionError};

use crate::app::HostOps;

/// [`HostOps`] backed by a live [`SessionController`].
pub struct ControllerHost {
    controller: Arc<SessionController>,
}

impl ControllerHost {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }
}

impl HostOps for ControllerHost {
    fn submit(&mut self, question: String, attachments: &[String]) -> Result<RunId, SessionError> {
        self.controller.submit(question, attachments)
    }

    fn regenerate(&mut self) -> Result<RunId, SessionError> {
        self.controller.regenerate()
    }

    fn cancel(&mut self) -> Option<RunId> {
        self.controller.cancel()
    }

    fn navigate(&mut self, direction: Direction) -> Result<Exchange, HistoryError> {
        match direction {
            Direction::Previous => self.controller.navigate_previous(),
            Direction::Next => self.controller.navigate_next(),
        }
    }

    fn history(&mut self) -> (Vec<Exchange>, Option<usize>) {
        self.controller.with_session(|session| {
            let history = session.history();
            (history.iter().cloned().collect(), history.cursor())
        })
    }
}
