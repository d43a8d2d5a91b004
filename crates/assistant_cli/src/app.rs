use std::collections::BTreeSet;

use answer_stream::{Direction, Exchange, HistoryError, RunId, SessionError};

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};

/// Something the REPL should show the user besides streamed blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Notice(String),
    Exchange(Exchange),
}

/// Session operations the REPL drives. Implemented over the session
/// controller, and by spies in tests.
pub trait HostOps {
    fn submit(&mut self, question: String, attachments: &[String]) -> Result<RunId, SessionError>;
    fn regenerate(&mut self) -> Result<RunId, SessionError>;
    fn cancel(&mut self) -> Option<RunId>;
    fn navigate(&mut self, direction: Direction) -> Result<Exchange, HistoryError>;
    /// Recorded exchanges and the cursor.
    fn history(&mut self) -> (Vec<Exchange>, Option<usize>);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct App {
    attachments: BTreeSet<String>,
    outputs: Vec<Output>,
    pub should_exit: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files sent as context with every question until `/detach`.
    pub fn attachments(&self) -> Vec<String> {
        self.attachments.iter().cloned().collect()
    }

    pub fn attach(&mut self, path: impl Into<String>) {
        self.attachments.insert(path.into());
    }

    pub fn take_outputs(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.outputs)
    }

    /// Handles one line of user input. Returns the run id when a backend run
    /// was started.
    pub fn on_line(&mut self, line: &str, host: &mut dyn HostOps) -> Option<RunId> {
        let input = line.trim();
        if input.is_empty() {
            return None;
        }

        let Some(command) = parse_slash_command(input) else {
            let attachments = self.attachments();
            return self.started(host.submit(input.to_string(), &attachments));
        };

        match command {
            SlashCommand::Help => self.notice(HELP_TEXT),
            SlashCommand::Cancel => match host.cancel() {
                Some(run_id) => self.notice(format!("Cancelled request {run_id}")),
                None => self.notice("Nothing to cancel"),
            },
            SlashCommand::Previous => self.on_navigate(Direction::Previous, host),
            SlashCommand::Next => self.on_navigate(Direction::Next, host),
            SlashCommand::Regenerate => return self.started(host.regenerate()),
            SlashCommand::Attach(path) => {
                self.notice(format!("Attached {path}"));
                self.attach(path);
            }
            SlashCommand::Detach => {
                let count = self.attachments.len();
                self.attachments.clear();
                self.notice(format!("Detached {count} file(s)"));
            }
            SlashCommand::History => self.on_history(host),
            SlashCommand::Quit => {
                host.cancel();
                self.should_exit = true;
            }
            SlashCommand::MissingArgument(usage) => self.notice(format!("Usage: {usage}")),
            SlashCommand::Unknown(command) => {
                self.notice(format!("Unknown command: {command}. Type /help for commands."))
            }
        }

        None
    }

    fn started(&mut self, result: Result<RunId, SessionError>) -> Option<RunId> {
        match result {
            Ok(run_id) => Some(run_id),
            Err(SessionError::ConcurrentRequest { run_id }) => {
                self.notice(format!(
                    "Request {run_id} is still answering. Wait for it or type /cancel."
                ));
                None
            }
            Err(SessionError::History(HistoryError::InvalidState { .. })) => {
                self.notice("No answer to regenerate yet");
                None
            }
            Err(error) => {
                self.notice(format!("Error: {error}"));
                None
            }
        }
    }

    fn on_navigate(&mut self, direction: Direction, host: &mut dyn HostOps) {
        match host.navigate(direction) {
            Ok(exchange) => self.outputs.push(Output::Exchange(exchange)),
            Err(HistoryError::InvalidState { .. }) => self.notice("No answers yet"),
            Err(HistoryError::OutOfRange { .. }) => match direction {
                Direction::Previous => self.notice("Already at the first answer"),
                Direction::Next => self.notice("Already at the latest answer"),
            },
        }
    }

    fn on_history(&mut self, host: &mut dyn HostOps) {
        let (exchanges, cursor) = host.history();
        if exchanges.is_empty() {
            self.notice("No answers yet");
            return;
        }

        let listing = exchanges
            .iter()
            .enumerate()
            .map(|(index, exchange)| {
                let marker = if Some(index) == cursor { '*' } else { ' ' };
                let question = exchange.question().unwrap_or("(explanation)");
                format!("{marker} {}. {question}", index + 1)
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.notice(listing);
    }

    fn notice(&mut self, text: impl Into<String>) {
        self.outputs.push(Output::Notice(text.into()));
    }
}
