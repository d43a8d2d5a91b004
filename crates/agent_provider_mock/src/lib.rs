//! Deterministic scripted implementation of the `agent_provider` contract.
//!
//! No transport logic lives here. Scripts replay fixed fragments (optionally
//! with delays), a single aggregate answer, a failure, or an echo of the
//! question, which is enough to drive the session engine end to end in tests
//! and in the demo CLI.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use agent_provider::{CancelSignal, ProviderProfile, RunEvent, RunProvider, RunRequest};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// Provider identifier for the echoing variant.
pub const ECHO_PROVIDER_ID: &str = "echo";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Script {
    Stream(Vec<String>),
    Aggregate(String),
    Fail {
        fragments: Vec<String>,
        error: String,
    },
    Echo,
}

/// Scripted backend used by tests and local runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockProvider {
    script: Script,
    run_delay: Duration,
    fragment_delay: Duration,
}

impl MockProvider {
    /// Streams each fragment as one `Chunk`, then finishes without aggregate text.
    #[must_use]
    pub fn streaming(fragments: Vec<String>) -> Self {
        Self::with_script(Script::Stream(fragments))
    }

    /// Emits no chunks and finishes with `text` as the aggregate answer.
    #[must_use]
    pub fn aggregate(text: impl Into<String>) -> Self {
        Self::with_script(Script::Aggregate(text.into()))
    }

    /// Streams `fragments` and then fails with `error`.
    #[must_use]
    pub fn failing(fragments: Vec<String>, error: impl Into<String>) -> Self {
        Self::with_script(Script::Fail {
            fragments,
            error: error.into(),
        })
    }

    /// Streams an answer that quotes the question, word by word.
    #[must_use]
    pub fn echo() -> Self {
        Self::with_script(Script::Echo)
    }

    /// Sets the pause before the first fragment and between fragments.
    #[must_use]
    pub fn with_delays(mut self, run_delay: Duration, fragment_delay: Duration) -> Self {
        self.run_delay = run_delay;
        self.fragment_delay = fragment_delay;
        self
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            run_delay: Duration::ZERO,
            fragment_delay: Duration::ZERO,
        }
    }

    const DEMO_RUN_DELAY_MS: u64 = 200;
    const DEMO_FRAGMENT_DELAY_MS: u64 = 40;

    /// Streams fragments, stopping early when `cancel` is observed.
    ///
    /// Returns false when the run was cancelled (and `Cancelled` emitted).
    fn stream_fragments(
        &self,
        run_id: u64,
        fragments: &[String],
        cancel: &CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> bool {
        for fragment in fragments {
            if cancel.load(Ordering::SeqCst) {
                emit(RunEvent::Cancelled { run_id });
                return false;
            }

            emit(RunEvent::Chunk {
                run_id,
                text: fragment.clone(),
            });
            pause(self.fragment_delay);
        }

        if cancel.load(Ordering::SeqCst) {
            emit(RunEvent::Cancelled { run_id });
            return false;
        }

        true
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::streaming(
            [
                "Here is a small ",
                "Rust example:\n",
                "\n``",
                "`ru",
                "st\n",
                "fn main() {\n",
                "    println!(\"Hello, ",
                "stream\");\n",
                "}\n",
                "```\n",
                "Fence markers above arrived split across ",
                "fragments and still formed one code block.\n",
                "~~~text\n",
                "```\n",
                "a nested-looking fence stays content\n",
                "~~~\n",
                "Done.",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        )
        .with_delays(
            Duration::from_millis(Self::DEMO_RUN_DELAY_MS),
            Duration::from_millis(Self::DEMO_FRAGMENT_DELAY_MS),
        )
    }
}

impl RunProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        let provider_id = match self.script {
            Script::Echo => ECHO_PROVIDER_ID,
            _ => MOCK_PROVIDER_ID,
        };

        ProviderProfile {
            provider_id: provider_id.to_string(),
            model_id: "mock".to_string(),
        }
    }

    fn run(
        &self,
        req: RunRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;

        emit(RunEvent::Started { run_id });
        pause(self.run_delay);

        match &self.script {
            Script::Stream(fragments) => {
                if self.stream_fragments(run_id, fragments, &cancel, emit) {
                    emit(RunEvent::Finished {
                        run_id,
                        final_text: None,
                    });
                }
            }
            Script::Aggregate(text) => {
                if cancel.load(Ordering::SeqCst) {
                    emit(RunEvent::Cancelled { run_id });
                } else {
                    emit(RunEvent::Finished {
                        run_id,
                        final_text: Some(text.clone()),
                    });
                }
            }
            Script::Fail { fragments, error } => {
                if self.stream_fragments(run_id, fragments, &cancel, emit) {
                    emit(RunEvent::Failed {
                        run_id,
                        error: error.clone(),
                    });
                }
            }
            Script::Echo => {
                let fragments = echo_fragments(&req);
                if self.stream_fragments(run_id, &fragments, &cancel, emit) {
                    emit(RunEvent::Finished {
                        run_id,
                        final_text: None,
                    });
                }
            }
        }

        Ok(())
    }
}

fn echo_fragments(req: &RunRequest) -> Vec<String> {
    let answer = match req.question() {
        Some(question) => format!(
            "You asked (turn {}): {question}\n",
            req.messages.len().div_ceil(2)
        ),
        None => format!(
            "Explaining {} attached resource(s).\n",
            req.context.len()
        ),
    };

    let mut fragments = Vec::new();
    let mut pending = String::new();
    for ch in answer.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            fragments.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        fragments.push(pending);
    }

    for document in &req.context {
        fragments.push(format!("```text\n{}\n```\n", document.id));
    }

    fragments
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
