//! Line-oriented driver for the session controller.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use answer_stream::SessionController;

use crate::app::{App, Output};
use crate::host::ControllerHost;
use crate::render::{format_exchange, OutputFormat};

const WAIT_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct ReplOptions {
    pub format: OutputFormat,
    /// Files attached before the first line is read.
    pub attachments: Vec<String>,
    /// Finish each answer before reading the next line. Used when input is
    /// piped rather than typed.
    pub wait_for_answers: bool,
}

/// Blocks until the in-flight run ends and its blocks are rendered.
pub fn wait_for_answer(controller: &SessionController) {
    while !controller.wait_until_idle(WAIT_SLICE) {}
    while !controller.wait_until_drained(WAIT_SLICE) {}
}

/// Asks one question and waits for the full answer.
pub fn execute_once(
    controller: &Arc<SessionController>,
    question: &str,
    attachments: &[String],
) -> anyhow::Result<()> {
    controller
        .submit(question, attachments)
        .context("failed to submit question")?;
    wait_for_answer(controller);
    Ok(())
}

/// Reads lines from `input` until EOF or `/quit`, writing notices and
/// navigated exchanges to `out`. Streamed blocks go through the controller's
/// renderer.
pub fn run_interactive(
    controller: &Arc<SessionController>,
    input: impl BufRead,
    out: &mut dyn Write,
    options: ReplOptions,
) -> anyhow::Result<()> {
    let mut app = App::new();
    for path in options.attachments {
        app.attach(path);
    }
    let mut host = ControllerHost::new(Arc::clone(controller));

    for line in input.lines() {
        let line = line.context("failed to read input")?;
        let started = app.on_line(&line, &mut host);
        if started.is_some() && options.wait_for_answers {
            wait_for_answer(controller);
        }

        write_outputs(out, app.take_outputs(), options.format)?;
        if app.should_exit {
            return Ok(());
        }
    }

    wait_for_answer(controller);
    Ok(())
}

fn write_outputs(
    out: &mut dyn Write,
    outputs: Vec<Output>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    for output in outputs {
        match output {
            Output::Notice(text) => writeln!(out, "{text}")?,
            Output::Exchange(exchange) => write!(out, "{}", format_exchange(&exchange, format))?,
        }
    }
    out.flush()?;
    Ok(())
}
