//! Terminal output for delivered blocks.

use std::io::Write;

use answer_stream::{Block, BlockRenderer, Exchange};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per block.
    Json,
}

/// Formats one block. Code is re-fenced with its tag so the output stays
/// valid markdown.
pub fn format_block(block: &Block, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match block.code_tag() {
            Some(tag) => {
                let fence = fence_for(block.content());
                format!("{fence}{tag}\n{}\n{fence}\n\n", block.content())
            }
            None => format!("{}\n\n", block.content()),
        },
        OutputFormat::Json => match serde_json::to_string(block) {
            Ok(line) => format!("{line}\n"),
            Err(error) => {
                tracing::warn!(%error, "failed to serialize block");
                String::new()
            }
        },
    }
}

/// Backtick fence longer than any backtick run that starts a line of
/// `content`, so nested fences cannot close it.
fn fence_for(content: &str) -> String {
    let longest = content
        .lines()
        .map(|line| line.trim_start().chars().take_while(|&ch| ch == '`').count())
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

/// Formats a recorded exchange for `/prev`, `/next` and `/history`.
pub fn format_exchange(exchange: &Exchange, format: OutputFormat) -> String {
    let mut out = String::new();
    match (format, exchange.question()) {
        (OutputFormat::Text, Some(question)) => out.push_str(&format!("> {question}\n\n")),
        (OutputFormat::Json, _) => {
            return match serde_json::to_string(exchange) {
                Ok(line) => format!("{line}\n"),
                Err(error) => {
                    tracing::warn!(%error, "failed to serialize exchange");
                    String::new()
                }
            };
        }
        (OutputFormat::Text, None) => {}
    }

    for block in exchange.blocks() {
        out.push_str(&format_block(block, format));
    }
    out
}

/// Writes blocks to a terminal stream as they are delivered.
pub struct TerminalRenderer<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write + Send + 'static> TerminalRenderer<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }
}

impl<W: Write + Send + 'static> BlockRenderer for TerminalRenderer<W> {
    fn render(&mut self, block: Block) {
        let text = format_block(&block, self.format);
        if let Err(error) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            tracing::warn!(%error, "failed to write block to terminal");
        }
    }
}
