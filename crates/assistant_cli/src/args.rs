//! Command-line arguments.

use std::path::PathBuf;

use answer_stream::HistoryWindow;
use clap::Parser;

use crate::render::OutputFormat;

/// Ask questions and read streamed answers block by block.
#[derive(Parser, Debug, Clone)]
#[command(name = "assistant")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory that relative `/attach` paths resolve against
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Ask a single question, print the answer and exit
    #[arg(short = 'e', long)]
    pub execute: Option<String>,

    /// Backend to answer with (echo, mock); overrides ANSWER_STREAM_PROVIDER
    #[arg(short = 'p', long)]
    pub provider: Option<String>,

    /// Exchanges replayed as context, `all` or a count; overrides
    /// ANSWER_STREAM_HISTORY_WINDOW
    #[arg(short = 'w', long)]
    pub window: Option<HistoryWindow>,

    /// Files attached to the first question
    #[arg(short = 'a', long = "attach")]
    pub attachments: Vec<String>,

    /// Print one JSON object per block
    #[arg(long)]
    pub json: bool,

    /// Show debug logs from the session engine
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Resolve the workspace path to an absolute directory.
    pub fn resolve_workspace(&self) -> anyhow::Result<PathBuf> {
        let canonical = self.workspace.canonicalize().map_err(|e| {
            anyhow::anyhow!(
                "Workspace '{}' does not exist or is not accessible: {}",
                self.workspace.display(),
                e
            )
        })?;

        if !canonical.is_dir() {
            anyhow::bail!("Workspace '{}' is not a directory", canonical.display());
        }

        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_interactive_text_output() {
        let args = Args::try_parse_from(["assistant"]).expect("no args should parse");

        assert_eq!(args.workspace, PathBuf::from("."));
        assert_eq!(args.execute, None);
        assert!(args.attachments.is_empty());
        assert_eq!(args.output_format(), OutputFormat::Text);
    }

    #[test]
    fn flags_parse() {
        let args = Args::try_parse_from([
            "assistant",
            "-e",
            "what is this?",
            "--provider",
            "mock",
            "--window",
            "2",
            "-a",
            "src/lib.rs",
            "--attach",
            "Cargo.toml",
            "--json",
        ])
        .expect("flags should parse");

        assert_eq!(args.execute.as_deref(), Some("what is this?"));
        assert_eq!(args.provider.as_deref(), Some("mock"));
        assert_eq!(args.window, Some(HistoryWindow::Last(2)));
        assert_eq!(args.attachments, vec!["src/lib.rs", "Cargo.toml"]);
        assert_eq!(args.output_format(), OutputFormat::Json);
    }

    #[test]
    fn invalid_window_is_rejected() {
        assert!(Args::try_parse_from(["assistant", "--window", "many"]).is_err());
    }

    #[test]
    fn missing_workspace_is_reported() {
        let args = Args::try_parse_from(["assistant", "--workspace", "/definitely/not/here"])
            .expect("path parses");
        assert!(args.resolve_workspace().is_err());
    }
}
