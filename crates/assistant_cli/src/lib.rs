//! Interactive terminal front end for the answer stream session engine.
//!
//! ## Provider selection
//!
//! - `--provider echo` (default) answers by quoting the question, one word
//!   per fragment, plus one code block per attached file.
//! - `--provider mock` streams a fixed demo answer with fence markers split
//!   across fragments.
//!
//! `ANSWER_STREAM_PROVIDER` selects the provider when the flag is absent.
//!
//! ## Output
//!
//! Blocks are printed as soon as the segmenter completes them. Prose is
//! printed verbatim and code is re-fenced with its tag; `--json` prints one
//! `{"kind", "content"}` object per block instead.

pub mod app;
pub mod args;
pub mod commands;
pub mod host;
pub mod providers;
pub mod render;
pub mod repl;
