//! Incremental, line-oriented segmentation of streamed answer text.
//!
//! Fragments may end anywhere, including inside a fence marker or its tag, so
//! nothing is classified until a full line is available. Each completed line
//! either toggles fence state or is appended to the block being built. Blocks
//! are emitted as soon as their closing boundary is seen.
//!
//! Segmentation never fails. Lines that look like fences but do not close the
//! open fence are kept as content, and a fence left open at end-of-stream is
//! flushed as code of its declared type.

use std::sync::OnceLock;

use regex::Regex;

use crate::core::block::{Block, BlockKind, GENERIC_CODE_TAG};

fn fence_line_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^ {0,3}(?P<marker>`{3,}|~{3,})[ \t]*(?P<tag>[^\s`~]+)?\s*$")
            .expect("fence regex must compile")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FenceLine<'a> {
    marker: &'a str,
    tag: Option<&'a str>,
}

impl FenceLine<'_> {
    /// A closer repeats the opener's fence character at least as many times.
    /// Any tag on the closing line is ignored.
    fn closes(&self, open: &OpenFence) -> bool {
        self.marker.starts_with(open.marker.as_str())
    }
}

fn parse_fence_line(line: &str) -> Option<FenceLine<'_>> {
    let captures = fence_line_regex().captures(line)?;
    let marker = captures.name("marker")?.as_str();
    let tag = captures.name("tag").map(|tag| tag.as_str());
    Some(FenceLine { marker, tag })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenFence {
    marker: String,
    tag: String,
}

/// Parser state for one in-flight answer.
///
/// An open fence always carries both its marker and its tag; outside a fence
/// neither exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    line_buffer: String,
    block_buffer: String,
    fence: Option<OpenFence>,
}

impl StreamState {
    #[must_use]
    pub fn is_inside_fence(&self) -> bool {
        self.fence.is_some()
    }

    /// Exact delimiter that opened the current fence.
    #[must_use]
    pub fn fence_marker(&self) -> Option<&str> {
        self.fence.as_ref().map(|fence| fence.marker.as_str())
    }

    #[must_use]
    pub fn code_tag(&self) -> Option<&str> {
        self.fence.as_ref().map(|fence| fence.tag.as_str())
    }

    /// Unterminated trailing fragment of the current line.
    #[must_use]
    pub fn pending_line(&self) -> &str {
        &self.line_buffer
    }

    /// Text accumulated for the block currently being built.
    #[must_use]
    pub fn pending_block(&self) -> &str {
        &self.block_buffer
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line_buffer.is_empty() && self.block_buffer.is_empty() && self.fence.is_none()
    }
}

/// Turns an unbounded sequence of text fragments into ordered [`Block`]s.
#[derive(Debug, Clone, Default)]
pub struct BlockSegmenter {
    state: StreamState,
}

impl BlockSegmenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments a complete text in one pass, as a non-streaming backend's
    /// aggregate answer is segmented.
    #[must_use]
    pub fn segment_all(text: &str) -> Vec<Block> {
        let mut segmenter = Self::new();
        let mut blocks = segmenter.process_fragment(text);
        blocks.extend(segmenter.flush());
        blocks
    }

    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Consumes one fragment and returns the blocks it completed, in order.
    pub fn process_fragment(&mut self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();

        for piece in text.split_inclusive('\n') {
            let Some(body) = piece.strip_suffix('\n') else {
                self.state.line_buffer.push_str(piece);
                continue;
            };

            self.state.line_buffer.push_str(body);
            let mut line = std::mem::take(&mut self.state.line_buffer);
            if line.ends_with('\r') {
                line.pop();
            }

            blocks.extend(self.process_line(&line));
        }

        blocks
    }

    /// Emits whatever is buffered at end-of-stream and resets the state.
    ///
    /// A trailing line without a newline is classified first, so a closing
    /// fence at the very end of the stream still closes. A fence that never
    /// closed is emitted as code of its declared type.
    pub fn flush(&mut self) -> Option<Block> {
        let mut last_line = std::mem::take(&mut self.state.line_buffer);
        if last_line.ends_with('\r') {
            last_line.pop();
        }

        let closed = if last_line.is_empty() {
            None
        } else {
            self.process_line(&last_line)
        };

        let trailing = match self.state.fence.take() {
            Some(open) => self.take_block(BlockKind::Code(open.tag)),
            None => self.take_block(BlockKind::Prose),
        };
        self.reset();

        debug_assert!(closed.is_none() || trailing.is_none());
        closed.or(trailing)
    }

    /// Drops all buffered state without emitting anything.
    pub fn reset(&mut self) {
        self.state = StreamState::default();
    }

    fn process_line(&mut self, line: &str) -> Option<Block> {
        let fence_line = parse_fence_line(line);

        match (&self.state.fence, fence_line) {
            (None, Some(opening)) => {
                let prose = self.take_block(BlockKind::Prose);
                self.state.fence = Some(OpenFence {
                    marker: opening.marker.to_string(),
                    tag: opening.tag.unwrap_or(GENERIC_CODE_TAG).to_string(),
                });
                prose
            }
            (Some(open), Some(closing)) if closing.closes(open) => {
                let tag = self.state.fence.take().map(|open| open.tag)?;
                self.take_block(BlockKind::Code(tag))
            }
            _ => {
                self.state.block_buffer.push_str(line);
                self.state.block_buffer.push('\n');
                None
            }
        }
    }

    fn take_block(&mut self, kind: BlockKind) -> Option<Block> {
        let raw = std::mem::take(&mut self.state.block_buffer);
        let content = match kind {
            BlockKind::Prose => raw.trim().to_string(),
            BlockKind::Code(_) => trim_blank_lines(&raw).to_string(),
        };

        if content.is_empty() {
            None
        } else {
            Some(Block::new(kind, content))
        }
    }
}

/// Removes leading blank lines and trailing whitespace while keeping the
/// indentation of the first non-blank line.
fn trim_blank_lines(text: &str) -> &str {
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    text[start..].trim_end()
}
