use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::core::block::Block;
use crate::error::HistoryError;

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    question: Option<String>,
    blocks: Vec<Block>,
    context_refs: BTreeSet<String>,
}

impl Exchange {
    #[must_use]
    pub fn new(
        question: Option<String>,
        blocks: Vec<Block>,
        context_refs: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            question,
            blocks,
            context_refs: context_refs.into_iter().collect(),
        }
    }

    /// `None` for system-initiated exchanges.
    #[must_use]
    pub fn question(&self) -> Option<&str> {
        self.question.as_deref()
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn context_refs(&self) -> &BTreeSet<String> {
        &self.context_refs
    }

    /// Full answer text: block contents separated by blank lines.
    #[must_use]
    pub fn answer_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::content)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// How much history is replayed as conversational context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryWindow {
    /// The last `n` exchanges up to and including the cursor.
    Last(usize),
    #[default]
    Entire,
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Last(count) => write!(f, "{count}"),
            Self::Entire => f.write_str("all"),
        }
    }
}

impl FromStr for HistoryWindow {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("entire") {
            return Ok(Self::Entire);
        }

        trimmed.parse::<usize>().map(Self::Last).map_err(|_| {
            format!("invalid history window '{trimmed}': expected 'all' or a non-negative integer")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => f.write_str("previous"),
            Self::Next => f.write_str("next"),
        }
    }
}

/// Ordered exchanges plus the cursor of the one currently displayed.
///
/// Invariant: `cursor` is `None` exactly when the history is empty, and
/// otherwise indexes an existing exchange. Navigation only moves the cursor;
/// `append`, `replace_last` and `truncate_after_cursor` are the only mutations
/// of the sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeHistory {
    exchanges: Vec<Exchange>,
    cursor: Option<usize>,
}

impl ExchangeHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Exchange at the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&Exchange> {
        self.cursor.and_then(|index| self.exchanges.get(index))
    }

    #[must_use]
    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Exchange> {
        self.exchanges.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    /// True when the cursor is on the newest exchange (or history is empty).
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.cursor.map(|index| index + 1) == Some(self.exchanges.len()) || self.is_empty()
    }

    #[must_use]
    pub fn can_navigate_previous(&self) -> bool {
        self.cursor.is_some_and(|index| index > 0)
    }

    #[must_use]
    pub fn can_navigate_next(&self) -> bool {
        self.cursor
            .is_some_and(|index| index + 1 < self.exchanges.len())
    }

    pub fn append(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
        self.cursor = Some(self.exchanges.len() - 1);
    }

    /// Overwrites the newest exchange and moves the cursor onto it.
    pub fn replace_last(&mut self, exchange: Exchange) -> Result<(), HistoryError> {
        let Some(last) = self.exchanges.last_mut() else {
            return Err(HistoryError::invalid_state("replace_last"));
        };

        *last = exchange;
        self.cursor = Some(self.exchanges.len() - 1);
        Ok(())
    }

    /// Drops every exchange after the cursor and returns how many were removed.
    pub fn truncate_after_cursor(&mut self) -> usize {
        let Some(cursor) = self.cursor else {
            return 0;
        };

        let keep = cursor + 1;
        let removed = self.exchanges.len().saturating_sub(keep);
        self.exchanges.truncate(keep);
        removed
    }

    pub fn navigate_previous(&mut self) -> Result<&Exchange, HistoryError> {
        self.navigate(Direction::Previous)
    }

    pub fn navigate_next(&mut self) -> Result<&Exchange, HistoryError> {
        self.navigate(Direction::Next)
    }

    fn navigate(&mut self, direction: Direction) -> Result<&Exchange, HistoryError> {
        let Some(cursor) = self.cursor else {
            return Err(HistoryError::invalid_state(match direction {
                Direction::Previous => "navigate_previous",
                Direction::Next => "navigate_next",
            }));
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
        Ok(&self.exchanges[target])
    }

    /// Exchanges replayed as context: the last `n` up to and including the cursor.
    #[must_use]
    pub fn windowed(&self, window: HistoryWindow) -> &[Exchange] {
        let Some(cursor) = self.cursor else {
            return &[];
        };

        let end = cursor + 1;
        let start = match window {
            HistoryWindow::Entire => 0,
            HistoryWindow::Last(count) => end.saturating_sub(count),
        };
        &self.exchanges[start..end]
    }
}
