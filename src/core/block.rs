use std::fmt;

use serde::{Serialize, Serializer};

/// Tag used for fenced regions that declare no language.
pub const GENERIC_CODE_TAG: &str = "code";

/// Classification of a block: free-form prose or a typed code region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Prose,
    Code(String),
}

impl BlockKind {
    /// Returns `prose` or the code tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Prose => "prose",
            Self::Code(tag) => tag,
        }
    }

    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code(_))
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BlockKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One classified, immutable unit of answer content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Block {
    kind: BlockKind,
    content: String,
}

impl Block {
    #[must_use]
    pub fn new(kind: BlockKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn prose(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Prose, content)
    }

    #[must_use]
    pub fn code(tag: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(BlockKind::Code(tag.into()), content)
    }

    #[must_use]
    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the code tag for code blocks.
    #[must_use]
    pub fn code_tag(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Code(tag) => Some(tag),
            BlockKind::Prose => None,
        }
    }
}
