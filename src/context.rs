//! Resolution of context resource ids into documents sent with a request.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use agent_provider::ContextDocument;

use crate::error::ContextError;

/// Default cap on the bytes read per context file.
pub const DEFAULT_CONTEXT_MAX_BYTES: usize = 64 * 1024;

/// Resolves opaque resource ids to their content.
///
/// Duplicate ids are resolved once; the returned documents are ordered by id.
pub trait ContextProvider: Send + Sync {
    fn resolve(&self, ids: &[String]) -> Result<Vec<ContextDocument>, ContextError>;
}

/// Resolves every id to an empty document.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContext;

impl ContextProvider for NoContext {
    fn resolve(&self, ids: &[String]) -> Result<Vec<ContextDocument>, ContextError> {
        unique_ids(ids)?
            .into_iter()
            .map(|id| Ok(ContextDocument::new(id, String::new())))
            .collect()
    }
}

/// Reads ids as file paths relative to a workspace root.
#[derive(Debug, Clone)]
pub struct FileContextProvider {
    root: PathBuf,
    max_bytes: usize,
}

impl FileContextProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: DEFAULT_CONTEXT_MAX_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        let candidate = Path::new(id);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

impl ContextProvider for FileContextProvider {
    fn resolve(&self, ids: &[String]) -> Result<Vec<ContextDocument>, ContextError> {
        unique_ids(ids)?
            .into_iter()
            .map(|id| {
                let path = self.path_for(&id);
                let bytes =
                    fs::read(&path).map_err(|source| ContextError::io(&id, &path, source))?;
                let content = truncate_on_char_boundary(
                    String::from_utf8_lossy(&bytes).into_owned(),
                    self.max_bytes,
                );
                Ok(ContextDocument::new(id, content))
            })
            .collect()
    }
}

fn unique_ids(ids: &[String]) -> Result<BTreeSet<String>, ContextError> {
    ids.iter()
        .map(|id| {
            let trimmed = id.trim();
            if trimmed.is_empty() {
                Err(ContextError::EmptyId)
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

fn truncate_on_char_boundary(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }

    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text
}
