//! Pure data model: blocks, stream segmentation and exchange history.

pub mod block;
pub mod history;
pub mod segmenter;
