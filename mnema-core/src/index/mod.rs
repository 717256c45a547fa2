//! Process-wide in-memory indexes over chunk content.
//!
//! Both indexes are owned by the engine and guarded by reader-writer locks:
//! the agent loop is the sole writer, read queries share the read side.

mod bm25;
mod vector;

pub use bm25::{tokenize, Bm25Index};
pub use vector::{VectorEntry, VectorIndex};
