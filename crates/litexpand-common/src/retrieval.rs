//! Passage retrieval interface shared by the corpus index and the summarizer.

use std::path::PathBuf;

/// One ranked slice of a document in the local corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// File the passage was cut from.
    pub source: PathBuf,
    /// Position of the passage within its file.
    pub index: usize,
    pub text: String,
    pub score: f64,
}

/// Returns the `top_k` passages most relevant to a query, best first.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Passage>;
}
