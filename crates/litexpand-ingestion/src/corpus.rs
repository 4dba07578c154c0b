//! Lexical passage index over the local paper corpus.
//!
//! Every `.txt`, `.md` and `.pdf` file under the data directory is split
//! into word-window passages and scored against queries with BM25. PDFs
//! acquired by the pipeline land in the same directory, so each review cycle
//! retrieves from the papers the previous cycle downloaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use litexpand_common::{Passage, Retriever};
use tracing::{debug, info, warn};

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::pdf_parser::extract_pdf_text;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

struct IndexedPassage {
    source: PathBuf,
    index: usize,
    text: String,
    term_freqs: HashMap<String, u32>,
    len: usize,
}

pub struct CorpusIndex {
    passages: Vec<IndexedPassage>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
}

impl CorpusIndex {
    /// Index every supported file under `dir`, recursively. Files that cannot
    /// be read or parsed are skipped with a warning.
    pub fn load(dir: &Path, config: &ChunkerConfig) -> std::io::Result<Self> {
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match read_document(&path) {
                Ok(Some(text)) => documents.push((path, text)),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
            }
        }

        let index = Self::from_documents(documents, config);
        info!(
            dir = %dir.display(),
            passages = index.len(),
            "Corpus index built"
        );
        Ok(index)
    }

    /// Build an index from already-loaded `(path, text)` pairs.
    pub fn from_documents(documents: Vec<(PathBuf, String)>, config: &ChunkerConfig) -> Self {
        let mut passages = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for (source, text) in documents {
            for (index, chunk) in chunk_text(&text, config).into_iter().enumerate() {
                let terms = tokenize(&chunk);
                let mut term_freqs: HashMap<String, u32> = HashMap::new();
                for term in &terms {
                    *term_freqs.entry(term.clone()).or_default() += 1;
                }
                for term in term_freqs.keys() {
                    *doc_freq.entry(term.clone()).or_default() += 1;
                }
                passages.push(IndexedPassage {
                    source: source.clone(),
                    index,
                    text: chunk,
                    term_freqs,
                    len: terms.len(),
                });
            }
        }

        let avg_len = if passages.is_empty() {
            0.0
        } else {
            passages.iter().map(|p| p.len).sum::<usize>() as f64 / passages.len() as f64
        };

        Self { passages, doc_freq, avg_len }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    fn score(&self, passage: &IndexedPassage, query_terms: &[String]) -> f64 {
        let n = self.passages.len() as f64;
        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *passage.term_freqs.get(term)? as f64;
                let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let norm = 1.0 - BM25_B + BM25_B * passage.len as f64 / self.avg_len.max(1.0);
                Some(idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm))
            })
            .sum()
    }
}

impl Retriever for CorpusIndex {
    fn retrieve(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let mut query_terms = tokenize(query);
        query_terms.sort();
        query_terms.dedup();

        let mut scored: Vec<(usize, f64)> = self
            .passages
            .iter()
            .enumerate()
            .map(|(i, p)| (i, self.score(p, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Stable sort keeps corpus order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(query, hits = scored.len(), "Corpus retrieval");
        scored
            .into_iter()
            .map(|(i, score)| {
                let p = &self.passages[i];
                Passage {
                    source: p.source.clone(),
                    index: p.index,
                    text: p.text.clone(),
                    score,
                }
            })
            .collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Text of a supported document; `None` for unsupported extensions.
fn read_document(path: &Path) -> anyhow::Result<Option<String>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") | Some("md") => Ok(Some(std::fs::read_to_string(path)?)),
        Some("pdf") => Ok(Some(extract_pdf_text(path)?)),
        _ => Ok(None),
    }
}
