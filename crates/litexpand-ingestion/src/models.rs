//! Data models for reference extraction and acquisition.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// Deduplicated candidate paper titles mined from generated text.
///
/// Uniqueness is exact string equality. Iteration is sorted so logs are
/// reproducible; callers must not attach meaning to the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TitleSet(BTreeSet<String>);

impl TitleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the exact title was already present.
    pub fn insert(&mut self, title: impl Into<String>) -> bool {
        self.0.insert(title.into())
    }

    pub fn contains(&self, title: &str) -> bool {
        self.0.contains(title)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TitleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for TitleSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for TitleSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Bibliographic sources that can resolve a title to a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Arxiv,
    SemanticScholar,
    IeeeXplore,
    AcmDigitalLibrary,
    PubMed,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Arxiv             => "arxiv",
            SourceKind::SemanticScholar   => "semanticscholar",
            SourceKind::IeeeXplore        => "ieee",
            SourceKind::AcmDigitalLibrary => "acm",
            SourceKind::PubMed            => "pubmed",
        }
    }

    /// Human-readable name used in download log lines.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Arxiv             => "arXiv",
            SourceKind::SemanticScholar   => "Semantic Scholar",
            SourceKind::IeeeXplore        => "IEEE Xplore",
            SourceKind::AcmDigitalLibrary => "ACM Digital Library",
            SourceKind::PubMed            => "PubMed",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The single most relevant hit a source returned for a title query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMatch {
    /// Stable source-specific identifier (arXiv short id, S2 paperId, DOI, …).
    /// Storage filenames derive from this, never from the query title.
    pub source_id: String,
    /// Title as the source reports it.
    pub title: String,
    /// Where the PDF can be fetched, if the source exposes one.
    pub pdf_url: Option<String>,
}

/// Final outcome for one candidate title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionResult {
    pub title: String,
    pub acquired: bool,
    /// Name of the strategy that resolved the title.
    pub source: Option<String>,
    pub stored_path: Option<PathBuf>,
}

impl AcquisitionResult {
    pub fn acquired(title: impl Into<String>, source: impl Into<String>, path: &Path) -> Self {
        Self {
            title: title.into(),
            acquired: true,
            source: Some(source.into()),
            stored_path: Some(path.to_path_buf()),
        }
    }

    pub fn unresolved(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            acquired: false,
            source: None,
            stored_path: None,
        }
    }
}
