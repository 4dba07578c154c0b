//! Flat, id-addressed PDF storage.
//!
//! Files are named `<source-id>.pdf`. A file's presence is the only record of
//! a successful acquisition; writing the same id twice is a no-op for callers
//! that check [`PdfStore::contains`] first, so no locking is needed.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PdfStore {
    dir: PathBuf,
}

impl PdfStore {
    /// Use `dir` as the storage directory. The directory must already exist;
    /// see [`PdfStore::open`] to create it.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create `dir` (and parents) if needed and use it as the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem-safe file name for a source identifier.
    pub fn file_name_for(source_id: &str) -> String {
        let safe: String = source_id
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{safe}.pdf")
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir.join(Self::file_name_for(source_id))
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.path_for(source_id).is_file()
    }

    /// Write `bytes` under the file name derived from `source_id`.
    /// The data lands in a temp file in the same directory first and is
    /// renamed into place, so a failed write never leaves a partial PDF.
    pub fn save(&self, source_id: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.path_for(source_id);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), bytes = bytes.len(), "PDF stored");
        Ok(path)
    }

    /// All stored PDFs, sorted by path.
    pub fn list(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut pdfs: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
            .collect();
        pdfs.sort();
        Ok(pdfs)
    }
}
