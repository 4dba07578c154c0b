//! Word-window chunker for retrieval passages.

/// Configuration for the chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum words per passage.
    pub window_words: usize,
    /// Words shared between consecutive passages.
    pub overlap_words: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_words: 200,
            overlap_words: 40,
        }
    }
}

/// Split `text` into overlapping word windows. Whitespace is collapsed.
/// Empty input yields no passages.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let window = config.window_words.max(1);
    // Overlap must leave the window room to advance.
    let step = window - config.overlap_words.min(window - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}
