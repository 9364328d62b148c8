//! Overlapping text chunking with best-effort sentence alignment

/// Text chunker with configurable window size and overlap ratio.
///
/// Chunk boundaries prefer to land after `.`, `!`, or `?` followed by
/// whitespace, searching backward only within the last half of the window.
/// Inputs without punctuation fall back to hard character cuts, so chunk
/// sizes are a target, not a guarantee.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks, as a ratio of chunk size
    overlap_ratio: f64,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap_ratio: f64) -> Self {
        Self {
            chunk_size: chunk_size.max(2),
            overlap_ratio: overlap_ratio.clamp(0.0, 0.5),
        }
    }

    /// Overlap in characters
    pub fn overlap_chars(&self) -> usize {
        (self.overlap_ratio * self.chunk_size as f64) as usize
    }

    /// Split text into overlapping chunks.
    ///
    /// Text at most `chunk_size` characters long comes back as a single
    /// chunk, unchanged. Whitespace-only windows are dropped.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let overlap = self.overlap_chars();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < chars.len() {
            let hard_end = (start + self.chunk_size).min(chars.len());
            let mut end = hard_end;

            if hard_end < chars.len() {
                // Bound the backward search to the last half of the window
                let search_floor = start + self.chunk_size / 2;
                let mut i = hard_end;
                while i > search_floor {
                    let c = chars[i - 1];
                    if matches!(c, '.' | '!' | '?')
                        && chars.get(i).is_some_and(|n| n.is_whitespace())
                    {
                        end = i;
                        break;
                    }
                    i -= 1;
                }
            }

            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                chunks.push(chunk);
            }

            if end >= chars.len() {
                break;
            }
            start = end.saturating_sub(overlap).max(start + 1);
        }

        chunks
    }
}
