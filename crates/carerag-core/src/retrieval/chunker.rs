//! Document chunking strategies
//!
//! All sizes are counted in characters, not bytes, so chunk boundaries
//! never land inside a multi-byte character.

use regex::Regex;

use super::error::{RetrievalError, RetrievalResult};
use super::types::TextChunk;

/// Blank line: newline, optional whitespace, newline
const PARAGRAPH_SEPARATOR: &str = r"\n\s*\n";

/// A way of cutting source text into retrievable chunks
pub trait ChunkStrategy: Send + Sync {
    /// Split text into ordered chunks
    fn chunk(&self, text: &str) -> Vec<TextChunk>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Fixed-size windows advancing by `size - overlap` characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindowChunker {
    size: usize,
    overlap: usize,
}

impl FixedWindowChunker {
    /// Create a chunker; `size` must be positive and larger than `overlap`
    pub fn new(size: usize, overlap: usize) -> RetrievalResult<Self> {
        if size == 0 {
            return Err(RetrievalError::Configuration(
                "chunk size must be greater than zero".into(),
            ));
        }
        if overlap >= size {
            return Err(RetrievalError::Configuration(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Window the text, returning plain strings
    pub fn split(&self, text: &str) -> Vec<String> {
        // Byte offset of every char, plus the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = bounds.len() - 1;
        let step = self.size - self.overlap;

        let mut windows = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;
        while start < char_count {
            let end = (start + self.size).min(char_count);
            windows.push(text[bounds[start]..bounds[end]].to_string());
            start += step;
        }
        windows
    }
}

impl ChunkStrategy for FixedWindowChunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| TextChunk { content, index })
            .collect()
    }

    fn name(&self) -> &'static str {
        "fixed-window"
    }
}

/// Split `text` into overlapping windows of `size` characters
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> RetrievalResult<Vec<String>> {
    Ok(FixedWindowChunker::new(size, overlap)?.split(text))
}

/// Blank-line paragraph splitting with a noise filter
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    separator: Regex,
    min_chars: usize,
}

impl ParagraphChunker {
    /// Fragments of `min_chars` characters or fewer (after trimming) are dropped
    pub fn new(min_chars: usize) -> RetrievalResult<Self> {
        Self::with_separator(PARAGRAPH_SEPARATOR, min_chars)
    }

    /// Use a custom separator pattern, e.g. `\x0c` for page breaks
    pub fn with_separator(pattern: &str, min_chars: usize) -> RetrievalResult<Self> {
        let separator = Regex::new(pattern).map_err(|e| {
            RetrievalError::Configuration(format!("invalid paragraph separator: {}", e))
        })?;
        Ok(Self {
            separator,
            min_chars,
        })
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }
}

impl ChunkStrategy for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<TextChunk> {
        self.separator
            .split(text)
            .map(str::trim)
            .filter(|p| p.chars().count() > self.min_chars)
            .enumerate()
            .map(|(index, p)| TextChunk {
                content: p.to_string(),
                index,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undo the overlap: keep the first window whole, then drop the
    /// leading `overlap` chars of every later window.
    fn reconstruct(windows: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, w) in windows.iter().enumerate() {
            if i == 0 {
                out.push_str(w);
            } else {
                out.extend(w.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_windows_overlap_by_exactly_overlap() {
        let windows = chunk_text("abcdefghij", 4, 2).unwrap();
        assert_eq!(windows, vec!["abcd", "cdef", "efgh", "ghij", "ij"]);

        for (size, overlap) in [(4, 2), (5, 2), (6, 1), (7, 4)] {
            let windows = chunk_text("abcdefghijklmnop", size, overlap).unwrap();
            for pair in windows.windows(2) {
                // The next window starts `size - overlap` chars into this one
                let tail: String = pair[0].chars().skip(size - overlap).collect();
                let head: String = pair[1].chars().take(overlap).collect();
                assert_eq!(
                    tail.chars().take(overlap).collect::<String>(),
                    head,
                    "size={} overlap={}",
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn test_reconstruction_for_many_parameters() {
        let text = "The quick brown fox jumps over the lazy dog. 糖尿病の予防 ✓ done.";
        for size in 1..12 {
            for overlap in 0..size {
                let windows = chunk_text(text, size, overlap).unwrap();
                assert_eq!(
                    reconstruct(&windows, overlap),
                    text,
                    "size={} overlap={}",
                    size,
                    overlap
                );
            }
        }
    }

    #[test]
    fn test_zero_overlap_tiles() {
        let windows = chunk_text("abcdefg", 3, 0).unwrap();
        assert_eq!(windows, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_short_and_empty_text() {
        assert_eq!(chunk_text("short", 800, 150).unwrap(), vec!["short"]);
        assert!(chunk_text("", 800, 150).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            chunk_text("abc", 4, 4),
            Err(RetrievalError::Configuration(_))
        ));
        assert!(matches!(
            chunk_text("abc", 4, 9),
            Err(RetrievalError::Configuration(_))
        ));
        assert!(matches!(
            FixedWindowChunker::new(0, 0),
            Err(RetrievalError::Configuration(_))
        ));
    }

    #[test]
    fn test_multibyte_windows_are_char_sized() {
        let windows = chunk_text("血糖値血糖値", 4, 1).unwrap();
        assert_eq!(windows[0], "血糖値血");
        assert!(windows.iter().all(|w| w.chars().count() <= 4));
    }

    #[test]
    fn test_fixed_window_chunks_are_numbered() {
        let chunker = FixedWindowChunker::new(3, 1).unwrap();
        let chunks = chunker.chunk("abcdefg");
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(chunks[1].content, "cde");
        // The last window starts before the end and is clipped
        assert_eq!(chunks[3].content, "g");
    }

    #[test]
    fn test_paragraphs_drop_noise() {
        let chunker = ParagraphChunker::new(20).unwrap();
        let text = "Patient risk summary: elevated glucose.\n\n  3  \n\n\
                    Recommended daily walking of thirty minutes.\n \n\nPage 2";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "Patient risk summary: elevated glucose.");
        assert_eq!(chunks[1].content, "Recommended daily walking of thirty minutes.");
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn test_paragraph_threshold_is_exclusive() {
        let chunker = ParagraphChunker::new(5).unwrap();
        let chunks = chunker.chunk("12345\n\n123456");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "123456");
    }

    #[test]
    fn test_custom_separator() {
        let chunker = ParagraphChunker::with_separator(r"\x0c", 0).unwrap();
        let chunks = chunker.chunk("page one\x0cpage two");
        assert_eq!(chunks.len(), 2);
        assert!(ParagraphChunker::with_separator("(", 0).is_err());
    }

    #[test]
    fn test_strategies_are_interchangeable() {
        let strategies: Vec<Box<dyn ChunkStrategy>> = vec![
            Box::new(FixedWindowChunker::new(10, 2).unwrap()),
            Box::new(ParagraphChunker::new(0).unwrap()),
        ];
        for strategy in &strategies {
            assert!(!strategy.chunk("some text\n\nmore text").is_empty());
        }
    }
}
