//! Text chunking into overlapping passages with boundary-aware breaks

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;

/// One passage and its character span in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageSpan<'a> {
    /// Passage text, untrimmed
    pub text: &'a str,
    /// Start offset in characters
    pub start: usize,
    /// End offset in characters (exclusive)
    pub end: usize,
}

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum passage length in characters
    chunk_size: usize,
    /// Characters shared by consecutive passages
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker; overlap is clamped below the chunk size
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split text into passages
    ///
    /// The iterator is finite and can be cloned or recreated to restart.
    /// Whitespace-only text yields nothing.
    pub fn passages<'a>(&self, text: &'a str) -> Passages<'a> {
        Passages {
            text,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            cursor: 0,
            cursor_chars: 0,
            done: text.trim().is_empty(),
        }
    }
}

/// Iterator over the passages of one text
#[derive(Debug, Clone)]
pub struct Passages<'a> {
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    /// Byte offset where the next passage starts
    cursor: usize,
    /// Same position in characters
    cursor_chars: usize,
    done: bool,
}

impl<'a> Passages<'a> {
    fn next_span(&mut self) -> PassageSpan<'a> {
        let rest = &self.text[self.cursor..];
        let start = self.cursor_chars;

        let hard_end = match rest.char_indices().nth(self.chunk_size) {
            Some((idx, _)) => idx,
            None => {
                // Remainder fits in one passage
                self.done = true;
                return PassageSpan {
                    text: rest,
                    start,
                    end: start + rest.chars().count(),
                };
            }
        };

        let window = &rest[..hard_end];
        // A break must leave the passage longer than the overlap
        let min_chars = (self.chunk_size / 2).max(self.overlap + 1);
        let min_break = window
            .char_indices()
            .nth(min_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(hard_end);
        let end = find_break(window, min_break).unwrap_or(hard_end);

        let passage = &rest[..end];
        let passage_chars = passage.chars().count();
        let advance_chars = passage_chars - self.overlap;
        let advance_bytes = passage
            .char_indices()
            .nth(advance_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(end);

        self.cursor += advance_bytes;
        self.cursor_chars += advance_chars;

        PassageSpan {
            text: passage,
            start,
            end: start + passage_chars,
        }
    }
}

impl<'a> Iterator for Passages<'a> {
    type Item = PassageSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let span = self.next_span();
            if !span.text.trim().is_empty() {
                return Some(span);
            }
        }
        None
    }
}

/// Best break position (exclusive end) in `window` at or after `min_break`
///
/// Preference: paragraph break, line break, sentence boundary, whitespace.
fn find_break(window: &str, min_break: usize) -> Option<usize> {
    let tail = &window[min_break..];

    if let Some(pos) = tail.rfind("\n\n") {
        return Some(min_break + pos + 2);
    }

    if let Some(pos) = tail.rfind('\n') {
        return Some(min_break + pos + 1);
    }

    let sentence_end = window
        .split_sentence_bound_indices()
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0 && idx >= min_break)
        .last();
    if sentence_end.is_some() {
        return sentence_end;
    }

    tail.char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(pos, c)| min_break + pos + c.len_utf8())
}
