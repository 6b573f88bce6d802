use filing_common::{FilingError, FilingResult};

/// Break preferences, strongest first. A tier wins when its last occurrence
/// falls in the back half of the window.
const BREAK_TIERS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum chunk length in bytes.
    pub max_len: usize,
    /// Bytes shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_len: 2000,
            overlap: 15,
        }
    }
}

/// A borrowed slice of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// 0-based position within the source, gapless.
    pub seq: usize,
    /// Byte offset of `text` in the source.
    pub start: usize,
    pub text: &'a str,
}

impl TextChunk<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Splits text into bounded, overlapping chunks that prefer natural breaks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkConfig,
}

impl TextChunker {
    pub fn new(config: ChunkConfig) -> FilingResult<Self> {
        if config.max_len == 0 {
            return Err(FilingError::Chunking("max_len must be positive".into()));
        }
        if config.overlap >= config.max_len {
            return Err(FilingError::Chunking(format!(
                "overlap ({}) must be smaller than max_len ({})",
                config.overlap, config.max_len
            )));
        }
        Ok(Self { config })
    }

    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            config: self.config,
            pos: 0,
            seq: 0,
        }
    }
}

/// Lazy chunk sequence over one text. Single pass.
#[derive(Debug)]
pub struct Chunks<'a> {
    text: &'a str,
    config: ChunkConfig,
    pos: usize,
    seq: usize,
}

impl<'a> Chunks<'a> {
    fn break_point(&self, start: usize, hard_end: usize) -> usize {
        let min_end = start + ((hard_end - start) / 2).max(self.config.overlap + 1);
        if min_end >= hard_end {
            return hard_end;
        }

        let window = &self.text[start..hard_end];
        for tier in BREAK_TIERS {
            let candidate = tier
                .iter()
                .filter_map(|sep| window.rfind(sep).map(|i| start + i + sep.len()))
                .max();
            if let Some(end) = candidate.filter(|&end| end >= min_end) {
                return end;
            }
        }
        hard_end
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.text.len();
        if self.pos >= len {
            return None;
        }

        let start = self.pos;
        let mut hard_end = floor_char_boundary(self.text, (start + self.config.max_len).min(len));
        if hard_end <= start {
            // A single char wider than max_len.
            hard_end = ceil_char_boundary(self.text, start + 1);
        }

        let end = if hard_end == len {
            len
        } else {
            self.break_point(start, hard_end)
        };

        self.pos = if end >= len {
            len
        } else {
            let back = floor_char_boundary(self.text, end.saturating_sub(self.config.overlap));
            if back > start {
                back
            } else {
                end
            }
        };

        let chunk = TextChunk {
            seq: self.seq,
            start,
            text: &self.text[start..end],
        };
        self.seq += 1;
        Some(chunk)
    }
}

/// Rebuild the source text from its chunks, dropping each chunk's overlap
/// with its predecessor.
pub fn reassemble(chunks: &[TextChunk<'_>]) -> String {
    let mut out = String::new();
    let mut covered: usize = 0;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start).min(chunk.text.len());
        out.push_str(&chunk.text[skip..]);
        covered = covered.max(chunk.end());
    }
    out
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
