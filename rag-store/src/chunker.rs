//! Document chunking strategies.
//!
//! Offsets and lengths are counted in characters (Unicode scalar values), so
//! a chunk boundary never falls inside a multi-byte UTF-8 sequence.
//!
//! - [`FixedWindowChunker`] slides a `max_len` window forward by
//!   `max_len - overlap` until the window start passes the end of the text.
//! - [`RecursiveChunker`] prefers paragraph, then line, then word boundaries
//!   and only cuts mid-word when a single word is longer than `max_len`.

use std::collections::BTreeMap;

use crate::errors::RagError;
use crate::record::{Chunk, META_CHUNK_INDEX, META_SOURCE, META_START_CHAR};

/// Validated window parameters shared by every strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkerConfig {
    max_len: usize,
    overlap: usize,
}

impl ChunkerConfig {
    /// Requires `0 < overlap < max_len`.
    pub fn new(max_len: usize, overlap: usize) -> Result<Self, RagError> {
        if max_len == 0 {
            return Err(RagError::Config("chunk max_len must be > 0".into()));
        }
        if overlap == 0 || overlap >= max_len {
            return Err(RagError::Config(format!(
                "chunk overlap must satisfy 0 < overlap < max_len (got overlap={overlap}, max_len={max_len})"
            )));
        }
        Ok(Self { max_len, overlap })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.max_len - self.overlap
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_len: 1000,
            overlap: 200,
        }
    }
}

/// Contiguous slice of the input: char offset + owned text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    pub start: usize,
    pub text: String,
}

/// A strategy for splitting text into chunks.
pub trait Chunker: Send + Sync {
    /// Splits `text` into ordered pieces. Must be deterministic.
    fn split(&self, text: &str) -> Vec<Piece>;

    /// Splits `text` and stamps `source`, `chunk_index` and `start_char`.
    fn chunk_document(&self, source: Option<&str>, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(order, piece)| {
                let mut metadata = BTreeMap::new();
                if let Some(src) = source {
                    metadata.insert(META_SOURCE.to_string(), src.to_string());
                }
                metadata.insert(META_CHUNK_INDEX.to_string(), order.to_string());
                metadata.insert(META_START_CHAR.to_string(), piece.start.to_string());
                Chunk {
                    id: None,
                    text: piece.text,
                    metadata,
                    order,
                    start: piece.start,
                }
            })
            .collect()
    }
}

/// Which [`Chunker`] to build from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkStrategy {
    #[default]
    Fixed,
    Recursive,
}

impl std::str::FromStr for ChunkStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "window" => Ok(Self::Fixed),
            "recursive" => Ok(Self::Recursive),
            other => Err(RagError::Config(format!("unknown chunk strategy `{other}`"))),
        }
    }
}

impl ChunkStrategy {
    pub fn build(self, cfg: ChunkerConfig) -> Box<dyn Chunker> {
        match self {
            ChunkStrategy::Fixed => Box::new(FixedWindowChunker::new(cfg)),
            ChunkStrategy::Recursive => Box::new(RecursiveChunker::new(cfg)),
        }
    }
}

/// Splits `text` into windows of `max_len` chars overlapping by `overlap`.
///
/// # Errors
/// [`RagError::Config`] unless `0 < overlap < max_len`.
pub fn chunk(text: &str, max_len: usize, overlap: usize) -> Result<Vec<Chunk>, RagError> {
    let cfg = ChunkerConfig::new(max_len, overlap)?;
    Ok(FixedWindowChunker::new(cfg).chunk_document(None, text))
}

/// Byte offset of every char boundary, plus `text.len()` as the final entry.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

#[derive(Clone, Debug)]
pub struct FixedWindowChunker {
    cfg: ChunkerConfig,
}

impl FixedWindowChunker {
    pub fn new(cfg: ChunkerConfig) -> Self {
        Self { cfg }
    }
}

impl Chunker for FixedWindowChunker {
    fn split(&self, text: &str) -> Vec<Piece> {
        let bounds = char_boundaries(text);
        let len = bounds.len() - 1;
        let mut out = Vec::with_capacity(len.div_ceil(self.cfg.step()).max(1));
        let mut pos = 0;
        while pos < len {
            let end = (pos + self.cfg.max_len).min(len);
            out.push(Piece {
                start: pos,
                text: text[bounds[pos]..bounds[end]].to_string(),
            });
            pos += self.cfg.step();
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct RecursiveChunker {
    cfg: ChunkerConfig,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(cfg: ChunkerConfig) -> Self {
        Self {
            cfg,
            separators: vec!["\n\n".into(), "\n".into(), " ".into()],
        }
    }

    /// Breaks `text` into contiguous atoms no longer than `max_len` chars.
    fn atoms(&self, text: &str, base: usize, level: usize, out: &mut Vec<Piece>) {
        let len = text.chars().count();
        if len <= self.cfg.max_len {
            if len > 0 {
                out.push(Piece {
                    start: base,
                    text: text.to_string(),
                });
            }
            return;
        }

        let Some(sep) = self.separators.get(level) else {
            // No separator left: hard cut into non-overlapping windows.
            let bounds = char_boundaries(text);
            let mut pos = 0;
            while pos < len {
                let end = (pos + self.cfg.max_len).min(len);
                out.push(Piece {
                    start: base + pos,
                    text: text[bounds[pos]..bounds[end]].to_string(),
                });
                pos = end;
            }
            return;
        };

        let mut offset = base;
        for segment in text.split_inclusive(sep.as_str()) {
            let seg_len = segment.chars().count();
            self.atoms(segment, offset, level + 1, out);
            offset += seg_len;
        }
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<Piece> {
        let mut atoms = Vec::new();
        self.atoms(text, 0, 0, &mut atoms);

        let mut out = Vec::new();
        let mut window: Vec<(usize, String, usize)> = Vec::new();
        let mut window_len = 0usize;

        let flush = |window: &[(usize, String, usize)], out: &mut Vec<Piece>| {
            if let Some((start, _, _)) = window.first() {
                out.push(Piece {
                    start: *start,
                    text: window.iter().map(|(_, t, _)| t.as_str()).collect(),
                });
            }
        };

        for atom in atoms {
            let atom_len = atom.text.chars().count();
            if window_len + atom_len > self.cfg.max_len && !window.is_empty() {
                flush(&window, &mut out);
                // Keep a tail of at most `overlap` chars that still leaves room for the atom.
                while !window.is_empty()
                    && (window_len > self.cfg.overlap || window_len + atom_len > self.cfg.max_len)
                {
                    let (_, _, l) = window.remove(0);
                    window_len -= l;
                }
            }
            window_len += atom_len;
            window.push((atom.start, atom.text, atom_len));
        }
        flush(&window, &mut out);
        out
    }
}
