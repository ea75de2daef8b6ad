//! Source-word coverage bitmaps. Positions are 1-based; 0 means "no word".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest sentence a [`Coverage`] can describe.
pub const MAX_SENTENCE_LEN: usize = 256;

const WORDS: usize = MAX_SENTENCE_LEN / 64;

/// Inclusive, 1-based source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start >= 1 && start <= end, "invalid span [{start},{end}]");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Zero-based slice range into the source words.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start - 1..self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coverage {
    bits: [u64; WORDS],
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pos: usize) -> bool {
        debug_assert!((1..=MAX_SENTENCE_LEN).contains(&pos));
        let i = pos - 1;
        self.bits[i / 64] & (1u64 << (i % 64)) != 0
    }

    pub fn insert(&mut self, pos: usize) {
        let i = pos - 1;
        self.bits[i / 64] |= 1u64 << (i % 64);
    }

    /// Copy with `span` added. The span must be uncovered.
    pub fn with_span(&self, span: Span) -> Self {
        debug_assert!(!self.intersects(span));
        let mut next = *self;
        for pos in span.start..=span.end {
            next.insert(pos);
        }
        next
    }

    pub fn intersects(&self, span: Span) -> bool {
        (span.start..=span.end).any(|p| self.contains(p))
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// True when exactly the positions `1..=len` are covered.
    pub fn is_complete(&self, len: usize) -> bool {
        self.count() == len && (1..=len).all(|p| self.contains(p))
    }

    pub fn first_uncovered(&self, len: usize) -> Option<usize> {
        (1..=len).find(|&p| !self.contains(p))
    }

    /// Maximal uncovered spans of a sentence of `len` words, left to right.
    pub fn gaps(&self, len: usize) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut start = None;
        for pos in 1..=len {
            match (self.contains(pos), start) {
                (false, None) => start = Some(pos),
                (true, Some(s)) => {
                    gaps.push(Span::new(s, pos - 1));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            gaps.push(Span::new(s, len));
        }
        gaps
    }

    pub fn positions(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        (1..=len).filter(move |&p| self.contains(p))
    }
}

impl fmt::Debug for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = (1..=MAX_SENTENCE_LEN)
            .rev()
            .find(|&p| self.contains(p))
            .unwrap_or(0);
        let bits: String = (1..=last)
            .map(|p| if self.contains(p) { '1' } else { '0' })
            .collect();
        write!(f, "Coverage({bits})")
    }
}
