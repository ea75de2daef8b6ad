//! Multi-stack phrase-based decoding.

pub mod constraints;
pub mod coverage;
mod decoder;
pub mod equivalence;
pub mod heuristic;
pub mod hypothesis;
pub mod options;
pub mod stack;

#[cfg(test)]
pub(crate) mod testutil;

#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::Serialize;

pub use constraints::{ConstraintError, LexicalConstraints, PrefixRequest, TargetConstraint};
pub use coverage::{Coverage, Span, MAX_SENTENCE_LEN};
pub use decoder::StackDecoder;
pub use hypothesis::AlignedPhrase;

use crate::scoring::ScoreComponents;
use crate::word_graph::WordGraph;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("source sentence is empty")]
    EmptySource,

    #[error("source sentence has {len} words, at most {max} are supported")]
    SentenceTooLong { len: usize, max: usize },

    #[error("bad constraint markup: {0}")]
    Constraint(#[from] ConstraintError),
}

/// How a search ended. Limits and coverage failures are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    Completed,
    EvaluationLimitExceeded,
    TimeLimitExceeded,
    /// Constrained decoding found no output matching the reference/prefix.
    NoCoverage,
    /// Free decoding found no complete hypothesis at all.
    Untranslatable,
}

impl DecodeStatus {
    pub fn is_limit(self) -> bool {
        matches!(
            self,
            DecodeStatus::EvaluationLimitExceeded | DecodeStatus::TimeLimitExceeded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub words: Vec<String>,
    /// Source span and target word range of each phrase, in output order.
    pub alignment: Vec<AlignedPhrase>,
    pub score: f64,
    #[serde(skip)]
    pub components: ScoreComponents,
    /// False when this is the best partial hypothesis.
    pub complete: bool,
}

impl Translation {
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub iterations: u64,
    pub expansions: u64,
    pub generated: u64,
    pub inserted: u64,
    pub recombined: u64,
    pub pruned: u64,
    pub constraint_rejected: u64,
    pub spans_without_options: u64,
    /// Hypotheses freed by arena sweeps.
    pub reclaimed: u64,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub status: DecodeStatus,
    /// Best complete hypothesis, or the best partial one when none exists.
    pub translation: Translation,
    pub stats: SearchStats,
    pub word_graph: Option<WordGraph>,
}
