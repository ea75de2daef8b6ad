//! Model collaborators of the decoder: phrase table, language model and
//! word-penalty model, each behind a trait so implementations can be swapped
//! at runtime through [`ModelRegistry`].

pub mod ngram;
pub(crate) mod persist;
pub mod phrase_table;
pub mod registry;
pub mod word_penalty;

#[cfg(test)]
mod tests;

use std::io;
use std::path::Path;

pub use ngram::NgramLanguageModel;
pub use phrase_table::MemoryPhraseTable;
pub use registry::ModelRegistry;
pub use word_penalty::GeometricWordPenalty;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected {expected})")]
    InvalidMagic { expected: &'static str },

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("model kind {0:?} is not registered")]
    UnknownKind(String),

    #[error("{0} model does not support online training")]
    NotTrainable(&'static str),
}

/// Direct and inverse phrase translation log-probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseScores {
    /// ln p(target | source)
    pub direct: f64,
    /// ln p(source | target)
    pub inverse: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhraseEntry {
    pub target: Vec<String>,
    pub scores: PhraseScores,
    pub count: f64,
}

pub trait PhraseTable: Send + Sync {
    fn kind(&self) -> &'static str;

    /// Every known translation of `source`, in table order.
    fn options_for_span(&self, source: &[String]) -> Vec<PhraseEntry>;

    /// Scores for an arbitrary pair; unseen pairs get a smoothed finite value.
    fn score_for_pair(&self, source: &[String], target: &[String]) -> PhraseScores;

    /// Whether [`train_pair`](Self::train_pair) can succeed.
    fn trainable(&self) -> bool {
        false
    }

    fn train_pair(&mut self, _source: &[String], _target: &[String]) -> Result<(), ModelError> {
        Err(ModelError::NotTrainable(self.kind()))
    }

    fn save(&self, path: &Path) -> Result<(), ModelError>;
}

/// Opaque language-model history. Two states compare equal exactly when the
/// model would score every continuation identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LmState(Vec<u32>);

impl LmState {
    pub fn new(history: Vec<u32>) -> Self {
        Self(history)
    }

    pub fn history(&self) -> &[u32] {
        &self.0
    }
}

pub trait LanguageModel: Send + Sync {
    fn kind(&self) -> &'static str;

    fn order(&self) -> usize;

    /// State at the start of a sentence.
    fn initial_state(&self) -> LmState;

    /// State with no history at all, used to score phrases out of context.
    fn context_free_state(&self) -> LmState {
        LmState::default()
    }

    fn score_and_advance(&self, state: &LmState, word: &str) -> (f64, LmState);

    /// Log-probability of ending the sentence in `state`.
    fn end_score(&self, state: &LmState) -> f64;

    fn trainable(&self) -> bool {
        false
    }

    fn train_sentence(&mut self, _words: &[String]) -> Result<(), ModelError> {
        Err(ModelError::NotTrainable(self.kind()))
    }

    fn save(&self, path: &Path) -> Result<(), ModelError>;
}

pub trait WordPenaltyModel: Send + Sync {
    /// Log-probability of a target sentence with `len` words.
    fn score_for_length(&self, len: usize) -> f64;
}

/// The shared, read-only-while-decoding bundle of models.
pub struct ModelSet {
    pub phrase_table: Box<dyn PhraseTable>,
    pub lm: Box<dyn LanguageModel>,
    pub word_penalty: Box<dyn WordPenaltyModel>,
}

impl ModelSet {
    pub fn new(
        phrase_table: Box<dyn PhraseTable>,
        lm: Box<dyn LanguageModel>,
        word_penalty: Box<dyn WordPenaltyModel>,
    ) -> Self {
        Self {
            phrase_table,
            lm,
            word_penalty,
        }
    }

    /// Online update from one sentence pair: the target sentence feeds the
    /// language model, and the whole pair becomes a phrase entry when the
    /// source fits in `max_phrase_len` words. Nothing changes unless both
    /// models accept the update.
    pub fn train_pair(
        &mut self,
        source: &[String],
        target: &[String],
        max_phrase_len: usize,
    ) -> Result<(), ModelError> {
        let add_phrase =
            !source.is_empty() && !target.is_empty() && source.len() <= max_phrase_len;
        if !self.lm.trainable() {
            return Err(ModelError::NotTrainable(self.lm.kind()));
        }
        if add_phrase && !self.phrase_table.trainable() {
            return Err(ModelError::NotTrainable(self.phrase_table.kind()));
        }
        self.lm.train_sentence(target)?;
        if add_phrase {
            self.phrase_table.train_pair(source, target)?;
        }
        tracing::debug!(
            src_len = source.len(),
            trg_len = target.len(),
            "trained sentence pair"
        );
        Ok(())
    }
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("phrase_table", &self.phrase_table.kind())
            .field("lm", &self.lm.kind())
            .field("lm_order", &self.lm.order())
            .finish()
    }
}
