//! Count-based n-gram language model with Jelinek-Mercer interpolation.
//!
//! `p(w | h) = λ · c(h w) / c(h) + (1 - λ) · p(w | h')`, where `h'` drops the
//! oldest word of `h`; the recursion bottoms out in a unigram estimate mixed
//! with a uniform distribution, so unseen words still get a finite score.

use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::persist;
use super::{LanguageModel, LmState, ModelError};

pub(crate) const MAGIC: &[u8; 4] = b"SDLM";
pub(crate) const VERSION: u8 = 1;

pub const UNK_ID: u32 = 0;
pub const BOS_ID: u32 = 1;
pub const EOS_ID: u32 = 2;

const SPECIAL_WORDS: [&str; 3] = ["<unk>", "<s>", "</s>"];

#[derive(Debug, Clone)]
pub struct NgramLanguageModel {
    order: usize,
    lambda: f64,
    vocab: HashMap<String, u32>,
    words: Vec<String>,
    /// Counts of every n-gram with 1 <= n <= order.
    counts: HashMap<Vec<u32>, u32>,
    /// Sum of counts of the n-grams extending each context.
    context_counts: HashMap<Vec<u32>, u32>,
    total: u64,
}

#[derive(Serialize, Deserialize)]
struct NgramData {
    order: usize,
    lambda: f64,
    words: Vec<String>,
    counts: Vec<(Vec<u32>, u32)>,
}

impl NgramLanguageModel {
    pub fn new(order: usize, lambda: f64) -> Self {
        let words: Vec<String> = SPECIAL_WORDS.iter().map(|w| w.to_string()).collect();
        let vocab = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self {
            order: order.max(1),
            lambda,
            vocab,
            words,
            counts: HashMap::new(),
            context_counts: HashMap::new(),
            total: 0,
        }
    }

    /// Train on a tokenized corpus, one sentence per line.
    pub fn from_corpus<R: BufRead>(reader: R, order: usize, lambda: f64) -> Result<Self, ModelError> {
        let mut lm = Self::new(order, lambda);
        for line in reader.lines() {
            let line = line?;
            let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if !words.is_empty() {
                lm.add_sentence(&words);
            }
        }
        Ok(lm)
    }

    pub fn vocab_size(&self) -> usize {
        self.words.len()
    }

    pub fn word_id(&self, word: &str) -> u32 {
        self.vocab.get(word).copied().unwrap_or(UNK_ID)
    }

    fn intern(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.vocab.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.vocab.insert(word.to_string(), id);
        id
    }

    pub fn add_sentence(&mut self, words: &[String]) {
        let mut seq = Vec::with_capacity(words.len() + 2);
        seq.push(BOS_ID);
        for w in words {
            let id = self.intern(w);
            seq.push(id);
        }
        seq.push(EOS_ID);

        for i in 1..seq.len() {
            for n in 1..=self.order.min(i + 1) {
                let gram = &seq[i + 1 - n..=i];
                self.bump(gram, 1);
            }
        }
    }

    fn bump(&mut self, gram: &[u32], count: u32) {
        *self.counts.entry(gram.to_vec()).or_default() += count;
        if gram.len() == 1 {
            self.total += u64::from(count);
        } else {
            *self
                .context_counts
                .entry(gram[..gram.len() - 1].to_vec())
                .or_default() += count;
        }
    }

    /// Interpolated probability of `word` after `history` (oldest first).
    pub fn prob(&self, history: &[u32], word: u32) -> f64 {
        let uniform = 1.0 / self.vocab_size() as f64;
        let mut p = if self.total == 0 {
            uniform
        } else {
            let c = self.counts.get([word].as_slice()).copied().unwrap_or(0);
            self.lambda * f64::from(c) / self.total as f64 + (1.0 - self.lambda) * uniform
        };

        let mut gram = Vec::with_capacity(history.len() + 1);
        for k in 1..=history.len() {
            let ctx = &history[history.len() - k..];
            let Some(&cc) = self.context_counts.get(ctx) else {
                break;
            };
            gram.clear();
            gram.extend_from_slice(ctx);
            gram.push(word);
            let c = self.counts.get(&gram).copied().unwrap_or(0);
            p = self.lambda * f64::from(c) / f64::from(cc) + (1.0 - self.lambda) * p;
        }
        p
    }

    fn advance(&self, state: &LmState, word: u32) -> LmState {
        let keep = self.order - 1;
        let mut hist: Vec<u32> = state.history().to_vec();
        hist.push(word);
        if hist.len() > keep {
            hist.drain(..hist.len() - keep);
        }
        LmState::new(hist)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let mut counts: Vec<(Vec<u32>, u32)> =
            self.counts.iter().map(|(g, c)| (g.clone(), *c)).collect();
        counts.sort();
        let data = NgramData {
            order: self.order,
            lambda: self.lambda,
            words: self.words.clone(),
            counts,
        };
        let body = bincode::serialize(&data).map_err(ModelError::Serialize)?;
        Ok(persist::frame(MAGIC, VERSION, &body))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let body = persist::unframe(bytes, MAGIC, VERSION)?;
        let data: NgramData = bincode::deserialize(body).map_err(ModelError::Deserialize)?;
        let mut lm = Self::new(data.order, data.lambda);
        for w in data.words.iter().skip(SPECIAL_WORDS.len()) {
            lm.intern(w);
        }
        for (gram, count) in data.counts {
            lm.bump(&gram, count);
        }
        Ok(lm)
    }

    /// Open a binary model, or train one from a plain-text corpus.
    pub fn open(path: &Path, order: usize, lambda: f64) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        let lm = if persist::has_magic(&bytes, MAGIC) {
            Self::from_bytes(&bytes)?
        } else {
            Self::from_corpus(bytes.as_slice(), order, lambda)?
        };
        tracing::info!(
            path = %path.display(),
            order = lm.order,
            vocab = lm.vocab_size(),
            ngrams = lm.counts.len(),
            "loaded language model"
        );
        Ok(lm)
    }
}

impl LanguageModel for NgramLanguageModel {
    fn kind(&self) -> &'static str {
        "ngram"
    }

    fn order(&self) -> usize {
        self.order
    }

    fn initial_state(&self) -> LmState {
        if self.order == 1 {
            LmState::default()
        } else {
            LmState::new(vec![BOS_ID])
        }
    }

    fn score_and_advance(&self, state: &LmState, word: &str) -> (f64, LmState) {
        let id = self.word_id(word);
        let lp = self.prob(state.history(), id).ln();
        (lp, self.advance(state, id))
    }

    fn end_score(&self, state: &LmState) -> f64 {
        self.prob(state.history(), EOS_ID).ln()
    }

    fn trainable(&self) -> bool {
        true
    }

    fn train_sentence(&mut self, words: &[String]) -> Result<(), ModelError> {
        if !words.is_empty() {
            self.add_sentence(words);
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        persist::atomic_write(path, &self.to_bytes()?)
    }
}
