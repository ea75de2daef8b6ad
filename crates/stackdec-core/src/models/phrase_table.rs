//! Count-based in-memory phrase table.
//!
//! Text format, one pair per line (count defaults to 1):
//!
//! ```text
//! la casa ||| the house ||| 3
//! casa ||| house
//! ```
//!
//! Binary format: `SDPT` magic + version byte + bincode body.

use std::collections::HashMap;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::persist;
use super::{ModelError, PhraseEntry, PhraseScores, PhraseTable};

pub(crate) const MAGIC: &[u8; 4] = b"SDPT";
pub(crate) const VERSION: u8 = 1;

/// Probability given to pairs the table has never seen.
const SMOOTHING_PROB: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct MemoryPhraseTable {
    /// Source phrase -> (target phrase, joint count), in insertion order.
    entries: HashMap<Vec<String>, Vec<(Vec<String>, f64)>>,
    src_counts: HashMap<Vec<String>, f64>,
    trg_counts: HashMap<Vec<String>, f64>,
    smoothed: f64,
}

#[derive(Serialize, Deserialize)]
struct PhraseTableData {
    pairs: Vec<(Vec<String>, Vec<String>, f64)>,
}

impl Default for MemoryPhraseTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPhraseTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            src_counts: HashMap::new(),
            trg_counts: HashMap::new(),
            smoothed: SMOOTHING_PROB.ln(),
        }
    }

    /// Add `count` observations of a pair.
    pub fn add_pair(&mut self, source: &[String], target: &[String], count: f64) {
        let targets = self.entries.entry(source.to_vec()).or_default();
        match targets.iter_mut().find(|(t, _)| t.as_slice() == target) {
            Some((_, c)) => *c += count,
            None => targets.push((target.to_vec(), count)),
        }
        *self.src_counts.entry(source.to_vec()).or_default() += count;
        *self.trg_counts.entry(target.to_vec()).or_default() += count;
    }

    pub fn num_sources(&self) -> usize {
        self.entries.len()
    }

    pub fn num_pairs(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    fn scores(&self, source: &[String], target: &[String], joint: f64) -> PhraseScores {
        let src = self.src_counts.get(source).copied().unwrap_or(0.0);
        let trg = self.trg_counts.get(target).copied().unwrap_or(0.0);
        if joint <= 0.0 || src <= 0.0 || trg <= 0.0 {
            return PhraseScores {
                direct: self.smoothed,
                inverse: self.smoothed,
            };
        }
        PhraseScores {
            direct: (joint / src).ln(),
            inverse: (joint / trg).ln(),
        }
    }

    /// Parse the `src ||| trg [||| count]` text format.
    pub fn from_text<R: BufRead>(reader: R) -> Result<Self, ModelError> {
        let mut table = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
            if fields.len() < 2 || fields.len() > 3 {
                return Err(ModelError::Parse {
                    line: idx + 1,
                    reason: "expected `source ||| target [||| count]`".to_string(),
                });
            }
            let source = split_words(fields[0]);
            let target = split_words(fields[1]);
            if source.is_empty() || target.is_empty() {
                return Err(ModelError::Parse {
                    line: idx + 1,
                    reason: "empty phrase".to_string(),
                });
            }
            let count = match fields.get(2) {
                Some(raw) => raw.parse::<f64>().map_err(|e| ModelError::Parse {
                    line: idx + 1,
                    reason: format!("bad count {raw:?}: {e}"),
                })?,
                None => 1.0,
            };
            if !(count > 0.0 && count.is_finite()) {
                return Err(ModelError::Parse {
                    line: idx + 1,
                    reason: format!("count must be positive, got {count}"),
                });
            }
            table.add_pair(&source, &target, count);
        }
        Ok(table)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let mut pairs = Vec::with_capacity(self.num_pairs());
        let mut sources: Vec<&Vec<String>> = self.entries.keys().collect();
        sources.sort();
        for src in sources {
            for (trg, count) in &self.entries[src] {
                pairs.push((src.clone(), trg.clone(), *count));
            }
        }
        let body = bincode::serialize(&PhraseTableData { pairs }).map_err(ModelError::Serialize)?;
        Ok(persist::frame(MAGIC, VERSION, &body))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let body = persist::unframe(bytes, MAGIC, VERSION)?;
        let data: PhraseTableData = bincode::deserialize(body).map_err(ModelError::Deserialize)?;
        let mut table = Self::new();
        for (src, trg, count) in data.pairs {
            table.add_pair(&src, &trg, count);
        }
        Ok(table)
    }

    /// Open either format, sniffing the magic bytes.
    pub fn open(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        let table = if persist::has_magic(&bytes, MAGIC) {
            Self::from_bytes(&bytes)?
        } else {
            Self::from_text(bytes.as_slice())?
        };
        tracing::info!(
            path = %path.display(),
            sources = table.num_sources(),
            pairs = table.num_pairs(),
            "loaded phrase table"
        );
        Ok(table)
    }
}

impl PhraseTable for MemoryPhraseTable {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn options_for_span(&self, source: &[String]) -> Vec<PhraseEntry> {
        let Some(targets) = self.entries.get(source) else {
            return Vec::new();
        };
        targets
            .iter()
            .map(|(target, count)| PhraseEntry {
                target: target.clone(),
                scores: self.scores(source, target, *count),
                count: *count,
            })
            .collect()
    }

    fn score_for_pair(&self, source: &[String], target: &[String]) -> PhraseScores {
        let joint = self
            .entries
            .get(source)
            .and_then(|targets| targets.iter().find(|(t, _)| t.as_slice() == target))
            .map(|(_, c)| *c)
            .unwrap_or(0.0);
        self.scores(source, target, joint)
    }

    fn trainable(&self) -> bool {
        true
    }

    fn train_pair(&mut self, source: &[String], target: &[String]) -> Result<(), ModelError> {
        self.add_pair(source, target, 1.0);
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        persist::atomic_write(path, &self.to_bytes()?)
    }
}

pub(crate) fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
