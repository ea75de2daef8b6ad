//! Log-linear feature combination.

mod aggregator;


use std::ops::{Add, AddAssign, Sub};

use serde::{Deserialize, Serialize};

pub use aggregator::{Extension, ScoringAggregator};

pub const NUM_FEATURES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    DirectPhrase,
    InversePhrase,
    LanguageModel,
    WordPenalty,
    Distortion,
    PhrasePenalty,
    /// Geometric model of the source segment length.
    SourcePhraseLength,
    /// Geometric model of the target/source length difference of a pair.
    TargetPhraseLength,
}

impl Feature {
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::DirectPhrase,
        Feature::InversePhrase,
        Feature::LanguageModel,
        Feature::WordPenalty,
        Feature::Distortion,
        Feature::PhrasePenalty,
        Feature::SourcePhraseLength,
        Feature::TargetPhraseLength,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used in settings files and word-graph headers.
    pub fn name(self) -> &'static str {
        match self {
            Feature::DirectPhrase => "direct",
            Feature::InversePhrase => "inverse",
            Feature::LanguageModel => "lm",
            Feature::WordPenalty => "word_penalty",
            Feature::Distortion => "distortion",
            Feature::PhrasePenalty => "phrase_penalty",
            Feature::SourcePhraseLength => "src_phrase_len",
            Feature::TargetPhraseLength => "trg_phrase_len",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Unweighted feature values of a hypothesis or a single transition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreComponents([f64; NUM_FEATURES]);

impl ScoreComponents {
    pub fn from_values(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    pub fn values(&self) -> &[f64; NUM_FEATURES] {
        &self.0
    }
}

impl Add for ScoreComponents {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ScoreComponents {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Sub for ScoreComponents {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a -= b;
        }
        self
    }
}

/// Log-linear weights, one per [`Feature`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub direct: f64,
    pub inverse: f64,
    pub lm: f64,
    pub word_penalty: f64,
    pub distortion: f64,
    pub phrase_penalty: f64,
    #[serde(default)]
    pub src_phrase_len: f64,
    #[serde(default)]
    pub trg_phrase_len: f64,
}

impl Weights {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::DirectPhrase => self.direct,
            Feature::InversePhrase => self.inverse,
            Feature::LanguageModel => self.lm,
            Feature::WordPenalty => self.word_penalty,
            Feature::Distortion => self.distortion,
            Feature::PhrasePenalty => self.phrase_penalty,
            Feature::SourcePhraseLength => self.src_phrase_len,
            Feature::TargetPhraseLength => self.trg_phrase_len,
        }
    }

    pub fn set(&mut self, feature: Feature, weight: f64) {
        let slot = match feature {
            Feature::DirectPhrase => &mut self.direct,
            Feature::InversePhrase => &mut self.inverse,
            Feature::LanguageModel => &mut self.lm,
            Feature::WordPenalty => &mut self.word_penalty,
            Feature::Distortion => &mut self.distortion,
            Feature::PhrasePenalty => &mut self.phrase_penalty,
            Feature::SourcePhraseLength => &mut self.src_phrase_len,
            Feature::TargetPhraseLength => &mut self.trg_phrase_len,
        };
        *slot = weight;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    pub fn dot(&self, components: &ScoreComponents) -> f64 {
        self.iter().map(|(f, w)| w * components.get(f)).sum()
    }

    /// `name w , name w , ...`, the layout of word-graph headers.
    pub fn to_header(&self) -> String {
        self.iter()
            .map(|(f, w)| format!("{} {}", f.name(), w))
            .collect::<Vec<_>>()
            .join(" , ")
    }

    /// Inverse of [`Weights::to_header`]; features not mentioned keep their
    /// current value.
    pub fn apply_header(&mut self, header: &str) -> Result<(), String> {
        for item in header.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let mut parts = item.split_whitespace();
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(format!("bad weight entry {item:?}"));
            };
            let feature =
                Feature::from_name(name).ok_or_else(|| format!("unknown feature {name:?}"))?;
            let value: f64 = value
                .parse()
                .map_err(|e| format!("bad weight for {name}: {e}"))?;
            self.set(feature, value);
        }
        Ok(())
    }
}

impl Default for Weights {
    fn default() -> Self {
        crate::settings::DecoderSettings::default().weights
    }
}
