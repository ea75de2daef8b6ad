//! Translation option generation.
//!
//! Options for every span a sentence can use are looked up once per request
//! and cached, so asking twice for the same span always returns the same set.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::constraints::LexicalConstraints;
use super::coverage::{Coverage, Span};
use crate::models::{PhraseScores, PhraseTable};
use crate::scoring::Weights;
use crate::settings::OptionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OptionOrigin {
    PhraseTable,
    /// Unknown single word copied to the output.
    CopyUnknown,
    /// Forced by a lexical constraint.
    Constraint,
    /// Piece of a user-supplied target prefix.
    PrefixSegment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOption {
    pub span: Span,
    pub target: Arc<[String]>,
    pub scores: PhraseScores,
    pub origin: OptionOrigin,
}

impl TranslationOption {
    /// Phrase-model part of the weighted score, used to rank options.
    pub fn blended(&self, weights: &Weights) -> f64 {
        weights.direct * self.scores.direct + weights.inverse * self.scores.inverse
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("no translation option for span {0}")]
    NoTranslationOption(Span),
}

pub struct OptionGenerator<'a> {
    source: &'a [String],
    phrase_table: &'a dyn PhraseTable,
    settings: &'a OptionSettings,
    lexical: &'a LexicalConstraints,
    max_span_len: usize,
    table: HashMap<Span, Arc<[TranslationOption]>>,
}

impl<'a> OptionGenerator<'a> {
    pub fn new(
        source: &'a [String],
        phrase_table: &'a dyn PhraseTable,
        weights: &Weights,
        settings: &'a OptionSettings,
        lexical: &'a LexicalConstraints,
    ) -> Self {
        let max_span_len = settings.max_phrase_len.max(lexical.max_span_len());
        let mut gen = Self {
            source,
            phrase_table,
            settings,
            lexical,
            max_span_len,
            table: HashMap::new(),
        };
        let n = source.len();
        for start in 1..=n {
            for end in start..=n.min(start + max_span_len - 1) {
                let span = Span::new(start, end);
                let options = gen.lookup(span, weights);
                if !options.is_empty() {
                    gen.table.insert(span, options.into());
                }
            }
        }
        tracing::debug!(spans = gen.table.len(), "translation options collected");
        gen
    }

    pub fn source(&self) -> &[String] {
        self.source
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn lexical(&self) -> &LexicalConstraints {
        self.lexical
    }

    fn lookup(&self, span: Span, weights: &Weights) -> Vec<TranslationOption> {
        if let Some(forced) = self.lexical.exact(span) {
            let target: Arc<[String]> = forced.target.clone().into();
            return vec![TranslationOption {
                span,
                scores: self.phrase_scores(span, &target),
                target,
                origin: OptionOrigin::Constraint,
            }];
        }
        if self.lexical.blocks(span) || span.len() > self.settings.max_phrase_len {
            return Vec::new();
        }

        let words = &self.source[span.range()];
        let mut options: Vec<TranslationOption> = self
            .phrase_table
            .options_for_span(words)
            .into_iter()
            .map(|entry| TranslationOption {
                span,
                target: entry.target.into(),
                scores: entry.scores,
                origin: OptionOrigin::PhraseTable,
            })
            .collect();

        if options.is_empty() {
            if span.len() == 1 && self.settings.copy_unknown_words {
                options.push(TranslationOption {
                    span,
                    target: words.to_vec().into(),
                    scores: self.phrase_table.score_for_pair(words, words),
                    origin: OptionOrigin::CopyUnknown,
                });
            }
            return options;
        }

        let mut ranked: Vec<(f64, TranslationOption)> = options
            .into_iter()
            .map(|o| (o.blended(weights), o))
            .collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        apply_option_limit(&mut ranked, self.settings.option_limit);
        ranked.into_iter().map(|(_, o)| o).collect()
    }

    /// Cached options for `span`, already capped by the option limit.
    pub fn options_for(&self, span: Span) -> Result<Arc<[TranslationOption]>, OptionError> {
        self.table
            .get(&span)
            .cloned()
            .ok_or(OptionError::NoTranslationOption(span))
    }

    /// Phrase scores for a pair that did not come out of the table.
    pub fn phrase_scores(&self, span: Span, target: &[String]) -> PhraseScores {
        self.phrase_table
            .score_for_pair(&self.source[span.range()], target)
    }

    /// Uncovered spans a hypothesis may translate next.
    ///
    /// A span `[s,e]` qualifies when it lies in one gap, starts at most U
    /// positions away from `last_end + 1`, leaves every uncovered position
    /// left of `e` within U of `e + 1`, and does not cut through a
    /// lexically constrained span.
    pub fn candidate_spans(&self, coverage: &Coverage, last_end: usize) -> Vec<Span> {
        let n = self.source.len();
        let budget = self.settings.nonmonotonicity;
        let Some(first_gap) = coverage.first_uncovered(n) else {
            return Vec::new();
        };

        let mut spans = Vec::new();
        for start in first_gap..=n {
            if coverage.contains(start) || start.abs_diff(last_end + 1) > budget {
                continue;
            }
            for end in start..=n.min(start + self.max_span_len - 1) {
                if coverage.contains(end) {
                    break;
                }
                if first_gap < start && end + 1 - first_gap > budget {
                    break;
                }
                let span = Span::new(start, end);
                if self.lexical.blocks(span) {
                    continue;
                }
                if span.len() > self.settings.max_phrase_len && self.lexical.exact(span).is_none() {
                    continue;
                }
                spans.push(span);
            }
        }
        spans
    }
}

/// Keep the top `limit` options when `limit >= 1`, otherwise the options
/// whose score is within `ln(limit)` of the best. `ranked` is sorted best first.
fn apply_option_limit<T>(ranked: &mut Vec<(f64, T)>, limit: f64) {
    if limit >= 1.0 {
        ranked.truncate(limit as usize);
    } else if let Some(best) = ranked.first().map(|(s, _)| *s) {
        let floor = best + limit.ln();
        ranked.retain(|(s, _)| *s >= floor);
    }
}
