use crate::models::{LmState, ModelSet, PhraseScores};
use crate::search::coverage::Span;
use crate::search::hypothesis::{Hypothesis, PhraseStep};
use crate::search::options::TranslationOption;

use super::{Feature, ScoreComponents, Weights};

/// Hit probability of the geometric phrase-length models.
const PHRASE_LEN_HIT_PROB: f64 = 0.9;

/// `ln p + n ln(1-p)` with `p` = [`PHRASE_LEN_HIT_PROB`].
fn geometric_len_score(n: usize) -> f64 {
    PHRASE_LEN_HIT_PROB.ln() + n as f64 * (1.0 - PHRASE_LEN_HIT_PROB).ln()
}

/// Result of extending a hypothesis by one phrase.
#[derive(Debug, Clone)]
pub struct Extension {
    /// Unweighted feature deltas of this transition.
    pub components: ScoreComponents,
    pub score_delta: f64,
    pub lm_state: LmState,
}

/// Combines phrase, language-model, word-penalty and distortion scores under
/// one weight vector. The weights are fixed for the lifetime of the value.
pub struct ScoringAggregator<'a> {
    models: &'a ModelSet,
    weights: &'a Weights,
}

impl<'a> ScoringAggregator<'a> {
    pub fn new(models: &'a ModelSet, weights: &'a Weights) -> Self {
        Self { models, weights }
    }

    pub fn weights(&self) -> &Weights {
        self.weights
    }

    pub fn models(&self) -> &ModelSet {
        self.models
    }

    pub fn extend(&self, pred: &Hypothesis, option: &TranslationOption, completes: bool) -> Extension {
        let (components, lm_state) = self.transition(
            &pred.lm_state,
            pred.target_len,
            pred.last_end,
            option.span,
            &option.target,
            option.scores,
            completes,
        );
        Extension {
            score_delta: self.weights.dot(&components),
            components,
            lm_state,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn transition(
        &self,
        lm_state: &LmState,
        target_len: usize,
        last_end: usize,
        span: Span,
        target: &[String],
        scores: PhraseScores,
        completes: bool,
    ) -> (ScoreComponents, LmState) {
        let mut c = ScoreComponents::default();
        c.set(Feature::DirectPhrase, scores.direct);
        c.set(Feature::InversePhrase, scores.inverse);

        let mut state = lm_state.clone();
        let mut lm = 0.0;
        for word in target {
            let (lp, next) = self.models.lm.score_and_advance(&state, word);
            lm += lp;
            state = next;
        }
        if completes {
            lm += self.models.lm.end_score(&state);
        }
        c.set(Feature::LanguageModel, lm);

        let wp = &self.models.word_penalty;
        c.set(
            Feature::WordPenalty,
            wp.score_for_length(target_len + target.len()) - wp.score_for_length(target_len),
        );
        c.set(
            Feature::Distortion,
            -(span.start.abs_diff(last_end + 1) as f64),
        );
        c.set(Feature::PhrasePenalty, -1.0);
        c.set(Feature::SourcePhraseLength, geometric_len_score(span.len()));
        c.set(
            Feature::TargetPhraseLength,
            geometric_len_score(target.len().abs_diff(span.len())),
        );
        (c, state)
    }

    /// Weighted score of a phrase out of any context, for future-cost tables.
    pub fn standalone_score(&self, option: &TranslationOption) -> f64 {
        let (mut c, _) = self.transition(
            &self.models.lm.context_free_state(),
            0,
            option.span.start - 1,
            option.span,
            &option.target,
            option.scores,
            false,
        );
        c.set(Feature::Distortion, 0.0);
        self.weights.dot(&c)
    }

    /// Score a whole derivation from scratch, looking every phrase pair up
    /// again. Returns the weighted total and the accumulated components.
    pub fn rescore(&self, source: &[String], steps: &[PhraseStep]) -> (f64, ScoreComponents) {
        let mut total = ScoreComponents::default();
        let mut state = self.models.lm.initial_state();
        let mut target_len = 0;
        let mut last_end = 0;
        for (i, step) in steps.iter().enumerate() {
            let src = &source[step.span.range()];
            let scores = self.models.phrase_table.score_for_pair(src, &step.target);
            let (c, next) = self.transition(
                &state,
                target_len,
                last_end,
                step.span,
                &step.target,
                scores,
                i + 1 == steps.len(),
            );
            total += c;
            state = next;
            target_len += step.target.len();
            last_end = step.span.end;
        }
        (self.weights.dot(&total), total)
    }
}
