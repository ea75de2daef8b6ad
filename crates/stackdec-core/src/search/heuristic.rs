//! Future-cost estimates used to rank hypotheses that cover different
//! amounts of the source sentence.

use serde::{Deserialize, Serialize};

use super::coverage::{Coverage, Span};
use super::options::OptionGenerator;
use crate::scoring::ScoringAggregator;

/// Estimated score of a source word no option can cover.
const UNCOVERABLE_WORD_SCORE: f64 = -1.0e4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicKind {
    None,
    /// Translation future cost of the uncovered gaps.
    LocalT,
    /// `LocalT` plus the distortion needed to visit the gaps.
    LocalTd,
}

pub struct Heuristic {
    kind: HeuristicKind,
    n: usize,
    /// Best estimated score of every span, `table[start * (n + 1) + end]`.
    table: Vec<f64>,
    distortion_weight: f64,
}

impl Heuristic {
    pub fn build(
        kind: HeuristicKind,
        generator: &OptionGenerator<'_>,
        scorer: &ScoringAggregator<'_>,
    ) -> Self {
        let n = generator.source_len();
        let mut h = Self {
            kind,
            n,
            table: Vec::new(),
            distortion_weight: scorer.weights().distortion,
        };
        if kind == HeuristicKind::None {
            return h;
        }

        h.table = vec![f64::NEG_INFINITY; (n + 1) * (n + 1)];
        for len in 1..=n {
            for start in 1..=n + 1 - len {
                let span = Span::new(start, start + len - 1);
                let mut best = generator
                    .options_for(span)
                    .ok()
                    .and_then(|opts| {
                        opts.iter()
                            .map(|o| scorer.standalone_score(o))
                            .max_by(f64::total_cmp)
                    })
                    .unwrap_or(if len == 1 {
                        UNCOVERABLE_WORD_SCORE
                    } else {
                        f64::NEG_INFINITY
                    });
                for split in span.start..span.end {
                    let composed = h.get(span.start, split) + h.get(split + 1, span.end);
                    if composed > best {
                        best = composed;
                    }
                }
                h.table[span.start * (n + 1) + span.end] = best;
            }
        }
        h
    }

    fn get(&self, start: usize, end: usize) -> f64 {
        self.table[start * (self.n + 1) + end]
    }

    pub fn kind(&self) -> HeuristicKind {
        self.kind
    }

    /// Estimated best score of translating `span` on its own.
    pub fn span_score(&self, span: Span) -> f64 {
        if self.kind == HeuristicKind::None {
            0.0
        } else {
            self.get(span.start, span.end)
        }
    }

    /// Estimated score still to be collected by a hypothesis.
    pub fn estimate(&self, coverage: &Coverage, last_end: usize) -> f64 {
        if self.kind == HeuristicKind::None {
            return 0.0;
        }
        let gaps = coverage.gaps(self.n);
        let mut score: f64 = gaps.iter().map(|g| self.get(g.start, g.end)).sum();
        if self.kind == HeuristicKind::LocalTd {
            let mut pos = last_end;
            let mut jumps = 0usize;
            for gap in &gaps {
                jumps += gap.start.abs_diff(pos + 1);
                pos = gap.end;
            }
            score -= self.distortion_weight * jumps as f64;
        }
        score
    }
}
