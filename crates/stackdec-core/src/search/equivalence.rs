//! Stack assignment and recombination keys.
//!
//! Every policy keeps hypotheses apart when they have different coverage
//! cardinality. `CoverageExact` (with the LM state) only merges hypotheses
//! that score every future the same way; the coarser policies, or leaving
//! the LM state out, merge more and can lose the globally best derivation.

use serde::{Deserialize, Serialize};

use super::coverage::Coverage;
use super::hypothesis::Hypothesis;
use crate::models::LmState;

/// How hypotheses are grouped into stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackGrouping {
    /// One stack per number of covered words.
    Cardinality,
    /// One stack per (covered words, reordering jumps).
    CardinalityJumps,
    /// A single stack for everything.
    Pooled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackKey {
    pub covered: u32,
    pub jumps: u32,
}

impl StackGrouping {
    pub fn key(self, hyp: &Hypothesis) -> StackKey {
        let covered = hyp.coverage.count() as u32;
        match self {
            StackGrouping::Cardinality => StackKey { covered, jumps: 0 },
            StackGrouping::CardinalityJumps => StackKey {
                covered,
                jumps: hyp.jumps,
            },
            StackGrouping::Pooled => StackKey {
                covered: 0,
                jumps: 0,
            },
        }
    }
}

/// Which hypotheses count as interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalencePolicy {
    /// Same coverage bitmap and same last source position.
    CoverageExact,
    /// Same number of covered words and reordering jumps.
    CardinalityJumps,
    /// Same number of covered words and last source position.
    CardinalityLastPos,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyDetail {
    Coverage(Coverage, u32),
    Jumps(u32),
    LastPos(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EquivalenceKey {
    covered: u32,
    detail: KeyDetail,
    lm: Option<LmState>,
}

impl EquivalenceKey {
    /// Exact search state: coverage, last position and LM state.
    pub fn exact(hyp: &Hypothesis) -> Self {
        EquivalencePolicy::CoverageExact.key(hyp, true)
    }
}

impl EquivalencePolicy {
    pub fn key(self, hyp: &Hypothesis, with_lm_state: bool) -> EquivalenceKey {
        let covered = hyp.coverage.count() as u32;
        let last = hyp.last_end as u32;
        let detail = match self {
            EquivalencePolicy::CoverageExact => KeyDetail::Coverage(hyp.coverage, last),
            EquivalencePolicy::CardinalityJumps => KeyDetail::Jumps(hyp.jumps),
            EquivalencePolicy::CardinalityLastPos => KeyDetail::LastPos(last),
        };
        EquivalenceKey {
            covered,
            detail,
            lm: with_lm_state.then(|| hyp.lm_state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::coverage::Span;

    fn hyp(spans: &[(usize, usize)], jumps: u32, lm: Vec<u32>) -> Hypothesis {
        let mut h = Hypothesis::root(LmState::new(lm));
        for &(s, e) in spans {
            h.coverage = h.coverage.with_span(Span::new(s, e));
            h.last_end = e;
        }
        h.jumps = jumps;
        h
    }

    #[test]
    fn test_exact_distinguishes_coverage() {
        let a = hyp(&[(1, 1), (3, 3)], 1, vec![5]);
        let b = hyp(&[(2, 3)], 1, vec![5]);
        let p = EquivalencePolicy::CoverageExact;
        assert_ne!(p.key(&a, true), p.key(&b, true));
        assert_eq!(
            EquivalencePolicy::CardinalityLastPos.key(&a, true),
            EquivalencePolicy::CardinalityLastPos.key(&b, true)
        );
    }

    #[test]
    fn test_lm_state_in_key() {
        let a = hyp(&[(1, 2)], 0, vec![5]);
        let b = hyp(&[(1, 2)], 0, vec![6]);
        let p = EquivalencePolicy::CoverageExact;
        assert_ne!(p.key(&a, true), p.key(&b, true));
        assert_eq!(p.key(&a, false), p.key(&b, false));
    }

    #[test]
    fn test_jumps_policy() {
        let a = hyp(&[(1, 1), (3, 3)], 1, vec![]);
        let b = hyp(&[(2, 3)], 1, vec![]);
        let c = hyp(&[(1, 2)], 0, vec![]);
        let p = EquivalencePolicy::CardinalityJumps;
        assert_eq!(p.key(&a, true), p.key(&b, true));
        assert_ne!(p.key(&a, true), p.key(&c, true));
    }

    #[test]
    fn test_stack_grouping() {
        let a = hyp(&[(2, 3)], 1, vec![]);
        assert_eq!(StackGrouping::Cardinality.key(&a), StackKey { covered: 2, jumps: 0 });
        assert_eq!(StackGrouping::CardinalityJumps.key(&a), StackKey { covered: 2, jumps: 1 });
        assert_eq!(StackGrouping::Pooled.key(&a), StackKey { covered: 0, jumps: 0 });
    }
}
