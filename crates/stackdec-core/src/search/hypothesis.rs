//! Hypotheses and the per-request arena that owns them.
//!
//! A hypothesis never changes after it is pushed into the arena; successors
//! point back to their predecessor through a [`HypId`], and the final
//! translation is rebuilt by walking those back-pointers.

use std::ops::Range;
use std::sync::Arc;

use super::coverage::{Coverage, Span};
use crate::models::LmState;
use crate::scoring::ScoreComponents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HypId(u32);

impl HypId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The phrase pair that produced a hypothesis from its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseStep {
    pub span: Span,
    pub target: Arc<[String]>,
}

#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub(crate) score: f64,
    pub(crate) components: ScoreComponents,
    pub(crate) coverage: Coverage,
    /// Bounded target history, as much as the LM needs.
    pub(crate) lm_state: LmState,
    /// Last source position of the most recent span (0 for the root).
    pub(crate) last_end: usize,
    pub(crate) jumps: u32,
    pub(crate) target_len: usize,
    pub(crate) step: Option<PhraseStep>,
    pub(crate) back: Option<HypId>,
}

impl Hypothesis {
    pub fn root(lm_state: LmState) -> Self {
        Self {
            score: 0.0,
            components: ScoreComponents::default(),
            coverage: Coverage::new(),
            lm_state,
            last_end: 0,
            jumps: 0,
            target_len: 0,
            step: None,
            back: None,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn components(&self) -> &ScoreComponents {
        &self.components
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    pub fn lm_state(&self) -> &LmState {
        &self.lm_state
    }

    pub fn last_end(&self) -> usize {
        self.last_end
    }

    pub fn jumps(&self) -> u32 {
        self.jumps
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    pub fn step(&self) -> Option<&PhraseStep> {
        self.step.as_ref()
    }

    pub fn back(&self) -> Option<HypId> {
        self.back
    }

    pub fn is_complete(&self, source_len: usize) -> bool {
        self.coverage.is_complete(source_len)
    }
}

/// One phrase of a finished derivation, aligned to its target words.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AlignedPhrase {
    pub source: Span,
    pub target: Range<usize>,
}

/// Old-to-new id table produced by [`HypArena::compact`].
#[derive(Debug)]
pub(crate) struct Remap {
    ids: Vec<Option<HypId>>,
}

impl Remap {
    /// New id of `old`, or `None` when it was reclaimed.
    pub fn get(&self, old: HypId) -> Option<HypId> {
        self.ids.get(old.index()).copied().flatten()
    }

    pub fn reclaimed(&self) -> usize {
        self.ids.iter().filter(|id| id.is_none()).count()
    }
}

#[derive(Debug, Default)]
pub struct HypArena {
    nodes: Vec<Hypothesis>,
}

impl HypArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hyp: Hypothesis) -> HypId {
        let id = HypId(self.nodes.len() as u32);
        self.nodes.push(hyp);
        id
    }

    /// Drop `id` again if it is the most recent push.
    pub(crate) fn discard_last(&mut self, id: HypId) {
        if id.index() + 1 == self.nodes.len() {
            self.nodes.pop();
        }
    }

    /// Keep only `roots` and their predecessor chains, renumbering the
    /// survivors in push order. Ids held elsewhere must be translated
    /// through the returned [`Remap`].
    pub(crate) fn compact<I>(&mut self, roots: I) -> Remap
    where
        I: IntoIterator<Item = HypId>,
    {
        let mut marked = vec![false; self.nodes.len()];
        for root in roots {
            let mut cur = Some(root);
            while let Some(id) = cur {
                if marked[id.index()] {
                    break;
                }
                marked[id.index()] = true;
                cur = self.nodes[id.index()].back;
            }
        }

        let mut ids = vec![None; self.nodes.len()];
        let old = std::mem::take(&mut self.nodes);
        for (i, mut hyp) in old.into_iter().enumerate() {
            if !marked[i] {
                continue;
            }
            // Predecessors are pushed first, so they are already renumbered.
            hyp.back = hyp.back.and_then(|b| ids[b.index()]);
            ids[i] = Some(HypId(self.nodes.len() as u32));
            self.nodes.push(hyp);
        }
        Remap { ids }
    }

    pub fn get(&self, id: HypId) -> &Hypothesis {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Phrase steps from the root to `id`.
    pub fn steps(&self, id: HypId) -> Vec<PhraseStep> {
        let mut steps = Vec::new();
        let mut cur = Some(id);
        while let Some(h) = cur {
            let hyp = self.get(h);
            if let Some(step) = &hyp.step {
                steps.push(step.clone());
            }
            cur = hyp.back;
        }
        steps.reverse();
        steps
    }

    /// Target words and the source/target segmentation of `id`.
    pub fn reconstruct(&self, id: HypId) -> (Vec<String>, Vec<AlignedPhrase>) {
        let mut words = Vec::new();
        let mut alignment = Vec::new();
        for step in self.steps(id) {
            let start = words.len();
            words.extend(step.target.iter().cloned());
            alignment.push(AlignedPhrase {
                source: step.span,
                target: start..words.len(),
            });
        }
        (words, alignment)
    }
}
