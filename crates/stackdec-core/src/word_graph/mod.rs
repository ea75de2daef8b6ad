//! Search lattice: a DAG whose states are exact search states and whose
//! arcs are the phrase transitions the search produced.
//!
//! Arcs store unweighted feature values, so the weighted arc scores can be
//! recomputed for any weight vector without touching the models. Pruning
//! only flags arcs; an arc is never changed after it is written.

pub(crate) mod builder;
mod correction;
mod io;
mod nbest;
mod prefix;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

pub use correction::Correction;
pub use io::WordGraphError;

use crate::scoring::{ScoreComponents, Weights};
use crate::search::coverage::Span;

pub type StateId = u32;
pub type ArcId = usize;

/// The state every path starts from.
pub const INITIAL_STATE: StateId = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct WgArc {
    pub pred: StateId,
    pub succ: StateId,
    pub span: Span,
    pub words: Arc<[String]>,
    pub components: ScoreComponents,
}

/// A path from the initial state to a final state.
#[derive(Debug, Clone, PartialEq)]
pub struct WgPath {
    pub arcs: Vec<ArcId>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct WordGraph {
    num_states: usize,
    arcs: Vec<WgArc>,
    scores: Vec<f64>,
    pruned: Vec<bool>,
    finals: BTreeSet<StateId>,
    weights: Weights,
    initial_score: f64,
}

impl WordGraph {
    /// Graph holding only the initial state.
    pub fn new(weights: Weights) -> Self {
        Self {
            num_states: 1,
            arcs: Vec::new(),
            scores: Vec::new(),
            pruned: Vec::new(),
            finals: BTreeSet::new(),
            weights,
            initial_score: 0.0,
        }
    }

    pub fn add_state(&mut self) -> StateId {
        let id = self.num_states as StateId;
        self.num_states += 1;
        id
    }

    pub fn add_arc(
        &mut self,
        pred: StateId,
        succ: StateId,
        span: Span,
        words: Arc<[String]>,
        components: ScoreComponents,
    ) -> ArcId {
        debug_assert!((pred as usize) < self.num_states && (succ as usize) < self.num_states);
        self.scores.push(self.weights.dot(&components));
        self.pruned.push(false);
        self.arcs.push(WgArc {
            pred,
            succ,
            span,
            words,
            components,
        });
        self.arcs.len() - 1
    }

    pub fn mark_final(&mut self, state: StateId) {
        self.finals.insert(state);
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_arcs(&self) -> usize {
        self.arcs.len()
    }

    pub fn num_live_arcs(&self) -> usize {
        self.pruned.iter().filter(|p| !**p).count()
    }

    pub fn arc(&self, id: ArcId) -> &WgArc {
        &self.arcs[id]
    }

    pub fn arcs(&self) -> &[WgArc] {
        &self.arcs
    }

    /// Weighted score of an arc under the current weights.
    pub fn arc_score(&self, id: ArcId) -> f64 {
        self.scores[id]
    }

    pub fn is_pruned(&self, id: ArcId) -> bool {
        self.pruned[id]
    }

    pub fn finals(&self) -> &BTreeSet<StateId> {
        &self.finals
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn initial_score(&self) -> f64 {
        self.initial_score
    }

    /// Recompute every arc score from its stored components.
    pub fn set_weights(&mut self, weights: Weights) {
        for (score, arc) in self.scores.iter_mut().zip(&self.arcs) {
            *score = weights.dot(&arc.components);
        }
        self.weights = weights;
    }

    fn out_arcs(&self) -> Vec<Vec<ArcId>> {
        let mut out = vec![Vec::new(); self.num_states];
        for (id, arc) in self.arcs.iter().enumerate() {
            if !self.pruned[id] {
                out[arc.pred as usize].push(id);
            }
        }
        out
    }

    /// States in topological order (Kahn's algorithm, lowest id first).
    pub fn topological_order(&self) -> Vec<StateId> {
        let out = self.out_arcs();
        let mut indegree = vec![0usize; self.num_states];
        for arcs in &out {
            for &a in arcs {
                indegree[self.arcs[a].succ as usize] += 1;
            }
        }
        let mut queue: VecDeque<StateId> = (0..self.num_states as StateId)
            .filter(|&s| indegree[s as usize] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.num_states);
        while let Some(s) = queue.pop_front() {
            order.push(s);
            for &a in &out[s as usize] {
                let succ = self.arcs[a].succ as usize;
                indegree[succ] -= 1;
                if indegree[succ] == 0 {
                    queue.push_back(succ as StateId);
                }
            }
        }
        order
    }

    /// Best score reaching every state and the arc achieving it.
    fn forward(&self, excluded: &dyn Fn(ArcId) -> bool) -> (Vec<f64>, Vec<Option<ArcId>>) {
        let out = self.out_arcs();
        let mut best = vec![f64::NEG_INFINITY; self.num_states];
        let mut back = vec![None; self.num_states];
        best[INITIAL_STATE as usize] = self.initial_score;
        for s in self.topological_order() {
            let here = best[s as usize];
            if here == f64::NEG_INFINITY {
                continue;
            }
            for &a in &out[s as usize] {
                if excluded(a) {
                    continue;
                }
                let succ = self.arcs[a].succ as usize;
                let cand = here + self.scores[a];
                if cand > best[succ] {
                    best[succ] = cand;
                    back[succ] = Some(a);
                }
            }
        }
        (best, back)
    }

    /// Best score from every state to any final state.
    pub(crate) fn backward(&self) -> Vec<f64> {
        let out = self.out_arcs();
        let mut rest = vec![f64::NEG_INFINITY; self.num_states];
        for s in self.topological_order().into_iter().rev() {
            let mut r = if self.finals.contains(&s) {
                0.0
            } else {
                f64::NEG_INFINITY
            };
            for &a in &out[s as usize] {
                let cand = self.scores[a] + rest[self.arcs[a].succ as usize];
                if cand > r {
                    r = cand;
                }
            }
            rest[s as usize] = r;
        }
        rest
    }

    /// Best path from the initial state to a final state, never using an
    /// arc in `excluded`.
    pub fn best_path(&self, excluded: &BTreeSet<ArcId>) -> Option<WgPath> {
        let (best, back) = self.forward(&|a| excluded.contains(&a));
        let mut target: Option<(StateId, f64)> = None;
        for &f in &self.finals {
            let score = best[f as usize];
            if score > target.map_or(f64::NEG_INFINITY, |(_, s)| s) {
                target = Some((f, score));
            }
        }
        let (mut state, score) = target?;
        let mut arcs = Vec::new();
        while state != INITIAL_STATE {
            let a = back[state as usize]?;
            arcs.push(a);
            state = self.arcs[a].pred;
        }
        arcs.reverse();
        Some(WgPath { arcs, score })
    }

    /// Flag arcs that score more than `threshold` below the best arc into
    /// the same state. `Some(0.0)` keeps exactly one incoming arc per state;
    /// `None` leaves the graph untouched. Returns how many arcs were flagged.
    pub fn prune_by_density(&mut self, threshold: Option<f64>) -> usize {
        let Some(threshold) = threshold else {
            return 0;
        };
        let (best, back) = self.forward(&|_| false);
        let mut flagged = 0;
        for id in 0..self.arcs.len() {
            if self.pruned[id] {
                continue;
            }
            let arc = &self.arcs[id];
            let succ = arc.succ as usize;
            let from = best[arc.pred as usize];
            let keep = if from == f64::NEG_INFINITY {
                false
            } else if threshold == 0.0 {
                back[succ] == Some(id)
            } else {
                from + self.scores[id] >= best[succ] - threshold
            };
            if !keep {
                self.pruned[id] = true;
                flagged += 1;
            }
        }
        tracing::debug!(flagged, remaining = self.num_live_arcs(), "word graph pruned");
        flagged
    }

    /// Target words along `path`.
    pub fn path_words(&self, path: &WgPath) -> Vec<String> {
        path.arcs
            .iter()
            .flat_map(|&a| self.arcs[a].words.iter().cloned())
            .collect()
    }

    /// Source spans along `path`, in translation order.
    pub fn path_spans(&self, path: &WgPath) -> Vec<Span> {
        path.arcs.iter().map(|&a| self.arcs[a].span).collect()
    }

    /// Unweighted components summed along `path`.
    pub fn path_components(&self, path: &WgPath) -> ScoreComponents {
        path.arcs
            .iter()
            .fold(ScoreComponents::default(), |acc, &a| acc + self.arcs[a].components)
    }
}
