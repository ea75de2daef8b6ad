use std::collections::HashMap;

use super::{StateId, WordGraph, INITIAL_STATE};
use crate::scoring::{ScoreComponents, Weights};
use crate::search::equivalence::EquivalenceKey;
use crate::search::hypothesis::PhraseStep;
use crate::search::stack::{DiscardReason, InsertOutcome};

/// Grows a [`WordGraph`] alongside a search, mapping exact search states to
/// graph states.
pub(crate) struct WordGraphBuilder {
    graph: WordGraph,
    states: HashMap<EquivalenceKey, StateId>,
}

impl WordGraphBuilder {
    pub fn new(weights: Weights, root: EquivalenceKey) -> Self {
        let mut states = HashMap::new();
        states.insert(root, INITIAL_STATE);
        Self {
            graph: WordGraph::new(weights),
            states,
        }
    }

    /// Record the transition `pred -> succ`. Accepted successors get a state
    /// of their own; a successor lost to recombination only adds an arc when
    /// its exact state already exists, and pruned successors add nothing.
    pub fn record(
        &mut self,
        pred: &EquivalenceKey,
        succ: EquivalenceKey,
        step: &PhraseStep,
        components: ScoreComponents,
        outcome: &InsertOutcome,
        complete: bool,
    ) {
        let Some(&pred_state) = self.states.get(pred) else {
            return;
        };
        let succ_state = match outcome {
            InsertOutcome::Inserted { .. } => match self.states.get(&succ) {
                Some(&s) => s,
                None => {
                    let s = self.graph.add_state();
                    self.states.insert(succ, s);
                    s
                }
            },
            InsertOutcome::Discarded(DiscardReason::Recombined) => match self.states.get(&succ) {
                Some(&s) => s,
                None => return,
            },
            InsertOutcome::Discarded(_) => return,
        };
        self.graph.add_arc(
            pred_state,
            succ_state,
            step.span,
            step.target.clone(),
            components,
        );
        if complete {
            self.graph.mark_final(succ_state);
        }
    }

    pub fn finish(self) -> WordGraph {
        self.graph
    }
}
