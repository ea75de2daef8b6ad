use super::{ArcId, StateId, WgPath, WordGraph, INITIAL_STATE};
use crate::search::constraints::PrefixRequest;

impl WordGraph {
    /// Best path whose output is consistent with `prefix` (including its
    /// partial last word and rejected words), or `None` when the graph has
    /// no such path.
    ///
    /// Dynamic programming over (state, output position) where positions
    /// past the rejected-word slot are merged into one.
    pub fn complete_prefix(&self, prefix: &PrefixRequest) -> Option<WgPath> {
        let cap = prefix.words.len().max(prefix.rejected_slot()) + 1;
        let width = cap + 1;
        let idx = |s: StateId, k: usize| s as usize * width + k;

        let out = self.out_arcs();
        let mut best = vec![f64::NEG_INFINITY; self.num_states * width];
        let mut back: Vec<Option<(ArcId, usize)>> = vec![None; self.num_states * width];
        best[idx(INITIAL_STATE, 0)] = self.initial_score;

        for s in self.topological_order() {
            for k in 0..width {
                let here = best[idx(s, k)];
                if here == f64::NEG_INFINITY {
                    continue;
                }
                for &a in &out[s as usize] {
                    let arc = &self.arcs[a];
                    let Some(next_k) = advance(prefix, k, &arc.words, cap) else {
                        continue;
                    };
                    let j = idx(arc.succ, next_k);
                    let cand = here + self.scores[a];
                    if cand > best[j] {
                        best[j] = cand;
                        back[j] = Some((a, k));
                    }
                }
            }
        }

        let mut target: Option<(StateId, usize, f64)> = None;
        for &f in &self.finals {
            for k in prefix.words.len()..width {
                let score = best[idx(f, k)];
                if score > target.map_or(f64::NEG_INFINITY, |t| t.2) {
                    target = Some((f, k, score));
                }
            }
        }
        let (mut state, mut k, score) = target?;
        let mut arcs = Vec::new();
        while !(state == INITIAL_STATE && k == 0) {
            let (a, prev_k) = back[idx(state, k)]?;
            arcs.push(a);
            state = self.arcs[a].pred;
            k = prev_k;
        }
        arcs.reverse();
        Some(WgPath { arcs, score })
    }
}

/// Output position after appending `words` at position `k`, saturating at
/// `cap`; `None` when a word contradicts the prefix.
fn advance(prefix: &PrefixRequest, mut k: usize, words: &[String], cap: usize) -> Option<usize> {
    for w in words {
        if k < cap && !prefix.accepts_word(k, w) {
            return None;
        }
        k = (k + 1).min(cap);
    }
    Some(k)
}
