use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use super::{ArcId, StateId, WgPath, WordGraph, INITIAL_STATE};

/// Upper bound on heap pops for one n-best query.
const MAX_POPS: usize = 200_000;

struct Item {
    priority: f64,
    seq: usize,
    score: f64,
    state: StateId,
    arcs: Vec<ArcId>,
    finished: bool,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Item {}

impl PartialOrd for Item {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Item {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; earlier pushes win ties.
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl WordGraph {
    /// Up to `n` best paths with distinct target strings, best first.
    ///
    /// A* search from the initial state guided by the exact best score of
    /// the rest of the graph, so complete paths come out in score order.
    pub fn nbest(&self, n: usize) -> Vec<WgPath> {
        if n == 0 {
            return Vec::new();
        }
        let rest = self.backward();
        if rest[INITIAL_STATE as usize] == f64::NEG_INFINITY {
            return Vec::new();
        }
        let out = self.out_arcs();

        let mut heap = BinaryHeap::new();
        let mut seq = 0;
        heap.push(Item {
            priority: self.initial_score + rest[INITIAL_STATE as usize],
            seq,
            score: self.initial_score,
            state: INITIAL_STATE,
            arcs: Vec::new(),
            finished: false,
        });

        let mut results = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut pops = 0;
        while let Some(item) = heap.pop() {
            pops += 1;
            if pops > MAX_POPS {
                tracing::warn!(found = results.len(), "n-best search gave up");
                break;
            }
            if item.finished {
                let path = WgPath {
                    arcs: item.arcs,
                    score: item.score,
                };
                if seen.insert(self.path_words(&path)) {
                    results.push(path);
                    if results.len() == n {
                        break;
                    }
                }
                continue;
            }
            if self.finals.contains(&item.state) {
                seq += 1;
                heap.push(Item {
                    priority: item.score,
                    seq,
                    score: item.score,
                    state: item.state,
                    arcs: item.arcs.clone(),
                    finished: true,
                });
            }
            for &a in &out[item.state as usize] {
                let succ = self.arcs[a].succ;
                let rest_score = rest[succ as usize];
                if rest_score == f64::NEG_INFINITY {
                    continue;
                }
                let score = item.score + self.scores[a];
                let mut arcs = item.arcs.clone();
                arcs.push(a);
                seq += 1;
                heap.push(Item {
                    priority: score + rest_score,
                    seq,
                    score,
                    state: succ,
                    arcs,
                    finished: false,
                });
            }
        }
        results
    }
}
