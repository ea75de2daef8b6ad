//! Error-correcting prefix completion.
//!
//! When no path spells the user prefix exactly, the graph can still supply
//! a completion: every path is aligned against the prefix with word-level
//! edit operations, and the path maximising
//! `graph score - weight * edit cost` wins. The output keeps the prefix as
//! typed and appends the words that follow the aligned part of the path.
//!
//! Substituting one word for another costs the character edit distance
//! between them, normalised to `[0, 1]` and scaled by the substitution
//! cost. A partial last prefix word is compared against the closest prefix
//! of the path word instead, so `hou` matches `house` for free.

use super::{ArcId, StateId, WgPath, WordGraph, INITIAL_STATE};
use crate::search::constraints::PrefixRequest;
use crate::settings::CorrectionSettings;

/// Result of an error-correcting completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    /// The chosen graph path and its (unpenalised) graph score.
    pub path: WgPath,
    /// Prefix words followed by the completion.
    pub words: Vec<String>,
    /// Unweighted edit cost of aligning the path with the prefix.
    pub edit_cost: f64,
}

/// Best partial alignment ending at one (state, prefix position) pair.
#[derive(Debug, Clone, Copy)]
struct Cell {
    value: f64,
    cost: f64,
    /// Path words consumed by the alignment; the rest is completion.
    aligned: usize,
    /// Graph word aligned with a partial last prefix word.
    fill: Option<(ArcId, usize)>,
    /// Arc into this state and the prefix position it started from.
    back: Option<(ArcId, usize)>,
}

fn relax(slot: &mut Option<Cell>, cand: Cell) {
    if slot.map_or(true, |c| cand.value > c.value) {
        *slot = Some(cand);
    }
}

impl WordGraph {
    /// Best completion of `prefix` under word-level edit operations, or
    /// `None` when no final state is reachable.
    ///
    /// Positions `0..p` count aligned prefix words, `p` marks the prefix as
    /// consumed with the next word still in the rejected-word slot, and
    /// `p + 1` is the free completion.
    pub fn correct_prefix(
        &self,
        prefix: &PrefixRequest,
        costs: &CorrectionSettings,
    ) -> Option<Correction> {
        let p = prefix.words.len();
        let width = p + 2;
        let out = self.out_arcs();
        let mut best: Vec<Vec<Option<Cell>>> = vec![vec![None; width]; self.num_states];

        let mut start = vec![None; width];
        start[0] = Some(Cell {
            value: self.initial_score,
            cost: 0.0,
            aligned: 0,
            fill: None,
            back: None,
        });
        insert_closure(&mut start, p, costs);
        best[INITIAL_STATE as usize] = start;

        for s in self.topological_order() {
            let here = best[s as usize].clone();
            if here.iter().all(Option::is_none) {
                continue;
            }
            for &a in &out[s as usize] {
                let arc = &self.arcs[a];
                let mut cur: Vec<Option<(Cell, usize)>> = here
                    .iter()
                    .enumerate()
                    .map(|(k, c)| c.map(|c| (c, k)))
                    .collect();
                for (wi, word) in arc.words.iter().enumerate() {
                    cur = self.step(prefix, costs, &cur, word, (a, wi));
                    if cur.iter().all(Option::is_none) {
                        break;
                    }
                }
                let score = self.scores[a];
                let succ = &mut best[arc.succ as usize];
                for (k, entry) in cur.into_iter().enumerate() {
                    if let Some((cell, origin)) = entry {
                        relax(
                            &mut succ[k],
                            Cell {
                                value: cell.value + score,
                                back: Some((a, origin)),
                                ..cell
                            },
                        );
                    }
                }
            }
        }

        let mut target: Option<(StateId, usize, Cell)> = None;
        for &f in &self.finals {
            for k in [p, p + 1] {
                if let Some(cell) = best[f as usize][k] {
                    if target.map_or(true, |(_, _, t)| cell.value > t.value) {
                        target = Some((f, k, cell));
                    }
                }
            }
        }
        let (mut state, mut k, last) = target?;

        let mut arcs = Vec::new();
        while let Some((a, prev_k)) = best[state as usize][k].and_then(|c| c.back) {
            arcs.push(a);
            state = self.arcs[a].pred;
            k = prev_k;
        }
        if state != INITIAL_STATE {
            return None;
        }
        arcs.reverse();
        let score = self.initial_score + arcs.iter().map(|&a| self.scores[a]).sum::<f64>();
        let path = WgPath { arcs, score };

        let mut words = prefix.words.clone();
        if let (true, Some((a, wi))) = (prefix.last_word_partial, last.fill) {
            let full = &self.arcs[a].words[wi];
            if let Some(typed) = words.last_mut() {
                if full.starts_with(typed.as_str()) {
                    *typed = full.clone();
                }
            }
        }
        words.extend(self.path_words(&path).into_iter().skip(last.aligned));
        Some(Correction {
            path,
            words,
            edit_cost: last.cost,
        })
    }

    /// Advance every alignment by one path word.
    fn step(
        &self,
        prefix: &PrefixRequest,
        costs: &CorrectionSettings,
        cur: &[Option<(Cell, usize)>],
        word: &str,
        at: (ArcId, usize),
    ) -> Vec<Option<(Cell, usize)>> {
        let p = prefix.words.len();
        let slot = prefix.rejected_slot();
        let rejected = prefix.rejected.contains(word);
        let mut next: Vec<Option<(Cell, usize)>> = vec![None; cur.len()];

        for (k, entry) in cur.iter().enumerate() {
            let Some((cell, from)) = *entry else { continue };
            if k < p {
                // Path word missing from the prefix.
                let deleted = cell.penalised(costs, costs.deletion, cell.aligned + 1, cell.fill);
                relax_from(&mut next[k], deleted, from);
                if k == slot && rejected {
                    continue;
                }
                let partial = prefix.last_word_partial && k + 1 == p;
                let cost = costs.substitution * word_distance(word, &prefix.words[k], partial);
                let fill = if partial { Some(at) } else { cell.fill };
                let matched = cell.penalised(costs, cost, cell.aligned + 1, fill);
                relax_from(&mut next[k + 1], matched, from);
            } else {
                if k == p && slot == p && rejected {
                    continue;
                }
                relax_from(&mut next[p + 1], cell, from);
            }
        }

        // Prefix words the path lacks.
        for k in 0..p {
            if let Some((cell, from)) = next[k] {
                let inserted = cell.penalised(costs, costs.insertion, cell.aligned, cell.fill);
                relax_from(&mut next[k + 1], inserted, from);
            }
        }
        next
    }
}

impl Cell {
    fn penalised(
        self,
        costs: &CorrectionSettings,
        extra: f64,
        aligned: usize,
        fill: Option<(ArcId, usize)>,
    ) -> Self {
        Self {
            value: self.value - costs.weight * extra,
            cost: self.cost + extra,
            aligned,
            fill,
            back: self.back,
        }
    }
}

fn relax_from(slot: &mut Option<(Cell, usize)>, cand: Cell, from: usize) {
    if slot.map_or(true, |(c, _)| cand.value > c.value) {
        *slot = Some((cand, from));
    }
}

/// Prefix-word insertions at a state, without consuming path words.
fn insert_closure(cells: &mut [Option<Cell>], p: usize, costs: &CorrectionSettings) {
    for k in 0..p {
        if let Some(cell) = cells[k] {
            let inserted = cell.penalised(costs, costs.insertion, cell.aligned, cell.fill);
            relax(&mut cells[k + 1], inserted);
        }
    }
}

/// Normalised character distance in `[0, 1]` between a path word and a
/// typed word. A partial typed word is matched against the closest prefix
/// of the path word.
pub(crate) fn word_distance(word: &str, typed: &str, partial: bool) -> f64 {
    if word == typed || (partial && word.starts_with(typed)) {
        return 0.0;
    }
    let a: Vec<char> = word.chars().collect();
    let b: Vec<char> = typed.chars().collect();
    if b.is_empty() {
        return if partial { 0.0 } else { 1.0 };
    }
    let row = char_distances(&b, &a);
    let dist = if partial {
        row.iter().copied().min().unwrap_or(b.len())
    } else {
        row[a.len()]
    };
    let norm = if partial { b.len() } else { a.len().max(b.len()) };
    (dist as f64 / norm as f64).min(1.0)
}

/// Levenshtein distances between all of `typed` and every prefix of `word`.
fn char_distances(typed: &[char], word: &[char]) -> Vec<usize> {
    let mut prev: Vec<usize> = (0..=word.len()).collect();
    let mut row = vec![0; word.len() + 1];
    for (i, &t) in typed.iter().enumerate() {
        row[0] = i + 1;
        for (j, &w) in word.iter().enumerate() {
            let subst = prev[j] + usize::from(t != w);
            row[j + 1] = subst.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev
}
