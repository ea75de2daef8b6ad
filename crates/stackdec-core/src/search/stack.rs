//! Hypothesis stacks with recombination and beam pruning.
//!
//! Stacks keep entries sorted best first by heuristic-adjusted score; an
//! entry that ties with existing ones goes behind them, so the first one
//! seen wins every tie. Recombination is tracked across all stacks: the best
//! score ever inserted for a key is remembered for the whole search, and a
//! later hypothesis with the same key survives only if it is strictly better.

use std::collections::{BTreeMap, HashMap};

use super::equivalence::{EquivalenceKey, StackKey};
use super::hypothesis::HypId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// An equivalent hypothesis with at least the same score exists.
    Recombined,
    /// The stack is full of better hypotheses.
    SizePruned,
    /// Too far below the best hypothesis of its stack.
    MarginPruned,
    /// The search is over.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Accepted; `evicted` lists entries it displaced (recombined or pruned).
    Inserted { evicted: Vec<HypId> },
    Discarded(DiscardReason),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted { .. })
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: HypId,
    adjusted: f64,
    key: EquivalenceKey,
}

/// One sorted beam.
#[derive(Debug, Clone, Default)]
pub struct HypStack {
    entries: Vec<Entry>,
}

impl HypStack {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best_adjusted(&self) -> Option<f64> {
        self.entries.first().map(|e| e.adjusted)
    }

    pub fn worst_adjusted(&self) -> Option<f64> {
        self.entries.last().map(|e| e.adjusted)
    }

    pub fn ids(&self) -> impl Iterator<Item = HypId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    fn insert(&mut self, entry: Entry) {
        let pos = self
            .entries
            .partition_point(|e| e.adjusted >= entry.adjusted);
        self.entries.insert(pos, entry);
    }

    fn remove(&mut self, id: HypId) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    fn pop_best(&mut self) -> Option<Entry> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Drop entries beyond `capacity` and, with a margin, entries scoring
    /// below `best - margin`.
    fn prune(&mut self, capacity: usize, margin: Option<f64>) -> Vec<Entry> {
        let mut keep = self.entries.len().min(capacity);
        if let (Some(margin), Some(best)) = (margin, self.best_adjusted()) {
            let floor = best - margin;
            keep = self.entries[..keep].partition_point(|e| e.adjusted >= floor);
        }
        self.entries.split_off(keep)
    }
}

#[derive(Debug, Clone, Copy)]
struct RecombinationEntry {
    best_score: f64,
    live: Option<(StackKey, HypId)>,
}

/// All stacks of one search plus the recombination dictionary.
#[derive(Debug, Clone)]
pub struct MultiStack {
    stacks: BTreeMap<StackKey, HypStack>,
    recombination: HashMap<EquivalenceKey, RecombinationEntry>,
    capacity: usize,
    margin: Option<f64>,
    closed: bool,
}

impl MultiStack {
    pub fn new(capacity: usize, margin: Option<f64>) -> Self {
        Self {
            stacks: BTreeMap::new(),
            recombination: HashMap::new(),
            capacity: capacity.max(1),
            margin,
            closed: false,
        }
    }

    /// Insert a hypothesis with raw `score` and heuristic-adjusted score
    /// `adjusted`. Recombination compares raw scores; pruning uses adjusted.
    pub fn insert(
        &mut self,
        id: HypId,
        score: f64,
        adjusted: f64,
        stack_key: StackKey,
        key: EquivalenceKey,
    ) -> InsertOutcome {
        if self.closed {
            return InsertOutcome::Discarded(DiscardReason::Closed);
        }
        let previous = self.recombination.get(&key).copied();
        if let Some(prev) = previous {
            if score <= prev.best_score {
                return InsertOutcome::Discarded(DiscardReason::Recombined);
            }
        }

        let replaces_here = matches!(previous, Some(RecombinationEntry { live: Some((sk, _)), .. }) if sk == stack_key);
        let stack = self.stacks.entry(stack_key).or_default();
        if let (Some(margin), Some(best)) = (self.margin, stack.best_adjusted()) {
            if adjusted < best - margin {
                return InsertOutcome::Discarded(DiscardReason::MarginPruned);
            }
        }
        if !replaces_here && stack.len() >= self.capacity {
            if let Some(worst) = stack.worst_adjusted() {
                if adjusted <= worst {
                    return InsertOutcome::Discarded(DiscardReason::SizePruned);
                }
            }
        }

        let mut evicted = Vec::new();
        if let Some(RecombinationEntry {
            live: Some((old_stack, old_id)),
            ..
        }) = previous
        {
            if let Some(s) = self.stacks.get_mut(&old_stack) {
                if s.remove(old_id).is_some() {
                    evicted.push(old_id);
                }
            }
        }

        let stack = self.stacks.entry(stack_key).or_default();
        stack.insert(Entry {
            id,
            adjusted,
            key: key.clone(),
        });
        let pruned = stack.prune(self.capacity, self.margin);
        self.recombination.insert(
            key,
            RecombinationEntry {
                best_score: score,
                live: Some((stack_key, id)),
            },
        );
        for entry in pruned {
            if let Some(r) = self.recombination.get_mut(&entry.key) {
                if r.live == Some((stack_key, entry.id)) {
                    r.live = None;
                }
            }
            evicted.push(entry.id);
        }
        InsertOutcome::Inserted { evicted }
    }

    fn take(&mut self, stack_key: StackKey) -> Option<HypId> {
        let entry = self.stacks.get_mut(&stack_key)?.pop_best()?;
        if let Some(r) = self.recombination.get_mut(&entry.key) {
            r.live = None;
        }
        Some(entry.id)
    }

    /// Remove the entry with the best adjusted score over all stacks.
    pub fn pop_best(&mut self) -> Option<HypId> {
        let mut best: Option<(StackKey, f64)> = None;
        for (key, stack) in &self.stacks {
            if let Some(score) = stack.best_adjusted() {
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((*key, score));
                }
            }
        }
        let (key, _) = best?;
        self.take(key)
    }

    /// Remove the best entry of the lowest non-empty stack.
    pub fn pop_breadth_first(&mut self) -> Option<HypId> {
        let key = self
            .stacks
            .iter()
            .find(|(_, s)| !s.is_empty())
            .map(|(k, _)| *k)?;
        self.take(key)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.values().all(HypStack::is_empty)
    }

    pub fn len(&self) -> usize {
        self.stacks.values().map(HypStack::len).sum()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stacks(&self) -> impl Iterator<Item = (&StackKey, &HypStack)> {
        self.stacks.iter()
    }

    pub fn live_ids(&self) -> impl Iterator<Item = HypId> + '_ {
        self.stacks.values().flat_map(HypStack::ids)
    }

    /// Rename every live id through `map`; entries it maps to `None` are
    /// dropped. Recombination scores are kept.
    pub(crate) fn remap<F>(&mut self, map: F)
    where
        F: Fn(HypId) -> Option<HypId>,
    {
        for stack in self.stacks.values_mut() {
            stack.entries.retain_mut(|e| match map(e.id) {
                Some(id) => {
                    e.id = id;
                    true
                }
                None => false,
            });
        }
        for r in self.recombination.values_mut() {
            r.live = r.live.and_then(|(sk, id)| map(id).map(|id| (sk, id)));
        }
    }
}
