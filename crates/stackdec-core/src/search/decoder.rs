use std::time::Instant;

use tracing::{debug, debug_span, trace, warn};

use super::constraints::{ConstraintFilter, LexicalConstraints, PrefixRequest, TargetConstraint};
use super::coverage::MAX_SENTENCE_LEN;
use super::equivalence::EquivalenceKey;
use super::heuristic::Heuristic;
use super::hypothesis::{HypArena, HypId, Hypothesis, PhraseStep};
use super::options::{OptionGenerator, TranslationOption};
use super::stack::{DiscardReason, InsertOutcome, MultiStack};
use super::{DecodeError, DecodeOutcome, DecodeStatus, SearchStats, Translation};
use crate::models::ModelSet;
use crate::scoring::ScoringAggregator;
use crate::settings::DecoderSettings;
use crate::word_graph::builder::WordGraphBuilder;

/// Phrase-based stack decoder over a shared, read-only model set.
///
/// Each call runs an independent search; all per-request state (arena,
/// stacks, word graph) lives only for the duration of the call.
pub struct StackDecoder<'a> {
    models: &'a ModelSet,
    settings: &'a DecoderSettings,
}

impl<'a> StackDecoder<'a> {
    pub fn new(models: &'a ModelSet, settings: &'a DecoderSettings) -> Self {
        Self { models, settings }
    }

    pub fn settings(&self) -> &DecoderSettings {
        self.settings
    }

    /// Translate a tokenized sentence that may carry phrase-pair markup.
    pub fn translate(&self, sentence: &str) -> Result<DecodeOutcome, DecodeError> {
        let (source, lexical) = LexicalConstraints::parse_annotated(sentence)?;
        self.decode(&source, &lexical, &TargetConstraint::Free)
    }

    pub fn translate_words(&self, source: &[String]) -> Result<DecodeOutcome, DecodeError> {
        self.decode(source, &LexicalConstraints::default(), &TargetConstraint::Free)
    }

    /// Best derivation that produces exactly `reference`.
    pub fn translate_with_ref(
        &self,
        source: &[String],
        reference: &[String],
    ) -> Result<DecodeOutcome, DecodeError> {
        let target = TargetConstraint::Reference(reference.to_vec());
        self.decode(source, &LexicalConstraints::default(), &target)
    }

    /// Whether the models can produce `reference` from `source`. The
    /// outcome status is `Completed` or `NoCoverage` unless a limit hit.
    pub fn verify_coverage_for_ref(
        &self,
        source: &[String],
        reference: &[String],
    ) -> Result<DecodeOutcome, DecodeError> {
        let mut settings = self.settings.clone();
        settings.word_graph.enabled = false;
        let target = TargetConstraint::Reference(reference.to_vec());
        StackDecoder::new(self.models, &settings).decode(
            source,
            &LexicalConstraints::default(),
            &target,
        )
    }

    /// Best translation starting with the user-confirmed `prefix`.
    pub fn translate_with_prefix(
        &self,
        source: &[String],
        prefix: &PrefixRequest,
    ) -> Result<DecodeOutcome, DecodeError> {
        let target = TargetConstraint::Prefix(prefix.clone());
        self.decode(source, &LexicalConstraints::default(), &target)
    }

    pub fn decode(
        &self,
        source: &[String],
        lexical: &LexicalConstraints,
        target: &TargetConstraint,
    ) -> Result<DecodeOutcome, DecodeError> {
        if source.is_empty() {
            return Err(DecodeError::EmptySource);
        }
        if source.len() > MAX_SENTENCE_LEN {
            return Err(DecodeError::SentenceTooLong {
                len: source.len(),
                max: MAX_SENTENCE_LEN,
            });
        }
        let _span = debug_span!("decode", src_len = source.len()).entered();
        let started = Instant::now();

        let mut search = Search::new(self.models, self.settings, source, lexical, target);
        let status = search.run(started);
        search.stacks.close();
        search.stats.elapsed = started.elapsed();

        debug!(
            ?status,
            iterations = search.stats.iterations,
            expansions = search.stats.expansions,
            hypotheses = search.arena.len(),
            elapsed_ms = search.stats.elapsed.as_millis() as u64,
        );
        if status.is_limit() {
            warn!(?status, "search stopped early, returning best so far");
        }
        Ok(search.finish(status))
    }
}

struct Search<'d> {
    source: &'d [String],
    settings: &'d DecoderSettings,
    generator: OptionGenerator<'d>,
    scorer: ScoringAggregator<'d>,
    heuristic: Heuristic,
    filter: ConstraintFilter<'d>,
    arena: HypArena,
    stacks: MultiStack,
    graph: Option<WordGraphBuilder>,
    best_complete: Option<(HypId, f64)>,
    best_partial: (HypId, f64),
    next_sweep: usize,
    stats: SearchStats,
}

impl<'d> Search<'d> {
    fn new(
        models: &'d ModelSet,
        settings: &'d DecoderSettings,
        source: &'d [String],
        lexical: &'d LexicalConstraints,
        target: &'d TargetConstraint,
    ) -> Self {
        let generator = OptionGenerator::new(
            source,
            models.phrase_table.as_ref(),
            &settings.weights,
            &settings.options,
            lexical,
        );
        let scorer = ScoringAggregator::new(models, &settings.weights);
        let heuristic = Heuristic::build(settings.search.heuristic, &generator, &scorer);
        let filter = ConstraintFilter::new(lexical, target, settings.options.length_slack);

        let root = Hypothesis::root(models.lm.initial_state());
        let root_adjusted = heuristic.estimate(&root.coverage, 0);
        let graph = settings
            .word_graph
            .enabled
            .then(|| WordGraphBuilder::new(settings.weights.clone(), EquivalenceKey::exact(&root)));
        let stack_key = settings.search.stack_grouping.key(&root);
        let eq_key = settings
            .search
            .equivalence
            .key(&root, settings.search.recombine_lm_state);

        let mut arena = HypArena::new();
        let root_id = arena.push(root);
        let mut stacks = MultiStack::new(settings.search.stack_size, settings.search.stack_margin);
        stacks.insert(root_id, 0.0, root_adjusted, stack_key, eq_key);

        Self {
            source,
            settings,
            generator,
            scorer,
            heuristic,
            filter,
            arena,
            stacks,
            graph,
            best_complete: None,
            best_partial: (root_id, root_adjusted),
            next_sweep: settings.search.arena_sweep,
            stats: SearchStats::default(),
        }
    }

    fn run(&mut self, started: Instant) -> DecodeStatus {
        let settings = self.settings;
        let search = &settings.search;
        let time_limit = search.time_limit();
        let out_of_time = || time_limit.is_some_and(|limit| started.elapsed() >= limit);
        let n = self.source.len();

        loop {
            if out_of_time() {
                return DecodeStatus::TimeLimitExceeded;
            }
            if self.stats.iterations >= search.max_iterations {
                return DecodeStatus::EvaluationLimitExceeded;
            }
            self.stats.iterations += 1;
            if self.arena.len() >= self.next_sweep {
                self.sweep();
            }

            let mut popped = Vec::with_capacity(search.expansions_per_iter);
            while popped.len() < search.expansions_per_iter {
                let next = if search.breadth_first {
                    self.stacks.pop_breadth_first()
                } else {
                    self.stacks.pop_best()
                };
                match next {
                    Some(id) => popped.push(id),
                    None => break,
                }
            }
            if popped.is_empty() {
                return self.exhausted_status();
            }

            for id in popped {
                if out_of_time() {
                    return DecodeStatus::TimeLimitExceeded;
                }
                if self.arena.get(id).is_complete(n) {
                    if !search.breadth_first && self.best_complete.is_some() {
                        return DecodeStatus::Completed;
                    }
                    continue;
                }
                self.expand(id);
            }
        }
    }

    /// Reclaim hypotheses that no stack entry or best pointer reaches.
    fn sweep(&mut self) {
        let before = self.arena.len();
        let roots: Vec<HypId> = self
            .stacks
            .live_ids()
            .chain(self.best_complete.map(|(id, _)| id))
            .chain(std::iter::once(self.best_partial.0))
            .collect();
        let remap = self.arena.compact(roots);
        self.stacks.remap(|id| remap.get(id));
        // Roots always survive compaction.
        if let Some((id, score)) = self.best_complete {
            self.best_complete = remap.get(id).map(|id| (id, score));
        }
        if let Some(id) = remap.get(self.best_partial.0) {
            self.best_partial.0 = id;
        }
        let reclaimed = remap.reclaimed();
        self.stats.reclaimed += reclaimed as u64;
        self.next_sweep = self.arena.len() + self.settings.search.arena_sweep;
        debug!(before, after = self.arena.len(), reclaimed, "arena sweep");
    }

    fn exhausted_status(&self) -> DecodeStatus {
        if self.best_complete.is_some() {
            DecodeStatus::Completed
        } else if self.filter.target().is_free() {
            DecodeStatus::Untranslatable
        } else {
            DecodeStatus::NoCoverage
        }
    }

    fn expand(&mut self, id: HypId) {
        self.stats.expansions += 1;
        let pred = self.arena.get(id).clone();
        let pred_key = self.graph.as_ref().map(|_| EquivalenceKey::exact(&pred));
        let covered = pred.coverage.count();
        let n = self.source.len();

        for span in self.generator.candidate_spans(&pred.coverage, pred.last_end) {
            let completes = covered + span.len() == n;
            let options = match self.generator.options_for(span) {
                Ok(options) => Some(options),
                Err(e) => {
                    trace!(%e);
                    self.stats.spans_without_options += 1;
                    None
                }
            };
            let extra = self
                .filter
                .prefix_options(&pred, span, completes, &self.generator);
            let table = options.as_deref().unwrap_or(&[]);
            for option in table.iter().chain(extra.iter()) {
                self.stats.generated += 1;
                if !self.filter.permits(&pred, option, completes) {
                    self.stats.constraint_rejected += 1;
                    continue;
                }
                self.push_successor(id, &pred, pred_key.as_ref(), option, completes);
            }
        }
    }

    fn push_successor(
        &mut self,
        pred_id: HypId,
        pred: &Hypothesis,
        pred_key: Option<&EquivalenceKey>,
        option: &TranslationOption,
        completes: bool,
    ) {
        let ext = self.scorer.extend(pred, option, completes);
        let jumped = option.span.start != pred.last_end + 1;
        let step = PhraseStep {
            span: option.span,
            target: option.target.clone(),
        };
        let succ = Hypothesis {
            score: pred.score + ext.score_delta,
            components: pred.components + ext.components,
            coverage: pred.coverage.with_span(option.span),
            lm_state: ext.lm_state,
            last_end: option.span.end,
            jumps: pred.jumps + u32::from(jumped),
            target_len: pred.target_len + option.target.len(),
            step: Some(step.clone()),
            back: Some(pred_id),
        };
        let score = succ.score;
        let adjusted = score + self.heuristic.estimate(&succ.coverage, succ.last_end);

        let settings = self.settings;
        let search = &settings.search;
        if search.best_score_pruning {
            if let Some((_, best)) = self.best_complete {
                if adjusted < best {
                    self.stats.pruned += 1;
                    return;
                }
            }
        }

        let stack_key = search.stack_grouping.key(&succ);
        let eq_key = search.equivalence.key(&succ, search.recombine_lm_state);
        let exact = self.graph.as_ref().map(|_| EquivalenceKey::exact(&succ));
        let succ_id = self.arena.push(succ);
        let outcome = self
            .stacks
            .insert(succ_id, score, adjusted, stack_key, eq_key);

        match &outcome {
            InsertOutcome::Inserted { evicted } => {
                self.stats.inserted += 1;
                self.stats.pruned += evicted.len() as u64;
                if completes {
                    self.note_complete(succ_id, score);
                }
                if adjusted > self.best_partial.1 {
                    self.best_partial = (succ_id, adjusted);
                }
            }
            InsertOutcome::Discarded(DiscardReason::Recombined) => self.stats.recombined += 1,
            InsertOutcome::Discarded(_) => self.stats.pruned += 1,
        }

        if let (Some(graph), Some(pred_key), Some(exact)) = (self.graph.as_mut(), pred_key, exact) {
            graph.record(pred_key, exact, &step, ext.components, &outcome, completes);
        }
        if !outcome.is_inserted() {
            self.arena.discard_last(succ_id);
        }
    }

    fn note_complete(&mut self, id: HypId, score: f64) {
        if self.best_complete.is_some_and(|(_, best)| score <= best) {
            return;
        }
        if self.filter.permits_complete(&self.arena, id) {
            self.best_complete = Some((id, score));
        }
    }

    fn finish(self, status: DecodeStatus) -> DecodeOutcome {
        let (id, complete) = match self.best_complete {
            Some((id, _)) => (id, true),
            None => (self.best_partial.0, false),
        };
        let hyp = self.arena.get(id);
        let (words, alignment) = self.arena.reconstruct(id);
        let translation = Translation {
            words,
            alignment,
            score: hyp.score,
            components: hyp.components,
            complete,
        };
        let word_graph = self.graph.map(|builder| {
            let mut graph = builder.finish();
            graph.prune_by_density(self.settings.word_graph.prune_threshold);
            graph
        });
        DecodeOutcome {
            status,
            translation,
            stats: self.stats,
            word_graph,
        }
    }
}
