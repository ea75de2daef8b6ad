use std::collections::HashSet;

use stackdec_core::preproc::{BasicPreprocessor, Preprocessor};
use stackdec_core::settings::DecoderSettings;
use stackdec_core::{WordGraph, Weights};

/// Interactive translation in progress.
#[derive(Debug)]
pub(crate) struct CatState {
    /// Source as the user typed it, re-tokenized to restore categories.
    pub raw_source: String,
    pub source: Vec<String>,
    /// Search lattice of the initial translation; `None` when the first
    /// decode produced no graph.
    pub graph: Option<WordGraph>,
    pub initial: Vec<String>,
    pub raw_prefix: String,
    pub rejected: HashSet<String>,
}

impl CatState {
    /// Re-score the lattice arcs under `weights` if they changed since the
    /// graph was built.
    pub fn sync_weights(&mut self, weights: &Weights) {
        if let Some(graph) = self.graph.as_mut() {
            if graph.weights() != weights {
                graph.set_weights(weights.clone());
            }
        }
    }
}

/// Per-user state: a private settings copy, a preprocessor and the current
/// interactive translation.
#[derive(Debug)]
pub struct UserSession {
    pub(crate) settings: DecoderSettings,
    pub(crate) preprocessor: BasicPreprocessor,
    pub(crate) cat: Option<CatState>,
}

impl UserSession {
    pub fn new(settings: DecoderSettings) -> Self {
        Self {
            settings,
            preprocessor: BasicPreprocessor::new(),
            cat: None,
        }
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    pub fn has_cat(&self) -> bool {
        self.cat.is_some()
    }

    pub fn raw_prefix(&self) -> Option<&str> {
        self.cat.as_ref().map(|c| c.raw_prefix.as_str())
    }

    /// Replace the session settings, re-weighting any open lattice.
    pub(crate) fn apply_settings(&mut self, settings: DecoderSettings) {
        if let Some(cat) = self.cat.as_mut() {
            cat.sync_weights(&settings.weights);
        }
        self.settings = settings;
    }

    pub(crate) fn apply_weights(&mut self, weights: &Weights) {
        if let Some(cat) = self.cat.as_mut() {
            cat.sync_weights(weights);
        }
        self.settings.weights = weights.clone();
    }

    /// Tokenize for decoding, remembering category originals.
    pub(crate) fn tokenize(&mut self, raw: &str, case_convert: bool) -> Vec<String> {
        self.preprocessor.preprocess(raw, case_convert, true)
    }

    /// Reload category originals of the current source so the next
    /// postprocess call restores them from the start.
    pub(crate) fn prime_categories(&mut self, case_convert: bool) {
        if let Some(cat) = &self.cat {
            self.preprocessor
                .preprocess(&cat.raw_source, case_convert, true);
        }
    }
}
