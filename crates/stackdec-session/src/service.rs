use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use stackdec_core::models::registry::{ModelPaths, ModelRegistry};
use stackdec_core::models::ModelSet;
use stackdec_core::preproc::{merge_completion, PrefixMapping, Preprocessor};
use stackdec_core::search::{DecodeOutcome, DecodeStatus, StackDecoder};
use stackdec_core::settings::DecoderSettings;
use stackdec_core::Weights;
use tracing::{debug, info, warn};

use crate::protocol::{Request, Response, TranslationReply};
use crate::user::{CatState, UserSession};
use crate::{ServiceError, UserId};

/// Models shared by every request. Decoding holds the read lock for the
/// whole search; training and reloading take the write lock.
pub type ModelContext = Arc<RwLock<ModelSet>>;

fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

pub struct DecoderService {
    models: ModelContext,
    settings: RwLock<DecoderSettings>,
    registry: ModelRegistry,
    users: Mutex<HashMap<UserId, Arc<Mutex<UserSession>>>>,
    case_convert: bool,
}

impl DecoderService {
    pub fn new(models: ModelSet, settings: DecoderSettings) -> Self {
        Self::with_context(Arc::new(RwLock::new(models)), settings)
    }

    pub fn with_context(models: ModelContext, settings: DecoderSettings) -> Self {
        Self {
            models,
            settings: RwLock::new(settings),
            registry: ModelRegistry::default(),
            users: Mutex::new(HashMap::new()),
            case_convert: false,
        }
    }

    /// Lowercase interactive input and capitalise interactive output.
    pub fn with_case_conversion(mut self, enabled: bool) -> Self {
        self.case_convert = enabled;
        self
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn models(&self) -> &ModelContext {
        &self.models
    }

    pub fn settings(&self) -> Result<DecoderSettings, ServiceError> {
        Ok(self.settings.read().map_err(|_| ServiceError::Poisoned)?.clone())
    }

    pub(crate) fn user(&self, user: UserId) -> Result<Arc<Mutex<UserSession>>, ServiceError> {
        let mut users = self.users.lock().map_err(|_| ServiceError::Poisoned)?;
        if let Some(session) = users.get(&user) {
            return Ok(Arc::clone(session));
        }
        let settings = self.settings()?;
        debug!(user, "new user session");
        let session = Arc::new(Mutex::new(UserSession::new(settings)));
        users.insert(user, Arc::clone(&session));
        Ok(session)
    }

    /// Replace the base settings and the settings of every open session.
    pub fn set_settings(&self, settings: DecoderSettings) -> Result<(), ServiceError> {
        *self.settings.write().map_err(|_| ServiceError::Poisoned)? = settings.clone();
        let users = self.users.lock().map_err(|_| ServiceError::Poisoned)?;
        for session in users.values() {
            Self::lock_user(session)?.apply_settings(settings.clone());
        }
        Ok(())
    }

    fn lock_user(session: &Mutex<UserSession>) -> Result<MutexGuard<'_, UserSession>, ServiceError> {
        session.lock().map_err(|_| ServiceError::Poisoned)
    }

    fn decode_with<F>(&self, settings: &DecoderSettings, run: F) -> Result<DecodeOutcome, ServiceError>
    where
        F: FnOnce(&StackDecoder<'_>) -> Result<DecodeOutcome, stackdec_core::search::DecodeError>,
    {
        let models = self.models.read().map_err(|_| ServiceError::Poisoned)?;
        let decoder = StackDecoder::new(&models, settings);
        Ok(run(&decoder)?)
    }

    /// Translate a tokenized sentence, which may carry phrase-pair markup.
    /// Limits yield the best hypothesis so far; a sentence nothing can
    /// translate comes back unchanged.
    pub fn translate(&self, user: UserId, source: &str) -> Result<TranslationReply, ServiceError> {
        let session = self.user(user)?;
        let settings = Self::lock_user(&session)?.settings.clone();
        let outcome = self.decode_with(&settings, |d| d.translate(source))?;
        let text = if outcome.status == DecodeStatus::Untranslatable {
            warn!(user, "untranslatable sentence, passing source through");
            strip_markup(source)
        } else {
            outcome.translation.text()
        };
        Ok(TranslationReply::from_outcome(&outcome, text))
    }

    pub fn translate_with_ref(
        &self,
        user: UserId,
        source: &str,
        reference: &str,
    ) -> Result<TranslationReply, ServiceError> {
        let session = self.user(user)?;
        let settings = Self::lock_user(&session)?.settings.clone();
        let outcome = self.decode_with(&settings, |d| {
            d.translate_with_ref(&words(source), &words(reference))
        })?;
        let text = outcome.translation.text();
        Ok(TranslationReply::from_outcome(&outcome, text))
    }

    /// Whether the models can generate `reference` from `source`.
    pub fn verify_coverage(
        &self,
        user: UserId,
        source: &str,
        reference: &str,
    ) -> Result<DecodeStatus, ServiceError> {
        let session = self.user(user)?;
        let settings = Self::lock_user(&session)?.settings.clone();
        let outcome = self.decode_with(&settings, |d| {
            d.verify_coverage_for_ref(&words(source), &words(reference))
        })?;
        Ok(outcome.status)
    }

    /// Begin an interactive translation of raw `source` text and return the
    /// initial suggestion.
    pub fn start_cat(&self, user: UserId, source: &str) -> Result<String, ServiceError> {
        let session = self.user(user)?;
        let mut session = Self::lock_user(&session)?;
        let tokens = session.tokenize(source, self.case_convert);

        let mut settings = session.settings.clone();
        settings.word_graph.enabled = true;
        let outcome = self.decode_with(&settings, |d| d.translate_words(&tokens))?;
        let initial = if outcome.status == DecodeStatus::Untranslatable {
            tokens.clone()
        } else {
            outcome.translation.words.clone()
        };
        debug!(
            user,
            status = ?outcome.status,
            arcs = outcome.word_graph.as_ref().map_or(0, |g| g.num_arcs()),
            "interactive session started"
        );

        session.cat = Some(CatState {
            raw_source: source.to_string(),
            source: tokens,
            graph: outcome.word_graph,
            initial: initial.clone(),
            raw_prefix: String::new(),
            rejected: HashSet::new(),
        });
        session.prime_categories(self.case_convert);
        Ok(session.preprocessor.postprocess(&initial, self.case_convert))
    }

    /// Append `text` to the user's prefix; `rejected` replaces the words
    /// refused for the slot after it.
    pub fn add_to_prefix(
        &self,
        user: UserId,
        text: &str,
        rejected: &[String],
    ) -> Result<String, ServiceError> {
        let prefix = {
            let session = self.user(user)?;
            let session = Self::lock_user(&session)?;
            let cat = session.cat.as_ref().ok_or(ServiceError::NoCatSession(user))?;
            format!("{}{}", cat.raw_prefix, text)
        };
        self.set_prefix(user, &prefix, rejected)
    }

    /// Replace the user's prefix and return the completed sentence; the raw
    /// prefix is kept exactly as typed.
    pub fn set_prefix(
        &self,
        user: UserId,
        prefix: &str,
        rejected: &[String],
    ) -> Result<String, ServiceError> {
        let session = self.user(user)?;
        let mut guard = Self::lock_user(&session)?;
        let session = &mut *guard;
        let case_convert = self.case_convert;
        let cat = session.cat.as_mut().ok_or(ServiceError::NoCatSession(user))?;
        cat.sync_weights(&session.settings.weights);
        cat.raw_prefix = prefix.to_string();
        cat.rejected = rejected.iter().cloned().collect();

        let mapping = PrefixMapping::from_raw(prefix, &mut session.preprocessor, case_convert);
        let request = mapping.to_request(cat.rejected.iter().cloned());

        let correction = session.settings.word_graph.correction;
        let from_graph = cat.graph.as_ref().and_then(|graph| {
            if let Some(path) = graph.complete_prefix(&request) {
                return Some(graph.path_words(&path));
            }
            if !correction.enabled {
                return None;
            }
            let corrected = graph.correct_prefix(&request, &correction)?;
            debug!(user, edit_cost = corrected.edit_cost, "prefix completed by correction");
            Some(corrected.words)
        });
        let target = match from_graph {
            Some(words) => words,
            None => {
                debug!(user, "prefix not in word graph, decoding again");
                let outcome = self.decode_with(&session.settings, |d| {
                    d.translate_with_prefix(&cat.source, &request)
                })?;
                if outcome.translation.complete {
                    outcome.translation.words
                } else {
                    warn!(user, status = ?outcome.status, "no completion for prefix");
                    mapping.tokens.clone()
                }
            }
        };

        let raw_source = cat.raw_source.clone();
        session
            .preprocessor
            .preprocess(&raw_source, case_convert, true);
        Ok(merge_completion(
            prefix,
            &mapping,
            &target,
            &mut session.preprocessor,
            case_convert,
        ))
    }

    /// Drop the prefix and return the initial suggestion again.
    pub fn reset_prefix(&self, user: UserId) -> Result<String, ServiceError> {
        let session = self.user(user)?;
        let mut guard = Self::lock_user(&session)?;
        let session = &mut *guard;
        let initial = {
            let cat = session.cat.as_mut().ok_or(ServiceError::NoCatSession(user))?;
            cat.sync_weights(&session.settings.weights);
            cat.raw_prefix.clear();
            cat.rejected.clear();
            cat.graph
                .as_ref()
                .and_then(|g| g.best_path(&BTreeSet::new()).map(|p| g.path_words(&p)))
                .unwrap_or_else(|| cat.initial.clone())
        };
        session.prime_categories(self.case_convert);
        Ok(session.preprocessor.postprocess(&initial, self.case_convert))
    }

    pub fn release_user(&self, user: UserId) -> Result<bool, ServiceError> {
        let mut users = self.users.lock().map_err(|_| ServiceError::Poisoned)?;
        Ok(users.remove(&user).is_some())
    }

    /// Online update of the shared models from one tokenized sentence pair.
    pub fn train_pair(&self, source: &str, reference: &str) -> Result<(), ServiceError> {
        let max_phrase_len = self.settings()?.options.max_phrase_len;
        let mut models = self.models.write().map_err(|_| ServiceError::Poisoned)?;
        models.train_pair(&words(source), &words(reference), max_phrase_len)?;
        Ok(())
    }

    /// Load a new model set and swap it in. The current models stay in
    /// place when loading fails.
    pub fn reload(&self, paths: &ModelPaths) -> Result<(), ServiceError> {
        let settings = self.settings()?;
        let loaded = self
            .registry
            .load(paths, &settings.lm, &settings.word_penalty)?;
        let mut models = self.models.write().map_err(|_| ServiceError::Poisoned)?;
        *models = loaded;
        info!(
            phrase_table = %paths.phrase_table.display(),
            lm = %paths.lm.display(),
            "models reloaded"
        );
        Ok(())
    }

    /// Current weights in word-graph header layout.
    pub fn print_weights(&self) -> Result<String, ServiceError> {
        let settings = self.settings.read().map_err(|_| ServiceError::Poisoned)?;
        Ok(settings.weights.to_header())
    }

    /// Update weights from a header string (`name value , ...`) for the
    /// service and every open user session.
    pub fn set_weights(&self, header: &str) -> Result<Weights, ServiceError> {
        let mut settings = self.settings.write().map_err(|_| ServiceError::Poisoned)?;
        let mut weights = settings.weights.clone();
        weights
            .apply_header(header)
            .map_err(ServiceError::InvalidWeights)?;
        settings.weights = weights.clone();
        drop(settings);

        let users = self.users.lock().map_err(|_| ServiceError::Poisoned)?;
        for session in users.values() {
            Self::lock_user(session)?.apply_weights(&weights);
        }
        info!(weights = %weights.to_header(), "weights updated");
        Ok(weights)
    }

    /// Dispatch one protocol request.
    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Translate { user, source } => {
                self.translate(user, &source).map(Response::Translation)
            }
            Request::TranslateWithRef {
                user,
                source,
                reference,
            } => self
                .translate_with_ref(user, &source, &reference)
                .map(Response::Translation),
            Request::VerifyCoverage {
                user,
                source,
                reference,
            } => self
                .verify_coverage(user, &source, &reference)
                .map(|status| Response::Coverage {
                    covered: status == DecodeStatus::Completed,
                    status,
                }),
            Request::StartCat { user, source } => self
                .start_cat(user, &source)
                .map(|text| Response::Completion { text }),
            Request::AddToPrefix {
                user,
                text,
                rejected,
            } => self
                .add_to_prefix(user, &text, &rejected)
                .map(|text| Response::Completion { text }),
            Request::SetPrefix {
                user,
                prefix,
                rejected,
            } => self
                .set_prefix(user, &prefix, &rejected)
                .map(|text| Response::Completion { text }),
            Request::ResetPrefix { user } => self
                .reset_prefix(user)
                .map(|text| Response::Completion { text }),
            Request::TrainPair { source, reference } => {
                self.train_pair(&source, &reference).map(|_| Response::Ok)
            }
            Request::Reload { paths } => self.reload(&paths).map(|_| Response::Ok),
            Request::PrintWeights => self
                .print_weights()
                .map(|header| Response::Weights { header }),
            Request::SetWeights { weights } => self
                .set_weights(&weights)
                .map(|w| Response::Weights {
                    header: w.to_header(),
                }),
            Request::ReleaseUser { user } => self.release_user(user).map(|_| Response::Ok),
        };
        result.unwrap_or_else(|e| {
            warn!(error = %e, "request failed");
            Response::error(e)
        })
    }
}

/// Plain source words of a sentence that may carry phrase-pair markup.
fn strip_markup(source: &str) -> String {
    match stackdec_core::search::LexicalConstraints::parse_annotated(source) {
        Ok((words, _)) => words.join(" "),
        Err(_) => source.to_string(),
    }
}
