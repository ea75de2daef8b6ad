//! Runtime selection of model implementations by kind name.

use std::collections::HashMap;
use std::path::Path;

use super::{
    GeometricWordPenalty, LanguageModel, MemoryPhraseTable, ModelError, ModelSet,
    NgramLanguageModel, PhraseTable, WordPenaltyModel,
};
use crate::settings::{LmSettings, WordPenaltySettings};

pub type PhraseTableLoader = fn(&Path) -> Result<Box<dyn PhraseTable>, ModelError>;
pub type LanguageModelLoader = fn(&Path, &LmSettings) -> Result<Box<dyn LanguageModel>, ModelError>;

/// Where to load each model from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelPaths {
    #[serde(default = "default_phrase_table_kind")]
    pub phrase_table_kind: String,
    pub phrase_table: std::path::PathBuf,
    #[serde(default = "default_lm_kind")]
    pub lm_kind: String,
    pub lm: std::path::PathBuf,
}

fn default_phrase_table_kind() -> String {
    "memory".to_string()
}

fn default_lm_kind() -> String {
    "ngram".to_string()
}

pub struct ModelRegistry {
    phrase_tables: HashMap<String, PhraseTableLoader>,
    lms: HashMap<String, LanguageModelLoader>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self {
            phrase_tables: HashMap::new(),
            lms: HashMap::new(),
        };
        registry.register_phrase_table("memory", |path| {
            Ok(Box::new(MemoryPhraseTable::open(path)?))
        });
        registry.register_lm("ngram", |path, lm| {
            Ok(Box::new(NgramLanguageModel::open(
                path,
                lm.order,
                lm.interpolation,
            )?))
        });
        registry
    }
}

impl ModelRegistry {
    pub fn register_phrase_table(&mut self, kind: &str, loader: PhraseTableLoader) {
        self.phrase_tables.insert(kind.to_string(), loader);
    }

    pub fn register_lm(&mut self, kind: &str, loader: LanguageModelLoader) {
        self.lms.insert(kind.to_string(), loader);
    }

    pub fn load_phrase_table(&self, kind: &str, path: &Path) -> Result<Box<dyn PhraseTable>, ModelError> {
        let loader = self
            .phrase_tables
            .get(kind)
            .ok_or_else(|| ModelError::UnknownKind(kind.to_string()))?;
        loader(path)
    }

    pub fn load_lm(
        &self,
        kind: &str,
        path: &Path,
        settings: &LmSettings,
    ) -> Result<Box<dyn LanguageModel>, ModelError> {
        let loader = self
            .lms
            .get(kind)
            .ok_or_else(|| ModelError::UnknownKind(kind.to_string()))?;
        loader(path, settings)
    }

    /// Load a complete model set. Nothing is returned unless every model
    /// loads, so callers can swap it in atomically.
    pub fn load(
        &self,
        paths: &ModelPaths,
        lm: &LmSettings,
        word_penalty: &WordPenaltySettings,
    ) -> Result<ModelSet, ModelError> {
        let phrase_table = self.load_phrase_table(&paths.phrase_table_kind, &paths.phrase_table)?;
        let lm = self.load_lm(&paths.lm_kind, &paths.lm, lm)?;
        let word_penalty: Box<dyn WordPenaltyModel> =
            Box::new(GeometricWordPenalty::new(word_penalty.p_geom));
        Ok(ModelSet::new(phrase_table, lm, word_penalty))
    }
}
