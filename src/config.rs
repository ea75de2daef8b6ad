//! Engine configuration file.
//!
//! ```toml
//! settings = "decoder.toml"   # optional, embedded defaults otherwise
//! case_convert = true
//!
//! [models]
//! phrase_table = "table.txt"  # text or binary, sniffed on load
//! lm = "corpus.txt"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stackdec_core::models::registry::{ModelPaths, ModelRegistry};
use stackdec_core::models::ModelError;
use stackdec_core::settings::{parse_settings_toml, DecoderSettings, SettingsError};
use stackdec_session::DecoderService;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    pub models: ModelPaths,
    #[serde(default)]
    pub settings: Option<PathBuf>,
    #[serde(default)]
    pub case_convert: bool,
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Parse(e.to_string()))
    }

    /// Read a config file and anchor its relative paths at the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = read(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn resolve_relative_to(&mut self, base: &Path) {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.models.phrase_table);
        anchor(&mut self.models.lm);
        if let Some(settings) = self.settings.as_mut() {
            anchor(settings);
        }
    }

    pub fn load_settings(&self) -> Result<DecoderSettings, EngineError> {
        match &self.settings {
            Some(path) => Ok(parse_settings_toml(&read(path)?)?),
            None => Ok(DecoderSettings::default()),
        }
    }

    /// Load settings and every model, then wrap them in a service.
    pub fn build_service(&self) -> Result<DecoderService, EngineError> {
        let settings = self.load_settings()?;
        let registry = ModelRegistry::default();
        let models = registry.load(&self.models, &settings.lm, &settings.word_penalty)?;
        tracing::info!(?models, case_convert = self.case_convert, "engine ready");
        Ok(DecoderService::new(models, settings)
            .with_registry(registry)
            .with_case_conversion(self.case_convert))
    }
}

fn read(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "la ||| the ||| 3\ncasa ||| house ||| 2\n";
    const CORPUS: &str = "the house\nthe big house\n";

    fn write_models(dir: &Path) {
        fs::write(dir.join("table.txt"), TABLE).unwrap();
        fs::write(dir.join("corpus.txt"), CORPUS).unwrap();
    }

    #[test]
    fn parse_minimal_config() {
        let config = EngineConfig::from_toml_str(
            "[models]\nphrase_table = \"t.txt\"\nlm = \"c.txt\"\n",
        )
        .unwrap();
        assert_eq!(config.models.phrase_table_kind, "memory");
        assert_eq!(config.models.lm_kind, "ngram");
        assert_eq!(config.settings, None);
        assert!(!config.case_convert);
    }

    #[test]
    fn parse_error_is_reported() {
        assert!(matches!(
            EngineConfig::from_toml_str("[models]\nlm = 3\n"),
            Err(EngineError::Parse(_))
        ));
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        write_models(dir.path());
        let path = dir.path().join("engine.toml");
        fs::write(
            &path,
            "case_convert = true\n[models]\nphrase_table = \"table.txt\"\nlm = \"corpus.txt\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.models.phrase_table, dir.path().join("table.txt"));
        assert!(config.case_convert);

        let service = config.build_service().unwrap();
        assert_eq!(service.translate(1, "la casa").unwrap().text, "the house");
    }

    #[test]
    fn custom_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        write_models(dir.path());
        let settings = stackdec_core::settings::default_toml().replace("stack_size = 10", "stack_size = 3");
        fs::write(dir.path().join("decoder.toml"), settings).unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(
            &path,
            "settings = \"decoder.toml\"\n[models]\nphrase_table = \"table.txt\"\nlm = \"corpus.txt\"\n",
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.load_settings().unwrap().search.stack_size, 3);
    }

    #[test]
    fn missing_model_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::from_toml_str(&format!(
            "[models]\nphrase_table = {:?}\nlm = {:?}\n",
            dir.path().join("none.txt"),
            dir.path().join("none.lm"),
        ))
        .unwrap();
        assert!(matches!(config.build_service(), Err(EngineError::Model(_))));
    }
}
