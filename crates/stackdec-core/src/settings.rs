//! Decoder settings loaded from TOML.
//!
//! - `DecoderSettings::default()` parses the embedded `default_settings.toml`
//! - `parse_settings_toml(toml_content)` parses and validates a custom file
//! - Settings are owned values passed into each decoder; nothing is global

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scoring::Weights;
use crate::search::equivalence::{EquivalencePolicy, StackGrouping};
use crate::search::heuristic::HeuristicKind;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSettings {
    pub search: SearchSettings,
    pub options: OptionSettings,
    pub weights: Weights,
    pub word_graph: WordGraphSettings,
    pub lm: LmSettings,
    pub word_penalty: WordPenaltySettings,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        parse_settings_toml(DEFAULT_SETTINGS_TOML).expect("embedded settings TOML must be valid")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub stack_size: usize,
    pub expansions_per_iter: usize,
    pub breadth_first: bool,
    pub max_iterations: u64,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    pub best_score_pruning: bool,
    #[serde(default)]
    pub stack_margin: Option<f64>,
    pub heuristic: HeuristicKind,
    pub stack_grouping: StackGrouping,
    pub equivalence: EquivalencePolicy,
    pub recombine_lm_state: bool,
    /// Arena growth that triggers reclaiming hypotheses no stack or best
    /// pointer can reach.
    #[serde(default = "default_arena_sweep")]
    pub arena_sweep: usize,
}

fn default_arena_sweep() -> usize {
    1 << 16
}

impl SearchSettings {
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSettings {
    pub max_phrase_len: usize,
    pub option_limit: f64,
    pub nonmonotonicity: usize,
    pub length_slack: usize,
    pub copy_unknown_words: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordGraphSettings {
    pub enabled: bool,
    #[serde(default)]
    pub prune_threshold: Option<f64>,
    #[serde(default)]
    pub correction: CorrectionSettings,
}

/// Edit costs of the error-correcting prefix completion. Costs are in the
/// same log domain as arc scores and are scaled by `weight`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSettings {
    pub enabled: bool,
    pub weight: f64,
    pub insertion: f64,
    pub deletion: f64,
    pub substitution: f64,
}

impl Default for CorrectionSettings {
    fn default() -> Self {
        DecoderSettings::default().word_graph.correction
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmSettings {
    pub order: usize,
    pub interpolation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordPenaltySettings {
    pub p_geom: f64,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<DecoderSettings, SettingsError> {
    let s: DecoderSettings =
        toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &DecoderSettings) -> Result<(), SettingsError> {
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }
    macro_rules! check_open_unit {
        ($section:ident . $field:ident) => {
            let v = s.$section.$field;
            if !(v > 0.0 && v < 1.0) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be in (0, 1)".to_string(),
                });
            }
        };
    }

    check_positive_usize!(search.stack_size);
    check_positive_usize!(search.expansions_per_iter);
    check_positive_usize!(search.arena_sweep);
    if s.search.max_iterations == 0 {
        return Err(SettingsError::InvalidValue {
            field: "search.max_iterations".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if let Some(margin) = s.search.stack_margin {
        if margin.is_nan() || margin < 0.0 {
            return Err(SettingsError::InvalidValue {
                field: "search.stack_margin".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }

    check_positive_usize!(options.max_phrase_len);
    if s.options.option_limit.is_nan() || s.options.option_limit <= 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "options.option_limit".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    if let Some(threshold) = s.word_graph.prune_threshold {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(SettingsError::InvalidValue {
                field: "word_graph.prune_threshold".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
    }

    let c = &s.word_graph.correction;
    for (field, v) in [
        ("word_graph.correction.weight", c.weight),
        ("word_graph.correction.insertion", c.insertion),
        ("word_graph.correction.deletion", c.deletion),
        ("word_graph.correction.substitution", c.substitution),
    ] {
        if v.is_nan() || v < 0.0 || v.is_infinite() {
            return Err(SettingsError::InvalidValue {
                field: field.to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }
    }

    check_positive_usize!(lm.order);
    check_open_unit!(lm.interpolation);
    check_open_unit!(word_penalty.p_geom);

    if s.weights.iter().any(|(_, w)| !w.is_finite()) {
        return Err(SettingsError::InvalidValue {
            field: "weights".to_string(),
            reason: "must be finite".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.search.stack_size, 10);
        assert_eq!(s.search.expansions_per_iter, 1);
        assert!(!s.search.breadth_first);
        assert_eq!(s.search.max_iterations, 1_000_000);
        assert_eq!(s.search.arena_sweep, 65536);
        assert_eq!(s.search.time_limit(), None);
        assert_eq!(s.search.heuristic, HeuristicKind::LocalTd);
        assert_eq!(s.search.stack_grouping, StackGrouping::CardinalityJumps);
        assert_eq!(s.search.equivalence, EquivalencePolicy::CoverageExact);
        assert_eq!(s.options.max_phrase_len, 10);
        assert_eq!(s.options.nonmonotonicity, 0);
        assert_eq!(s.options.length_slack, 2);
        assert!(!s.word_graph.enabled);
        assert_eq!(s.word_graph.prune_threshold, None);
        assert!(s.word_graph.correction.enabled);
        assert_eq!(s.word_graph.correction.substitution, 1.0);
        assert_eq!(s.lm.order, 3);
    }

    #[test]
    fn default_matches_embedded() {
        assert_eq!(
            DecoderSettings::default(),
            parse_settings_toml(default_toml()).unwrap()
        );
    }

    #[test]
    fn parse_optional_limits() {
        let toml = DEFAULT_SETTINGS_TOML.replace(
            "# time_limit_ms = 5000",
            "time_limit_ms = 0",
        );
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.search.time_limit(), Some(Duration::ZERO));
    }

    #[test]
    fn parse_enum_values() {
        let toml = DEFAULT_SETTINGS_TOML
            .replace("heuristic = \"local_td\"", "heuristic = \"none\"")
            .replace(
                "stack_grouping = \"cardinality_jumps\"",
                "stack_grouping = \"pooled\"",
            )
            .replace(
                "equivalence = \"coverage_exact\"",
                "equivalence = \"cardinality_last_pos\"",
            );
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.search.heuristic, HeuristicKind::None);
        assert_eq!(s.search.stack_grouping, StackGrouping::Pooled);
        assert_eq!(s.search.equivalence, EquivalencePolicy::CardinalityLastPos);
    }

    #[test]
    fn error_zero_stack_size() {
        let toml = DEFAULT_SETTINGS_TOML.replace("stack_size = 10", "stack_size = 0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "search.stack_size"));
    }

    #[test]
    fn error_bad_interpolation() {
        let toml = DEFAULT_SETTINGS_TOML.replace("interpolation = 0.7", "interpolation = 1.5");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "lm.interpolation"));
    }

    #[test]
    fn error_negative_option_limit() {
        let toml = DEFAULT_SETTINGS_TOML.replace("option_limit = 10.0", "option_limit = -1.0");
        assert!(parse_settings_toml(&toml).is_err());
    }

    #[test]
    fn parse_without_optional_blocks() {
        let toml = DEFAULT_SETTINGS_TOML
            .replace("src_phrase_len = 0.0\n", "")
            .replace("trg_phrase_len = 0.0\n", "");
        let toml = match toml.find("[word_graph.correction]") {
            Some(start) => {
                let end = toml[start..].find("\n\n").map_or(toml.len(), |e| start + e + 2);
                format!("{}{}", &toml[..start], &toml[end..])
            }
            None => toml,
        };
        let s = parse_settings_toml(&toml).unwrap();
        assert_eq!(s.weights.src_phrase_len, 0.0);
        assert_eq!(s.word_graph.correction, CorrectionSettings::default());
    }

    #[test]
    fn error_negative_correction_cost() {
        let toml = DEFAULT_SETTINGS_TOML.replace("deletion = 2.0", "deletion = -1.0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "word_graph.correction.deletion"));
    }

    #[test]
    fn error_missing_section() {
        assert!(matches!(
            parse_settings_toml("[search]\nstack_size = 3\n"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn error_unknown_heuristic() {
        let toml = DEFAULT_SETTINGS_TOML.replace("heuristic = \"local_td\"", "heuristic = \"magic\"");
        assert!(matches!(parse_settings_toml(&toml), Err(SettingsError::Parse(_))));
    }
}
