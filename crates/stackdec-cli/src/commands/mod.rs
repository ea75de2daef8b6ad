pub mod config_ops;
pub mod decode_ops;
pub mod model_ops;
pub mod server_ops;
pub mod wg_ops;


use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use clap::Args;
use stackdec::models::registry::ModelRegistry;
use stackdec::{DecoderSettings, EngineConfig, ModelSet};

use crate::CliError;

/// Command-line overrides of the decoder settings, named after the
/// decoder's parameter letters.
#[derive(Debug, Clone, Default, Args)]
pub struct SearchOverrides {
    /// S: hypotheses kept per stack
    #[arg(short = 'S', long)]
    pub stack_size: Option<usize>,
    /// I: hypotheses expanded per iteration
    #[arg(short = 'I', long)]
    pub expansions: Option<usize>,
    /// U: reordering budget (0 = monotone)
    #[arg(short = 'U', long)]
    pub nonmonotonicity: Option<usize>,
    /// A: longest source phrase
    #[arg(short = 'A', long)]
    pub max_phrase_len: Option<usize>,
    /// W: option cap (>= 1) or log-threshold (< 1)
    #[arg(short = 'W', long)]
    pub option_limit: Option<f64>,
    /// E: length slack of synthesized prefix segments
    #[arg(short = 'E', long)]
    pub length_slack: Option<usize>,
    /// Exhaust every stack instead of stopping at the first complete pop
    #[arg(long)]
    pub breadth_first: bool,
    #[arg(long)]
    pub max_iterations: Option<u64>,
    #[arg(long)]
    pub time_limit_ms: Option<u64>,
}

impl SearchOverrides {
    pub fn apply(&self, settings: &mut DecoderSettings) {
        if let Some(v) = self.stack_size {
            settings.search.stack_size = v.max(1);
        }
        if let Some(v) = self.expansions {
            settings.search.expansions_per_iter = v.max(1);
        }
        if let Some(v) = self.nonmonotonicity {
            settings.options.nonmonotonicity = v;
        }
        if let Some(v) = self.max_phrase_len {
            settings.options.max_phrase_len = v.max(1);
        }
        if let Some(v) = self.option_limit.filter(|v| *v > 0.0) {
            settings.options.option_limit = v;
        }
        if let Some(v) = self.length_slack {
            settings.options.length_slack = v;
        }
        if self.breadth_first {
            settings.search.breadth_first = true;
        }
        if let Some(v) = self.max_iterations {
            settings.search.max_iterations = v.max(1);
        }
        if self.time_limit_ms.is_some() {
            settings.search.time_limit_ms = self.time_limit_ms;
        }
    }
}

/// Settings and models named by an engine config file.
pub fn load_engine(
    config_file: &Path,
    overrides: &SearchOverrides,
) -> Result<(ModelSet, DecoderSettings), CliError> {
    let config = EngineConfig::load(config_file)?;
    let mut settings = config.load_settings()?;
    overrides.apply(&mut settings);
    let models = ModelRegistry::default().load(&config.models, &settings.lm, &settings.word_penalty)?;
    Ok((models, settings))
}

/// Non-empty lines of `path`, or of stdin when `path` is `None` or `-`.
pub fn read_lines(path: Option<&Path>) -> Result<Vec<String>, CliError> {
    let reader: Box<dyn BufRead> = match path {
        Some(p) if p != Path::new("-") => Box::new(BufReader::new(fs::File::open(p)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

pub(crate) fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}
