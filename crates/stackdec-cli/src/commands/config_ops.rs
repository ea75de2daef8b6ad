use std::fs;
use std::path::Path;

use stackdec::settings::{default_toml, parse_settings_toml};

use crate::CliError;

pub fn settings_export() {
    print!("{}", default_toml());
}

/// Parse and validate a settings file; returns a one-line summary.
pub fn settings_validate(file: &Path) -> Result<String, CliError> {
    let content = fs::read_to_string(file)?;
    let s = parse_settings_toml(&content)
        .map_err(|e| CliError::Usage(format!("{}: {e}", file.display())))?;
    Ok(format!(
        "OK: S={} I={} U={} A={} W={} E={} heuristic={:?}",
        s.search.stack_size,
        s.search.expansions_per_iter,
        s.options.nonmonotonicity,
        s.options.max_phrase_len,
        s.options.option_limit,
        s.options.length_slack,
        s.search.heuristic
    ))
}
