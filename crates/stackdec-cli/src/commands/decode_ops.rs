use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use stackdec::search::{AlignedPhrase, SearchStats};
use stackdec::{DecodeStatus, EngineConfig, StackDecoder};
use tracing::{info, warn};

use super::{load_engine, read_lines, words, SearchOverrides};
use crate::{CliError, EXIT_ERROR, EXIT_LIMIT_EXCEEDED, EXIT_OK};

#[derive(Debug, Serialize)]
struct DecodeRecord<'a> {
    line: usize,
    text: String,
    status: DecodeStatus,
    score: f64,
    complete: bool,
    alignment: &'a [AlignedPhrase],
    stats: &'a SearchStats,
}

/// Batch decoding, one sentence per line, one translation per line.
///
/// Returns the process exit code: [`EXIT_LIMIT_EXCEEDED`] when any sentence
/// stopped at a limit, [`EXIT_ERROR`] when any sentence could not be
/// decoded at all.
pub fn decode_cmd<W: Write>(
    config_file: &Path,
    input: Option<&Path>,
    overrides: &SearchOverrides,
    json: bool,
    wg_dir: Option<&Path>,
    out: &mut W,
) -> Result<i32, CliError> {
    let (models, mut settings) = load_engine(config_file, overrides)?;
    if let Some(dir) = wg_dir {
        fs::create_dir_all(dir)?;
        settings.word_graph.enabled = true;
    }
    let decoder = StackDecoder::new(&models, &settings);
    let sentences = read_lines(input)?;

    let mut limited = 0usize;
    let mut failed = 0usize;
    for (i, sentence) in sentences.iter().enumerate() {
        let line = i + 1;
        let outcome = match decoder.translate(sentence) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(line, error = %e, "sentence not decoded");
                failed += 1;
                writeln!(out)?;
                continue;
            }
        };
        if outcome.status.is_limit() {
            limited += 1;
        }
        let text = if outcome.status == DecodeStatus::Untranslatable {
            warn!(line, "untranslatable sentence, passing source through");
            sentence.clone()
        } else {
            outcome.translation.text()
        };

        if let (Some(dir), Some(graph)) = (wg_dir, &outcome.word_graph) {
            graph.save(&dir.join(format!("{line}.wg")))?;
        }

        if json {
            let record = DecodeRecord {
                line,
                text,
                status: outcome.status,
                score: outcome.translation.score,
                complete: outcome.translation.complete,
                alignment: &outcome.translation.alignment,
                stats: &outcome.stats,
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{text}")?;
        }
    }
    info!(
        sentences = sentences.len(),
        limited, failed, "batch decoding finished"
    );

    Ok(if failed > 0 {
        EXIT_ERROR
    } else if limited > 0 {
        EXIT_LIMIT_EXCEEDED
    } else {
        EXIT_OK
    })
}

/// Check, line by line, whether the models can generate each reference.
/// Prints `<line>\t<covered|not covered>\t<status>`; returns how many pairs
/// are covered.
pub fn verify_cmd<W: Write>(
    config_file: &Path,
    source_file: &Path,
    reference_file: &Path,
    overrides: &SearchOverrides,
    out: &mut W,
) -> Result<usize, CliError> {
    let (models, settings) = load_engine(config_file, overrides)?;
    let decoder = StackDecoder::new(&models, &settings);
    let sources = read_lines(Some(source_file))?;
    let references = read_lines(Some(reference_file))?;
    if sources.len() != references.len() {
        return Err(CliError::Usage(format!(
            "{} source lines but {} reference lines",
            sources.len(),
            references.len()
        )));
    }

    let mut covered = 0;
    for (i, (src, reference)) in sources.iter().zip(&references).enumerate() {
        let outcome = decoder.verify_coverage_for_ref(&words(src), &words(reference))?;
        let ok = outcome.status == DecodeStatus::Completed;
        if ok {
            covered += 1;
        }
        writeln!(
            out,
            "{}\t{}\t{:?}",
            i + 1,
            if ok { "covered" } else { "not covered" },
            outcome.status
        )?;
    }
    Ok(covered)
}

/// Interactive translation of one sentence: prints the initial suggestion,
/// then the completion for each prefix in turn.
pub fn prefix_cmd<W: Write>(
    config_file: &Path,
    source: &str,
    prefixes: &[String],
    rejected: &[String],
    overrides: &SearchOverrides,
    out: &mut W,
) -> Result<(), CliError> {
    let config = EngineConfig::load(config_file)?;
    let service = config.build_service()?;
    let mut settings = service.settings()?;
    overrides.apply(&mut settings);
    service.set_settings(settings)?;

    writeln!(out, "{}", service.start_cat(0, source)?)?;
    for prefix in prefixes {
        writeln!(out, "{}", service.set_prefix(0, prefix, rejected)?)?;
    }
    Ok(())
}
