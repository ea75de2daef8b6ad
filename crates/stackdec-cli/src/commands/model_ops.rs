use std::path::Path;

use stackdec::models::{LanguageModel, MemoryPhraseTable, NgramLanguageModel, PhraseTable};
use tracing::info;

use super::{load_engine, read_lines, words, SearchOverrides};
use crate::CliError;

/// Re-save a phrase table (text or binary) in binary form.
pub fn convert_phrase_table(input: &Path, output: &Path) -> Result<(), CliError> {
    let table = MemoryPhraseTable::open(input)?;
    table.save(output)?;
    println!(
        "phrase table: {} sources, {} pairs -> {}",
        table.num_sources(),
        table.num_pairs(),
        output.display()
    );
    Ok(())
}

/// Train a language model from a corpus (or load a binary one) and save it
/// in binary form.
pub fn convert_lm(input: &Path, output: &Path, order: usize, lambda: f64) -> Result<(), CliError> {
    if order == 0 || !(lambda > 0.0 && lambda < 1.0) {
        return Err(CliError::Usage(
            "order must be positive and lambda in (0, 1)".to_string(),
        ));
    }
    let lm = NgramLanguageModel::open(input, order, lambda)?;
    lm.save(output)?;
    println!(
        "language model: order {}, {} words -> {}",
        lm.order(),
        lm.vocab_size(),
        output.display()
    );
    Ok(())
}

/// Online training over a parallel corpus, then save both updated models.
/// Returns the number of sentence pairs used.
pub fn train_cmd(
    config_file: &Path,
    source_file: &Path,
    reference_file: &Path,
    table_out: &Path,
    lm_out: &Path,
) -> Result<usize, CliError> {
    let (mut models, settings) = load_engine(config_file, &SearchOverrides::default())?;
    let sources = read_lines(Some(source_file))?;
    let references = read_lines(Some(reference_file))?;
    if sources.len() != references.len() {
        return Err(CliError::Usage(format!(
            "{} source lines but {} reference lines",
            sources.len(),
            references.len()
        )));
    }
    for (src, reference) in sources.iter().zip(&references) {
        models.train_pair(&words(src), &words(reference), settings.options.max_phrase_len)?;
    }
    models.phrase_table.save(table_out)?;
    models.lm.save(lm_out)?;
    info!(pairs = sources.len(), "models trained and saved");
    Ok(sources.len())
}
