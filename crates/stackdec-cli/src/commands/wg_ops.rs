use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use stackdec::WordGraph;

use crate::CliError;

pub fn wg_info<W: Write>(file: &Path, out: &mut W) -> Result<(), CliError> {
    let graph = WordGraph::load(file)?;
    writeln!(out, "states: {}", graph.num_states())?;
    writeln!(out, "arcs:   {}", graph.num_arcs())?;
    writeln!(out, "finals: {}", graph.finals().len())?;
    writeln!(out, "weights: {}", graph.weights().to_header())?;
    Ok(())
}

pub fn wg_best<W: Write>(file: &Path, out: &mut W) -> Result<(), CliError> {
    let graph = WordGraph::load(file)?;
    match graph.best_path(&BTreeSet::new()) {
        Some(path) => writeln!(out, "{}\t{}", path.score, graph.path_words(&path).join(" "))?,
        None => return Err(CliError::Usage("word graph has no complete path".to_string())),
    }
    Ok(())
}

pub fn wg_nbest<W: Write>(file: &Path, n: usize, out: &mut W) -> Result<(), CliError> {
    let graph = WordGraph::load(file)?;
    for (i, path) in graph.nbest(n).iter().enumerate() {
        let text = graph.path_words(path).join(" ");
        writeln!(out, "#{:>2}: {}\t{text}", i + 1, path.score)?;
    }
    Ok(())
}

/// Drop arcs scoring more than `threshold` below the best arc into the same
/// state; returns how many were dropped.
pub fn wg_prune(file: &Path, threshold: f64, output: &Path) -> Result<usize, CliError> {
    if threshold.is_nan() || threshold < 0.0 {
        return Err(CliError::Usage("threshold must be non-negative".to_string()));
    }
    let mut graph = WordGraph::load(file)?;
    let flagged = graph.prune_by_density(Some(threshold));
    graph.save(output)?;
    Ok(flagged)
}

/// Rescore every arc under new weights given as a header string
/// (`lm 0.5 , distortion 1`); unnamed weights keep their value.
pub fn wg_reweight(file: &Path, header: &str, output: &Path) -> Result<(), CliError> {
    let mut graph = WordGraph::load(file)?;
    let mut weights = graph.weights().clone();
    weights.apply_header(header).map_err(CliError::Usage)?;
    graph.set_weights(weights);
    graph.save(output)?;
    Ok(())
}
