//! Text serialization of word graphs.
//!
//! ```text
//! # direct 1 , inverse 1 , lm 1 , word_penalty 1 , distortion 0.5 , phrase_penalty 0 , src_phrase_len 0 , trg_phrase_len 0
//! 4 7
//! 0 1 -2.5 ||| -0.69 0 -3.1 -0.36 0 -1 -2.41 -0.11 ||| 1 1 ||| the
//! ```
//!
//! The optional first line holds the weights, the next line lists the final
//! states, and every other line is an arc: predecessor, successor, weighted
//! score, unweighted components, source span, target words. Pruned arcs are
//! not written.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use super::{StateId, WordGraph};
use crate::scoring::{ScoreComponents, Weights, NUM_FEATURES};
use crate::search::coverage::Span;

#[derive(Debug, thiserror::Error)]
pub enum WordGraphError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

fn parse_err(line: usize, reason: impl Into<String>) -> WordGraphError {
    WordGraphError::Parse {
        line,
        reason: reason.into(),
    }
}

impl WordGraph {
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "# {}", self.weights.to_header())?;
        let finals: Vec<String> = self.finals.iter().map(|s| s.to_string()).collect();
        writeln!(w, "{}", finals.join(" "))?;
        for (id, arc) in self.arcs.iter().enumerate() {
            if self.pruned[id] {
                continue;
            }
            let comps: Vec<String> = arc
                .components
                .values()
                .iter()
                .map(|v| v.to_string())
                .collect();
            writeln!(
                w,
                "{} {} {} ||| {} ||| {} {} ||| {}",
                arc.pred,
                arc.succ,
                self.scores[id],
                comps.join(" "),
                arc.span.start,
                arc.span.end,
                arc.words.join(" ")
            )?;
        }
        Ok(())
    }

    /// Parse the text layout. State ids are bounded by the number of arcs
    /// (a graph with `n` arcs has at most `2n + 1` states), so a corrupt id
    /// cannot trigger a huge allocation.
    pub fn read_from<R: BufRead>(reader: R) -> Result<Self, WordGraphError> {
        let mut weights = Weights::default();
        let mut finals: Option<(usize, Vec<StateId>)> = None;
        let mut arcs: Vec<(usize, ParsedArc)> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let lineno = idx + 1;
            let line = line?;
            let line = line.trim();
            // A blank final-state line means the graph has no final state.
            if line.is_empty() && finals.is_some() {
                continue;
            }
            if let Some(header) = line.strip_prefix('#') {
                if finals.is_none() {
                    weights
                        .apply_header(header)
                        .map_err(|reason| parse_err(lineno, reason))?;
                }
                continue;
            }
            if finals.is_none() {
                let states = line
                    .split_whitespace()
                    .map(|tok| {
                        tok.parse::<StateId>()
                            .map_err(|_| parse_err(lineno, format!("bad final state {tok:?}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                finals = Some((lineno, states));
            } else {
                arcs.push((lineno, parse_arc(lineno, line)?));
            }
        }

        let (finals_line, finals) = finals.ok_or_else(|| parse_err(0, "missing final state line"))?;
        let limit = 2 * arcs.len() + 1;
        let check = |lineno: usize, s: StateId| {
            if (s as usize) < limit {
                Ok(())
            } else {
                Err(parse_err(
                    lineno,
                    format!("state {s} out of range for {} arcs", arcs.len()),
                ))
            }
        };
        let mut num_states = 1;
        for &f in &finals {
            check(finals_line, f)?;
            num_states = num_states.max(f as usize + 1);
        }
        for (lineno, arc) in &arcs {
            check(*lineno, arc.pred)?;
            check(*lineno, arc.succ)?;
            num_states = num_states.max(arc.pred.max(arc.succ) as usize + 1);
        }

        let mut g = WordGraph::new(weights);
        while g.num_states < num_states {
            g.add_state();
        }
        for (_, arc) in arcs {
            let id = g.add_arc(arc.pred, arc.succ, arc.span, arc.words, arc.components);
            g.scores[id] = arc.score;
        }
        for f in finals {
            g.mark_final(f);
        }
        Ok(g)
    }

    pub fn save(&self, path: &Path) -> Result<(), WordGraphError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        fs::write(path, buf)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, WordGraphError> {
        let file = fs::File::open(path)?;
        Self::read_from(io::BufReader::new(file))
    }
}

struct ParsedArc {
    pred: StateId,
    succ: StateId,
    score: f64,
    components: ScoreComponents,
    span: Span,
    words: Arc<[String]>,
}

fn parse_arc(lineno: usize, line: &str) -> Result<ParsedArc, WordGraphError> {
    let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
    if fields.len() != 4 {
        return Err(parse_err(lineno, "expected 4 `|||`-separated fields"));
    }
    let head: Vec<&str> = fields[0].split_whitespace().collect();
    let [pred, succ, score] = head[..] else {
        return Err(parse_err(lineno, "expected `pred succ score`"));
    };
    let pred: StateId = pred
        .parse()
        .map_err(|_| parse_err(lineno, format!("bad state {pred:?}")))?;
    let succ: StateId = succ
        .parse()
        .map_err(|_| parse_err(lineno, format!("bad state {succ:?}")))?;
    let score: f64 = score
        .parse()
        .map_err(|_| parse_err(lineno, format!("bad score {score:?}")))?;

    let values: Vec<f64> = fields[1]
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| parse_err(lineno, "bad component value"))?;
    let values: [f64; NUM_FEATURES] = values.try_into().map_err(|v: Vec<f64>| {
        parse_err(
            lineno,
            format!("expected {NUM_FEATURES} components, got {}", v.len()),
        )
    })?;

    let span: Vec<usize> = fields[2]
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| parse_err(lineno, "bad span"))?;
    let [start, end] = span[..] else {
        return Err(parse_err(lineno, "expected `start end` span"));
    };
    if start == 0 || end < start {
        return Err(parse_err(lineno, format!("invalid span [{start},{end}]")));
    }

    Ok(ParsedArc {
        pred,
        succ,
        score,
        components: ScoreComponents::from_values(values),
        span: Span::new(start, end),
        words: fields[3]
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into(),
    })
}
