use std::collections::BTreeSet;
use std::io::Cursor;

use super::correction::word_distance;
use super::*;
use crate::scoring::Feature;
use crate::settings::CorrectionSettings;
use crate::search::PrefixRequest;

fn lm(v: f64) -> ScoreComponents {
    let mut c = ScoreComponents::default();
    c.set(Feature::LanguageModel, v);
    c
}

fn phrase(s: &str) -> Arc<[String]> {
    s.split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into()
}

/// 0 -the/a-> 1 -house/home-> 2, plus a direct 0 -the house-> 2 arc.
fn sample_graph() -> WordGraph {
    let mut g = WordGraph::new(Weights::default());
    let s1 = g.add_state();
    let s2 = g.add_state();
    g.add_arc(0, s1, Span::new(1, 1), phrase("the"), lm(-1.0));
    g.add_arc(0, s1, Span::new(1, 1), phrase("a"), lm(-2.0));
    g.add_arc(s1, s2, Span::new(2, 2), phrase("house"), lm(-1.0));
    g.add_arc(s1, s2, Span::new(2, 2), phrase("home"), lm(-1.5));
    g.add_arc(0, s2, Span::new(1, 2), phrase("the house"), lm(-2.7));
    g.mark_final(s2);
    g
}

fn text(g: &WordGraph, p: &WgPath) -> String {
    g.path_words(p).join(" ")
}

#[test]
fn test_best_path() {
    let g = sample_graph();
    let p = g.best_path(&BTreeSet::new()).unwrap();
    assert_eq!(p.arcs, vec![0, 2]);
    assert_eq!(text(&g, &p), "the house");
    assert!((p.score + 2.0).abs() < 1e-12);
    assert_eq!(g.path_spans(&p), vec![Span::new(1, 1), Span::new(2, 2)]);
    assert!((g.path_components(&p).get(Feature::LanguageModel) + 2.0).abs() < 1e-12);
}

#[test]
fn test_best_path_with_exclusions() {
    let g = sample_graph();
    let p = g.best_path(&BTreeSet::from([0])).unwrap();
    assert_eq!(p.arcs, vec![4]);
    assert!((p.score + 2.7).abs() < 1e-12);

    assert!(g.best_path(&BTreeSet::from([0, 1, 4])).is_none());
}

#[test]
fn test_best_path_without_finals() {
    let mut g = WordGraph::new(Weights::default());
    let s1 = g.add_state();
    g.add_arc(0, s1, Span::new(1, 1), phrase("x"), lm(-1.0));
    assert!(g.best_path(&BTreeSet::new()).is_none());
    assert!(g.nbest(3).is_empty());
}

#[test]
fn test_topological_order() {
    let g = sample_graph();
    assert_eq!(g.topological_order(), vec![0, 1, 2]);
}

#[test]
fn test_set_weights_rescales_without_lookups() {
    let mut g = sample_graph();
    let mut w = Weights::default();
    w.lm = 2.0;
    g.set_weights(w.clone());
    assert_eq!(g.weights(), &w);
    assert!((g.arc_score(4) + 5.4).abs() < 1e-12);
    let p = g.best_path(&BTreeSet::new()).unwrap();
    assert!((p.score + 4.0).abs() < 1e-12);
}

#[test]
fn test_nbest_distinct_strings() {
    let g = sample_graph();
    let paths = g.nbest(3);
    let texts: Vec<String> = paths.iter().map(|p| text(&g, p)).collect();
    assert_eq!(texts, vec!["the house", "the home", "a house"]);
    let scores: Vec<f64> = paths.iter().map(|p| p.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let all = g.nbest(10);
    assert_eq!(all.len(), 4);
    assert!(g.nbest(0).is_empty());
}

#[test]
fn test_prune_keep_best_only() {
    let mut g = sample_graph();
    assert_eq!(g.prune_by_density(Some(0.0)), 3);
    assert_eq!(g.num_live_arcs(), 2);
    assert!(g.is_pruned(1) && g.is_pruned(3) && g.is_pruned(4));
    assert_eq!(g.nbest(5).len(), 1);
}

#[test]
fn test_prune_by_threshold() {
    let mut g = sample_graph();
    assert_eq!(g.prune_by_density(Some(0.6)), 2);
    assert!(g.is_pruned(1));
    assert!(!g.is_pruned(3));
    assert!(g.is_pruned(4));
    assert_eq!(g.prune_by_density(None), 0);
    assert_eq!(g.num_arcs(), 5);
}

#[test]
fn test_complete_prefix_partial_word() {
    let g = sample_graph();
    let p = g
        .complete_prefix(&PrefixRequest::new(vec!["the".into(), "ho".into()], true))
        .unwrap();
    assert_eq!(text(&g, &p), "the house");

    let p = g
        .complete_prefix(
            &PrefixRequest::new(vec!["the".into(), "ho".into()], true).with_rejected(["house"]),
        )
        .unwrap();
    assert_eq!(text(&g, &p), "the home");
    assert!((p.score + 2.5).abs() < 1e-12);
}

#[test]
fn test_complete_prefix_full_words() {
    let g = sample_graph();
    let p = g
        .complete_prefix(&PrefixRequest::new(vec!["a".into()], false))
        .unwrap();
    assert_eq!(text(&g, &p), "a house");

    let p = g
        .complete_prefix(&PrefixRequest::new(vec!["the".into()], false).with_rejected(["house"]))
        .unwrap();
    assert_eq!(text(&g, &p), "the home");

    assert!(g
        .complete_prefix(&PrefixRequest::new(vec!["x".into()], false))
        .is_none());
    assert!(g
        .complete_prefix(&PrefixRequest::new(
            vec!["the".into(), "house".into(), "is".into()],
            false
        ))
        .is_none());
}

fn correction_costs() -> CorrectionSettings {
    CorrectionSettings::default()
}

fn prefix(words: &str, partial: bool) -> PrefixRequest {
    PrefixRequest::new(words.split_whitespace().map(str::to_string).collect(), partial)
}

/// 0 -the-> 1 -big/large-> 2 -house-> 3.
fn adjective_graph() -> WordGraph {
    let mut g = WordGraph::new(Weights::default());
    let s1 = g.add_state();
    let s2 = g.add_state();
    let s3 = g.add_state();
    g.add_arc(0, s1, Span::new(1, 1), phrase("the"), lm(-1.0));
    g.add_arc(s1, s2, Span::new(2, 2), phrase("big"), lm(-1.0));
    g.add_arc(s1, s2, Span::new(2, 2), phrase("large"), lm(-1.5));
    g.add_arc(s2, s3, Span::new(3, 3), phrase("house"), lm(-1.0));
    g.mark_final(s3);
    g
}

#[test]
fn test_correct_prefix_with_typo() {
    let g = sample_graph();
    let request = prefix("teh", false);
    assert!(g.complete_prefix(&request).is_none());

    let c = g.correct_prefix(&request, &correction_costs()).unwrap();
    assert_eq!(c.words.join(" "), "teh house");
    assert_eq!(c.path.arcs, vec![0, 2]);
    assert!((c.path.score + 2.0).abs() < 1e-12);
    assert!((c.edit_cost - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_correct_prefix_respects_rejected_slot() {
    let g = sample_graph();
    let request = prefix("teh", false).with_rejected(["house"]);
    let c = g.correct_prefix(&request, &correction_costs()).unwrap();
    assert_eq!(c.words.join(" "), "teh home");
    assert_eq!(c.path.arcs, vec![0, 3]);
}

#[test]
fn test_correct_prefix_completes_partial_word() {
    let g = adjective_graph();
    let c = g
        .correct_prefix(&prefix("a lar", true), &correction_costs())
        .unwrap();
    assert_eq!(c.words.join(" "), "a large house");
    assert!((c.edit_cost - 1.0).abs() < 1e-12);
}

#[test]
fn test_correct_prefix_agrees_with_exact_match() {
    let g = sample_graph();
    let request = prefix("the ho", true);
    let exact = g.complete_prefix(&request).unwrap();
    let c = g.correct_prefix(&request, &correction_costs()).unwrap();
    assert_eq!(c.path, exact);
    assert_eq!(c.words.join(" "), "the house");
    assert_eq!(c.edit_cost, 0.0);
}

#[test]
fn test_correct_prefix_extra_prefix_words() {
    let g = sample_graph();
    // Nothing in the graph follows "house", so "now" is inserted.
    let c = g
        .correct_prefix(&prefix("the house now", false), &correction_costs())
        .unwrap();
    assert_eq!(c.words.join(" "), "the house now");
    assert!((c.edit_cost - 2.0).abs() < 1e-12);
}

#[test]
fn test_correct_prefix_without_finals() {
    let mut g = WordGraph::new(Weights::default());
    let s1 = g.add_state();
    g.add_arc(0, s1, Span::new(1, 1), phrase("the"), lm(-1.0));
    assert!(g.correct_prefix(&prefix("the", false), &correction_costs()).is_none());
}

#[test]
fn test_word_distance() {
    assert_eq!(word_distance("house", "house", false), 0.0);
    assert_eq!(word_distance("house", "hou", true), 0.0);
    assert!((word_distance("the", "teh", false) - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(word_distance("big", "lar", true), 1.0);
    assert_eq!(word_distance("a", "", true), 0.0);
    assert!((word_distance("house", "hosu", true) - 0.5).abs() < 1e-12);
}

#[test]
fn test_text_roundtrip() {
    let mut g = sample_graph();
    g.prune_by_density(Some(0.6));
    let mut buf = Vec::new();
    g.write_to(&mut buf).unwrap();

    let loaded = WordGraph::read_from(Cursor::new(buf)).unwrap();
    assert_eq!(loaded.num_states(), 3);
    assert_eq!(loaded.num_arcs(), 3);
    assert_eq!(loaded.finals(), g.finals());
    assert_eq!(loaded.weights(), g.weights());
    let a = g.best_path(&BTreeSet::new()).unwrap();
    let b = loaded.best_path(&BTreeSet::new()).unwrap();
    assert_eq!(text(&g, &a), text(&loaded, &b));
    assert!((a.score - b.score).abs() < 1e-12);
}

#[test]
fn test_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sentence.wg");
    let g = sample_graph();
    g.save(&path).unwrap();
    let loaded = WordGraph::load(&path).unwrap();
    assert_eq!(loaded.arcs(), g.arcs());
}

#[test]
fn test_read_without_finals() {
    let text = "# lm 1\n\n0 1 -1 ||| 0 0 -1 0 0 0 0 0 ||| 1 1 ||| x\n";
    let g = WordGraph::read_from(Cursor::new(text)).unwrap();
    assert!(g.finals().is_empty());
    assert_eq!(g.num_arcs(), 1);
    assert_eq!(g.weights().lm, 1.0);
}

#[test]
fn test_read_errors() {
    let bad_state = "0\n0 x -1 ||| 0 0 0 0 0 0 0 0 ||| 1 1 ||| a\n";
    assert!(matches!(
        WordGraph::read_from(Cursor::new(bad_state)),
        Err(WordGraphError::Parse { line: 2, .. })
    ));
    let short = "1\n0 1 -1 ||| 0 0 ||| 1 1 ||| a\n";
    assert!(matches!(
        WordGraph::read_from(Cursor::new(short)),
        Err(WordGraphError::Parse { line: 2, .. })
    ));
    let bad_header = "# nonsense 1\n1\n";
    assert!(matches!(
        WordGraph::read_from(Cursor::new(bad_header)),
        Err(WordGraphError::Parse { line: 1, .. })
    ));
    assert!(matches!(
        WordGraph::read_from(Cursor::new("")),
        Err(WordGraphError::Parse { line: 0, .. })
    ));
}

#[test]
fn test_read_rejects_out_of_range_states() {
    let huge = "1\n0 4294967295 -1 ||| 0 0 0 0 0 0 0 0 ||| 1 1 ||| a\n";
    assert!(matches!(
        WordGraph::read_from(Cursor::new(huge)),
        Err(WordGraphError::Parse { line: 2, .. })
    ));
    let huge_final = "4000000000\n0 1 -1 ||| 0 0 0 0 0 0 0 0 ||| 1 1 ||| a\n";
    assert!(matches!(
        WordGraph::read_from(Cursor::new(huge_final)),
        Err(WordGraphError::Parse { line: 1, .. })
    ));
    let sparse = "3\n0 1 -1 ||| 0 0 0 0 0 0 0 0 ||| 1 1 ||| a\n\
                  1 3 -1 ||| 0 0 0 0 0 0 0 0 ||| 2 2 ||| b\n";
    let g = WordGraph::read_from(Cursor::new(sparse)).unwrap();
    assert_eq!(g.num_states(), 4);
    assert_eq!(g.num_arcs(), 2);
}
