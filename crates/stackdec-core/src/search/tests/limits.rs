use std::collections::BTreeSet;

use crate::search::testutil::{settings, toy_models};
use crate::search::{DecodeStatus, StackDecoder};

#[test]
fn test_zero_time_limit() {
    let models = toy_models();
    let mut s = settings();
    s.search.time_limit_ms = Some(0);
    let out = StackDecoder::new(&models, &s)
        .translate("la casa verde es grande")
        .unwrap();
    assert_eq!(out.status, DecodeStatus::TimeLimitExceeded);
    assert!(out.status.is_limit());
    assert!(!out.translation.complete);
    assert!(out.translation.words.is_empty());
    assert_eq!(out.stats.expansions, 0);
}

#[test]
fn test_evaluation_limit_returns_partial() {
    let models = toy_models();
    let mut s = settings();
    s.search.max_iterations = 2;
    s.search.breadth_first = true;
    let out = StackDecoder::new(&models, &s)
        .translate("la casa verde es grande")
        .unwrap();
    assert_eq!(out.status, DecodeStatus::EvaluationLimitExceeded);
    assert_eq!(out.stats.iterations, 2);
    assert!(!out.translation.complete);
    assert!(!out.translation.words.is_empty());
}

#[test]
fn test_generous_limits_complete() {
    let models = toy_models();
    let mut s = settings();
    s.search.time_limit_ms = Some(60_000);
    let out = StackDecoder::new(&models, &s)
        .translate("la casa verde es grande")
        .unwrap();
    assert_eq!(out.status, DecodeStatus::Completed);
}

#[test]
fn test_time_limit_keeps_graph() {
    let models = toy_models();
    let mut s = settings();
    s.search.time_limit_ms = Some(0);
    s.word_graph.enabled = true;
    let out = StackDecoder::new(&models, &s).translate("la casa").unwrap();
    let graph = out.word_graph.unwrap();
    assert_eq!(graph.num_states(), 1);
    assert!(graph.finals().is_empty());
}

#[test]
fn test_arena_sweep_preserves_result() {
    let models = toy_models();
    let source = "la casa verde es grande la casa es verde";
    let mut s = settings();
    s.search.stack_size = 1;
    s.search.breadth_first = true;
    s.word_graph.enabled = true;
    s.search.arena_sweep = usize::MAX;
    let kept = StackDecoder::new(&models, &s).translate(source).unwrap();
    s.search.arena_sweep = 1;
    let swept = StackDecoder::new(&models, &s).translate(source).unwrap();

    assert_eq!(kept.stats.reclaimed, 0);
    assert!(swept.stats.reclaimed > 0);
    assert_eq!(swept.status, kept.status);
    assert_eq!(swept.translation, kept.translation);
    assert_eq!(swept.stats.expansions, kept.stats.expansions);
    let (a, b) = (swept.word_graph.unwrap(), kept.word_graph.unwrap());
    assert_eq!(a.num_states(), b.num_states());
    assert_eq!(a.best_path(&BTreeSet::new()), b.best_path(&BTreeSet::new()));
}
