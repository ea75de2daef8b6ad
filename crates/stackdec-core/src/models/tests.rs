use std::io::Cursor;
use std::path::Path;

use super::*;

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn sample_table() -> MemoryPhraseTable {
    let text = "\
# comment
la casa ||| the house ||| 3
casa ||| house ||| 4
casa ||| home
la ||| the ||| 5
";
    MemoryPhraseTable::from_text(Cursor::new(text)).unwrap()
}

#[test]
fn test_phrase_table_scores() {
    let table = sample_table();
    let opts = table.options_for_span(&words("casa"));
    assert_eq!(opts.len(), 2);
    assert_eq!(opts[0].target, words("house"));
    assert!((opts[0].scores.direct - (4.0f64 / 5.0).ln()).abs() < 1e-12);
    assert!((opts[0].scores.inverse - 0.0).abs() < 1e-12);
    assert_eq!(opts[1].count, 1.0);
}

#[test]
fn test_phrase_table_pair_matches_options() {
    let table = sample_table();
    for entry in table.options_for_span(&words("la casa")) {
        assert_eq!(
            table.score_for_pair(&words("la casa"), &entry.target),
            entry.scores
        );
    }
}

#[test]
fn test_phrase_table_unknown_pair_is_finite() {
    let table = sample_table();
    assert!(table.options_for_span(&words("perro")).is_empty());
    let s = table.score_for_pair(&words("perro"), &words("dog"));
    assert!(s.direct.is_finite() && s.direct < -10.0);
    assert_eq!(s.direct, s.inverse);
}

#[test]
fn test_phrase_table_parse_error_line() {
    let err = MemoryPhraseTable::from_text(Cursor::new("a ||| b\nbroken line\n")).unwrap_err();
    assert!(matches!(err, ModelError::Parse { line: 2, .. }));
    let err = MemoryPhraseTable::from_text(Cursor::new("a ||| b ||| -1\n")).unwrap_err();
    assert!(matches!(err, ModelError::Parse { line: 1, .. }));
}

#[test]
fn test_phrase_table_train_pair() {
    let mut table = sample_table();
    table.train_pair(&words("perro"), &words("dog")).unwrap();
    let opts = table.options_for_span(&words("perro"));
    assert_eq!(opts.len(), 1);
    assert_eq!(opts[0].scores.direct, 0.0);
}

#[test]
fn test_phrase_table_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.sdpt");
    let table = sample_table();
    table.save(&path).unwrap();

    let loaded = MemoryPhraseTable::open(&path).unwrap();
    assert_eq!(loaded.num_pairs(), table.num_pairs());
    assert_eq!(
        loaded.score_for_pair(&words("la casa"), &words("the house")),
        table.score_for_pair(&words("la casa"), &words("the house"))
    );
}

#[test]
fn test_phrase_table_bad_magic() {
    let err = MemoryPhraseTable::from_bytes(b"SDLM\x01rest").unwrap_err();
    assert!(matches!(err, ModelError::InvalidMagic { .. }));
    let err = MemoryPhraseTable::from_bytes(b"SDP").unwrap_err();
    assert!(matches!(err, ModelError::InvalidHeader));
    let err = MemoryPhraseTable::from_bytes(b"SDPT\x09").unwrap_err();
    assert!(matches!(err, ModelError::UnsupportedVersion(9)));
}

fn sample_lm() -> NgramLanguageModel {
    let corpus = "the house is red\nthe house is big\nthe dog is red\n";
    NgramLanguageModel::from_corpus(Cursor::new(corpus), 3, 0.7).unwrap()
}

#[test]
fn test_lm_prefers_seen_continuation() {
    let lm = sample_lm();
    let s0 = lm.initial_state();
    let (lp_the, s1) = lm.score_and_advance(&s0, "the");
    let (lp_dog_first, _) = lm.score_and_advance(&s0, "dog");
    assert!(lp_the > lp_dog_first);
    let (lp_house, _) = lm.score_and_advance(&s1, "house");
    let (lp_red, _) = lm.score_and_advance(&s1, "red");
    assert!(lp_house > lp_red);
}

#[test]
fn test_lm_unknown_word_finite() {
    let lm = sample_lm();
    let (lp, state) = lm.score_and_advance(&lm.initial_state(), "zebra");
    assert!(lp.is_finite());
    assert!(lp < 0.0);
    assert_eq!(state.history().last(), Some(&ngram::UNK_ID));
}

#[test]
fn test_lm_state_is_bounded() {
    let lm = sample_lm();
    let mut state = lm.initial_state();
    for w in ["the", "house", "is", "red"] {
        state = lm.score_and_advance(&state, w).1;
    }
    assert_eq!(state.history().len(), 2);
    assert!(lm.end_score(&state) > lm.end_score(&lm.initial_state()));
}

#[test]
fn test_lm_distribution_sums_to_one() {
    let lm = sample_lm();
    let state = lm.score_and_advance(&lm.initial_state(), "the").1;
    let total: f64 = (0..lm.vocab_size() as u32)
        .map(|id| lm.prob(state.history(), id))
        .sum();
    assert!((total - 1.0).abs() < 1e-9, "total = {total}");
}

#[test]
fn test_lm_train_changes_scores() {
    let mut lm = sample_lm();
    let before = lm.score_and_advance(&lm.initial_state(), "zebra").0;
    lm.train_sentence(&words("zebra crossing")).unwrap();
    let after = lm.score_and_advance(&lm.initial_state(), "zebra").0;
    assert!(after > before);
}

#[test]
fn test_lm_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.sdlm");
    let lm = sample_lm();
    lm.save(&path).unwrap();
    let loaded = NgramLanguageModel::open(&path, 5, 0.1).unwrap();
    assert_eq!(loaded.order(), 3);
    let s = lm.score_and_advance(&lm.initial_state(), "the").1;
    let t = loaded.score_and_advance(&loaded.initial_state(), "the").1;
    assert_eq!(s, t);
    assert!((lm.score_and_advance(&s, "house").0 - loaded.score_and_advance(&t, "house").0).abs() < 1e-12);
}

#[test]
fn test_word_penalty_geometric() {
    let wp = GeometricWordPenalty::new(0.3);
    assert!((wp.score_for_length(0) - 0.3f64.ln()).abs() < 1e-12);
    let d = wp.score_for_length(3) - wp.score_for_length(2);
    assert!((d - 0.7f64.ln()).abs() < 1e-12);
}

#[test]
fn test_registry_unknown_kind() {
    let registry = ModelRegistry::default();
    let err = registry
        .load_phrase_table("sqlite", std::path::Path::new("/nonexistent"))
        .err()
        .unwrap();
    assert!(matches!(err, ModelError::UnknownKind(ref k) if k == "sqlite"));
}

#[test]
fn test_registry_load_all() {
    let dir = tempfile::tempdir().unwrap();
    let pt = dir.path().join("pt.txt");
    let lm = dir.path().join("corpus.txt");
    std::fs::write(&pt, "casa ||| house\n").unwrap();
    std::fs::write(&lm, "the house\n").unwrap();
    let settings = crate::settings::DecoderSettings::default();
    let paths = registry::ModelPaths {
        phrase_table_kind: "memory".into(),
        phrase_table: pt,
        lm_kind: "ngram".into(),
        lm,
    };
    let models = ModelRegistry::default()
        .load(&paths, &settings.lm, &settings.word_penalty)
        .unwrap();
    assert_eq!(models.phrase_table.options_for_span(&words("casa")).len(), 1);
    assert_eq!(models.lm.order(), settings.lm.order);
}

#[test]
fn test_model_set_train_pair() {
    let mut models = ModelSet::new(
        Box::new(sample_table()),
        Box::new(sample_lm()),
        Box::new(GeometricWordPenalty::new(0.3)),
    );
    models
        .train_pair(&words("el perro"), &words("the dog"), 10)
        .unwrap();
    assert_eq!(
        models.phrase_table.options_for_span(&words("el perro"))[0].target,
        words("the dog")
    );
    models
        .train_pair(&words("a b c"), &words("x y z"), 2)
        .unwrap();
    assert!(models.phrase_table.options_for_span(&words("a b c")).is_empty());
}

/// Read-only table that keeps the default `train_pair`.
struct FrozenTable(MemoryPhraseTable);

impl PhraseTable for FrozenTable {
    fn kind(&self) -> &'static str {
        "frozen"
    }

    fn options_for_span(&self, source: &[String]) -> Vec<PhraseEntry> {
        self.0.options_for_span(source)
    }

    fn score_for_pair(&self, source: &[String], target: &[String]) -> PhraseScores {
        self.0.score_for_pair(source, target)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        self.0.save(path)
    }
}

#[test]
fn test_failed_training_leaves_models_unchanged() {
    let mut models = ModelSet::new(
        Box::new(FrozenTable(sample_table())),
        Box::new(sample_lm()),
        Box::new(GeometricWordPenalty::new(0.3)),
    );
    let state = models.lm.context_free_state();
    let (before, _) = models.lm.score_and_advance(&state, "zz");

    let err = models.train_pair(&words("x"), &words("zz"), 10).unwrap_err();
    assert!(matches!(err, ModelError::NotTrainable("frozen")));

    let (after, _) = models.lm.score_and_advance(&state, "zz");
    assert_eq!(before, after);

    // A pair too long for the table only touches the language model.
    models
        .train_pair(&words("a b c"), &words("zz"), 2)
        .unwrap();
    let (trained, _) = models.lm.score_and_advance(&state, "zz");
    assert!(trained > before);
}
