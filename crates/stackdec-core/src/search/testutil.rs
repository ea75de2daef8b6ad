//! Small in-memory models shared by the search and word-graph tests.

use std::io::Cursor;

use crate::models::ngram::NgramLanguageModel;
use crate::models::phrase_table::MemoryPhraseTable;
use crate::models::word_penalty::GeometricWordPenalty;
use crate::models::ModelSet;
use crate::settings::DecoderSettings;

pub(crate) fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// Model set from a `src ||| trg [||| count]` table and a one-sentence-per-
/// line LM corpus.
pub(crate) fn models_from(table: &str, corpus: &str) -> ModelSet {
    let table = MemoryPhraseTable::from_text(Cursor::new(table)).unwrap();
    let lm = NgramLanguageModel::from_corpus(Cursor::new(corpus), 3, 0.7).unwrap();
    ModelSet::new(
        Box::new(table),
        Box::new(lm),
        Box::new(GeometricWordPenalty::new(0.3)),
    )
}

/// Single-word entries with equal counts, so no option is preferred by the
/// phrase table.
pub(crate) fn uniform_models() -> ModelSet {
    models_from(
        "a ||| A\nb ||| B\nc ||| C\n",
        "A B C\nC B A\n",
    )
}

/// Toy Spanish-English models with one multi-word phrase.
pub(crate) fn toy_models() -> ModelSet {
    models_from(
        "\
la ||| the ||| 8
casa ||| house ||| 6
casa ||| home ||| 2
verde ||| green ||| 5
casa verde ||| green house ||| 4
es ||| is ||| 7
grande ||| big ||| 5
grande ||| large ||| 3
",
        "the green house is big\nthe house is big\nthe house is green\nthe big house\n",
    )
}

pub(crate) fn settings() -> DecoderSettings {
    DecoderSettings::default()
}
