
use std::io::Cursor;

use stackdec_core::models::ngram::NgramLanguageModel;
use stackdec_core::models::phrase_table::MemoryPhraseTable;
use stackdec_core::models::word_penalty::GeometricWordPenalty;
use stackdec_core::models::ModelSet;
use stackdec_core::settings::DecoderSettings;

use super::DecoderService;

pub(super) const TABLE: &str = "\
la ||| the ||| 8
casa ||| house ||| 6
casa ||| home ||| 2
verde ||| green ||| 5
casa verde ||| green house ||| 4
es ||| is ||| 7
grande ||| big ||| 5
grande ||| large ||| 3
tiene ||| has ||| 4
pisos ||| floors ||| 4
";

pub(super) const CORPUS: &str = "\
the green house is big
the house is big
the house is green
the big house
the house has <number> floors
";

pub(super) fn test_models() -> ModelSet {
    ModelSet::new(
        Box::new(MemoryPhraseTable::from_text(Cursor::new(TABLE)).unwrap()),
        Box::new(NgramLanguageModel::from_corpus(Cursor::new(CORPUS), 3, 0.7).unwrap()),
        Box::new(GeometricWordPenalty::new(0.3)),
    )
}

pub(super) fn test_service() -> DecoderService {
    DecoderService::new(test_models(), DecoderSettings::default())
}
