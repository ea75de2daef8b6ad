pub mod models;
pub mod preproc;
pub mod scoring;
pub mod search;
pub mod settings;
pub mod word_graph;

pub use models::{LanguageModel, LmState, ModelError, ModelSet, PhraseTable, WordPenaltyModel};
pub use scoring::{Feature, ScoreComponents, Weights};
pub use search::{DecodeOutcome, DecodeStatus, StackDecoder, Translation};
pub use settings::DecoderSettings;
pub use word_graph::WordGraph;
