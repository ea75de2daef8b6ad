//! Phrase-based statistical machine translation decoder.
//!
//! The decoding engine lives in [`stackdec_core`], the shared-model service
//! with interactive sessions in [`stackdec_session`]. This crate ties them
//! together: [`EngineConfig`] names the models and settings on disk and
//! builds a ready [`DecoderService`].

pub mod config;
pub mod trace_init;

pub use config::{EngineConfig, EngineError};
pub use stackdec_core::models::registry::ModelPaths;
pub use stackdec_core::{
    models, preproc, scoring, search, settings, word_graph, DecodeOutcome, DecodeStatus,
    DecoderSettings, ModelSet, StackDecoder, Translation, WordGraph, Weights,
};
pub use stackdec_session::{
    DecoderService, ModelContext, Request, RequestPool, Response, ServiceError, TranslationReply,
    UserId,
};

pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
