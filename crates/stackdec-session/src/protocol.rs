//! Request and response messages, one JSON object per line on the wire.
//!
//! ```text
//! {"op":"translate","user":1,"source":"la casa verde"}
//! {"kind":"translation","text":"the green house","status":"completed",...}
//! ```

use serde::{Deserialize, Serialize};
use stackdec_core::models::registry::ModelPaths;
use stackdec_core::search::{AlignedPhrase, DecodeOutcome, DecodeStatus, SearchStats};

use crate::UserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Translate {
        user: UserId,
        source: String,
    },
    TranslateWithRef {
        user: UserId,
        source: String,
        reference: String,
    },
    VerifyCoverage {
        user: UserId,
        source: String,
        reference: String,
    },
    StartCat {
        user: UserId,
        source: String,
    },
    AddToPrefix {
        user: UserId,
        text: String,
        #[serde(default)]
        rejected: Vec<String>,
    },
    SetPrefix {
        user: UserId,
        prefix: String,
        #[serde(default)]
        rejected: Vec<String>,
    },
    ResetPrefix {
        user: UserId,
    },
    TrainPair {
        source: String,
        reference: String,
    },
    Reload {
        paths: ModelPaths,
    },
    PrintWeights,
    SetWeights {
        weights: String,
    },
    ReleaseUser {
        user: UserId,
    },
}

impl Request {
    /// Whether the request changes the shared models or weights.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::TrainPair { .. } | Request::Reload { .. } | Request::SetWeights { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslationReply {
    pub text: String,
    pub status: DecodeStatus,
    pub score: f64,
    pub complete: bool,
    pub alignment: Vec<AlignedPhrase>,
    pub stats: SearchStats,
}

impl TranslationReply {
    pub(crate) fn from_outcome(outcome: &DecodeOutcome, text: String) -> Self {
        Self {
            text,
            status: outcome.status,
            score: outcome.translation.score,
            complete: outcome.translation.complete,
            alignment: outcome.translation.alignment.clone(),
            stats: outcome.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    Translation(TranslationReply),
    /// Interactive completion: the raw prefix followed by the suggestion.
    Completion { text: String },
    Coverage { covered: bool, status: DecodeStatus },
    Weights { header: String },
    Ok,
    Error { message: String },
}

impl Response {
    pub fn error(e: impl std::fmt::Display) -> Self {
        Response::Error {
            message: e.to_string(),
        }
    }
}
