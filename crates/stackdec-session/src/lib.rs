//! Shared-model decoding service with per-user interactive sessions.
//!
//! `DecoderService` owns the model set behind a readers-writer lock:
//! decoding requests read, training and reloading write. Each user gets a
//! `UserSession` holding its own settings copy and the state of an
//! interactive (prefix-driven) translation.

mod pool;
mod protocol;
mod service;
mod user;

#[cfg(test)]
mod tests;

use stackdec_core::models::ModelError;
use stackdec_core::search::DecodeError;

pub use pool::RequestPool;
pub use protocol::{Request, Response, TranslationReply};
pub use service::{DecoderService, ModelContext};
pub use user::UserSession;

pub type UserId = u64;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("shared state lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    #[error("user {0} has no interactive session, call start_cat first")]
    NoCatSession(UserId),

    #[error("request pool is shut down")]
    PoolClosed,
}
