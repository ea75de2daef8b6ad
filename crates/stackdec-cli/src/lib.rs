//! Command implementations behind the `stackdec` binary.

pub mod commands;

use std::path::Path;

use stackdec::models::ModelError;
use stackdec::search::DecodeError;
use stackdec::word_graph::WordGraphError;
use stackdec::{EngineError, ServiceError};

/// Every sentence was decoded within its limits.
pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
/// At least one sentence stopped at the iteration or time limit.
pub const EXIT_LIMIT_EXCEEDED: i32 = 2;
/// Reserved for an external parameter optimizer asking for another run.
pub const EXIT_NEED_EVALUATION: i32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    WordGraph(#[from] WordGraphError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Log to stderr, filtered by `RUST_LOG` (default `stackdec=info`).
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stackdec=info"));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// JSON trace file under `trace_dir` when given and available, stderr
/// logging otherwise.
pub fn init_logging_with(trace_dir: Option<&Path>) {
    let Some(dir) = trace_dir else {
        init_logging();
        return;
    };
    match stackdec::trace_init::init_tracing(dir) {
        Ok(true) => {}
        Ok(false) => {
            init_logging();
            tracing::warn!(dir = %dir.display(), "trace output needs the `trace` feature");
        }
        Err(e) => {
            init_logging();
            tracing::warn!(dir = %dir.display(), error = %e, "cannot open trace directory");
        }
    }
}
