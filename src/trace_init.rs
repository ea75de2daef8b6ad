//! JSON trace output for long-running processes (`trace` feature).
//!
//! Events land in `<dir>/stackdec-trace.jsonl`, one JSON object per line,
//! with close events carrying the timing of every decode span.

use std::io;
use std::path::Path;

pub const TRACE_FILE: &str = "stackdec-trace.jsonl";

/// Install the JSON file subscriber. `Ok(false)` means nothing was
/// installed: the crate was built without `trace`, or a global subscriber
/// already exists.
#[cfg(feature = "trace")]
pub fn init_tracing(log_dir: &Path) -> io::Result<bool> {
    use std::sync::OnceLock;

    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    // Flushes pending events when the process exits.
    static GUARD: OnceLock<WorkerGuard> = OnceLock::new();
    if GUARD.get().is_some() {
        return Ok(false);
    }

    std::fs::create_dir_all(log_dir)?;
    let appender = tracing_appender::rolling::never(log_dir, TRACE_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stackdec=debug"));
    let installed = tracing_subscriber::fmt()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        let _ = GUARD.set(guard);
    }
    Ok(installed)
}

#[cfg(not(feature = "trace"))]
pub fn init_tracing(_log_dir: &Path) -> io::Result<bool> {
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "trace"))]
    #[test]
    fn test_disabled_without_feature() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!init_tracing(dir.path()).unwrap());
        assert!(!dir.path().join(TRACE_FILE).exists());
    }

    #[cfg(feature = "trace")]
    #[test]
    fn test_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        assert!(init_tracing(&logs).unwrap());
        assert!(logs.join(TRACE_FILE).exists());
        tracing::debug!(target: "stackdec", "trace check");
        assert!(!init_tracing(&logs).unwrap());
    }
}
