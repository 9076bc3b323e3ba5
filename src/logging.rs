//! Logging setup (ambient stack): a rotating debug log file under the
//! platform data directory, filtered by `RUST_LOG`/`DEVTERM_LOG`, plus the
//! panic-hook capture installed by [`crate::terminal_restore`]. Nothing is
//! ever written to stdout/stderr directly — those are the host terminal's,
//! and the whole point of the alternate-screen UI is not to fight it.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking file writer alive; dropping it flushes and stops
/// logging, so callers must hold this for the process lifetime.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

fn log_dir() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("devterm")
        .join("logs")
}

/// Initializes a file-backed `tracing` subscriber. Safe to call once; a
/// second call is a logic error in the caller, not guarded against here
/// since only `main` ever calls it.
pub fn init_logging() -> anyhow::Result<LoggingGuard> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::daily(&dir, "devterm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("DEVTERM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("devterm=info"));

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(LoggingGuard { _file_guard: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dir_is_rooted_under_a_devterm_logs_directory() {
        let dir = log_dir();
        assert!(dir.ends_with("devterm/logs") || dir.ends_with("devterm\\logs"));
    }
}
