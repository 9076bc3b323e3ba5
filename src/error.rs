//! Leaf error types for the subsystems that need to report structured failures.
//!
//! Everything above these (engine, UI loop) talks in `anyhow::Result` and
//! converts these at the boundary, matching the mixed thiserror/anyhow split
//! used throughout this crate.

use std::io;

/// Failures from PTY allocation, spawn, resize, and signal delivery.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("process spawn failed: {os_error}")]
    SpawnFailed { os_error: io::Error },

    #[error("invalid pty size: rows={rows} cols={cols}")]
    BadSize { rows: u16, cols: u16 },

    #[error("pty resize failed: {0}")]
    ResizeFailed(io::Error),

    #[error("pty io error: {0}")]
    Io(#[from] io::Error),
}

/// Failures loading and parsing the process declaration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("process {name:?} declares neither `shell` nor `cmd`")]
    MissingCommand { name: String },

    #[error("process {name:?} declares both `shell` and `cmd`")]
    AmbiguousCommand { name: String },

    #[error("`--names` references unknown process {name:?}")]
    UnknownName { name: String },
}
