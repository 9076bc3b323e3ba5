//! Placeholder Windows backend. A ConPTY-based implementation would mirror
//! `unix::PtyHandle` (pseudo-console handle, two anonymous pipes, extended
//! startup info, `CreateProcess`), per §4.1's windows algorithm; not built
//! out here since this crate's test and deployment surface is unix-only.

use super::{KillMode, SpawnSpec};
use crate::error::PtyError;
use std::io;
use std::process::ExitStatus;

pub struct PtyHandle;

impl PtyHandle {
    pub fn spawn(_spec: SpawnSpec<'_>) -> Result<Self, PtyError> {
        Err(PtyError::SpawnFailed {
            os_error: io::Error::new(io::ErrorKind::Unsupported, "pty backend not implemented for this OS"),
        })
    }

    pub fn resize(&self, _rows: u16, _cols: u16) -> Result<(), PtyError> {
        Ok(())
    }

    pub async fn read_chunk(&self) -> Option<Vec<u8>> {
        None
    }

    pub fn write(&self, _bytes: &[u8]) -> Result<usize, PtyError> {
        Ok(0)
    }

    pub async fn wait(&self) -> ExitStatus {
        #[cfg(windows)]
        {
            std::os::windows::process::ExitStatusExt::from_raw(0)
        }
        #[cfg(not(windows))]
        unreachable!("windows_stub only compiled on non-unix targets")
    }

    pub fn is_alive(&self) -> bool {
        false
    }

    pub fn kill_immediate(&self) {}

    /// Soft == Hard on Windows per §9 open question (c).
    pub async fn kill(&self, _mode: KillMode) {}

    pub fn close(&mut self) {}
}
