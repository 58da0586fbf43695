use std::fmt;

use serde::{Deserialize, Serialize};

/// Completion counters for one load session.
///
/// `completed` counts files delivered to the consumer; `failed` counts files
/// whose fetch failed permanently. A session is ready only when
/// `completed == total`, so any failure keeps it from ever getting there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub state: SessionState,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            failed: 0,
            total,
            state: SessionState::FilesInFlight,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Files that have neither been delivered nor failed yet.
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.completed + self.failed)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)?;
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// The lifecycle of a load session.
///
/// The happy path is `Idle -> ManifestPending -> DirectoriesDeclared ->
/// FilesInFlight -> Ready`. `Failed` ends a session that never got a manifest
/// or a store; `Stalled` ends one where at least one file could not be fetched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    ManifestPending,
    DirectoriesDeclared,
    FilesInFlight,
    Ready,
    Stalled,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ManifestPending => "manifest_pending",
            Self::DirectoriesDeclared => "directories_declared",
            Self::FilesInFlight => "files_in_flight",
            Self::Ready => "ready",
            Self::Stalled => "stalled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Stalled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
