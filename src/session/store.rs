//! JSON persistence for session state.
//!
//! One session per state file. A missing file yields a fresh session, so the
//! first turn after `reset` (or ever) starts from `NotStarted`.

use super::SessionState;
use crate::errors::OrchestratorError;
use anyhow::Context;
use std::path::PathBuf;

pub struct StateStore {
    state_file: PathBuf,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.state_file
    }

    /// Load the persisted session, or a fresh one if none exists yet.
    pub fn load(&self) -> Result<SessionState, OrchestratorError> {
        if !self.state_file.exists() {
            return Ok(SessionState::new());
        }

        let read = || -> anyhow::Result<SessionState> {
            let content = std::fs::read_to_string(&self.state_file)
                .context("Failed to read session state file")?;
            serde_json::from_str(&content).context("Failed to parse session state JSON")
        };

        read().map_err(|source| OrchestratorError::StateLoad {
            path: self.state_file.clone(),
            source,
        })
    }

    pub fn save(&self, state: &SessionState) -> Result<(), OrchestratorError> {
        let write = || -> anyhow::Result<()> {
            if let Some(parent) = self.state_file.parent() {
                std::fs::create_dir_all(parent).context("Failed to create state directory")?;
            }
            let content = serde_json::to_string_pretty(state)
                .context("Failed to serialize session state")?;
            std::fs::write(&self.state_file, content).context("Failed to write state file")?;
            Ok(())
        };

        write().map_err(|source| OrchestratorError::StateSave {
            path: self.state_file.clone(),
            source,
        })
    }

    /// Remove the persisted session. Ends the session externally.
    pub fn reset(&self) -> Result<(), OrchestratorError> {
        if self.state_file.exists() {
            std::fs::remove_file(&self.state_file).map_err(|e| OrchestratorError::StateSave {
                path: self.state_file.clone(),
                source: anyhow::Error::new(e).context("Failed to remove state file"),
            })?;
        }
        Ok(())
    }
}
