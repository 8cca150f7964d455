//! Job registry: maps a logical target table to the handle of the most
//! recently submitted asynchronous job for it.
//!
//! Submission is at-most-once per call — no retry lives here; callers decide
//! whether to resubmit, and a resubmission simply overwrites the entry (the
//! prior remote job is no longer tracked). Keys are qualified by session id so
//! concurrent sessions sharing a process cannot collide.

use crate::engine::{DataEngine, JobHandle, JobState, WriteMode};
use crate::errors::RegistryError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// What to run and where to write it.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub sql: String,
    pub destination: String,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone)]
pub struct JobEntry {
    pub handle: JobHandle,
    pub submitted_at: DateTime<Utc>,
}

pub struct JobRegistry {
    engine: Arc<dyn DataEngine>,
    session_id: String,
    entries: HashMap<String, JobEntry>,
}

impl JobRegistry {
    pub fn new(engine: Arc<dyn DataEngine>, session_id: &str) -> Self {
        Self {
            engine,
            session_id: session_id.to_string(),
            entries: HashMap::new(),
        }
    }

    fn key(&self, target: &str) -> String {
        format!("{}:{}", self.session_id, target)
    }

    /// Submit a job for `target`, storing the handle on success. A successful
    /// submit overwrites any prior handle for the same target.
    pub async fn submit(
        &mut self,
        target: &str,
        spec: &JobSpec,
    ) -> Result<JobHandle, RegistryError> {
        let handle = self
            .engine
            .submit_job(&spec.sql, &spec.destination, spec.write_mode)
            .await
            .map_err(RegistryError::Submission)?;

        tracing::info!(target, job_id = %handle.id, "registered job for target");
        self.entries.insert(
            self.key(target),
            JobEntry {
                handle: handle.clone(),
                submitted_at: Utc::now(),
            },
        );
        Ok(handle)
    }

    /// Poll the status of the job tracked for `target`.
    ///
    /// Fails with `UnknownTarget` if nothing was ever submitted. A poll-level
    /// engine error is advisory and must not crash the caller, so it comes
    /// back as `JobState::Failed` rather than `Err`.
    pub async fn status(&self, target: &str) -> Result<JobState, RegistryError> {
        let entry =
            self.entries
                .get(&self.key(target))
                .ok_or_else(|| RegistryError::UnknownTarget {
                    target: target.to_string(),
                })?;

        match self.engine.poll_job(&entry.handle).await {
            Ok(state) => Ok(state),
            Err(e) => Ok(JobState::Failed(format!("status check error: {}", e))),
        }
    }

    /// Re-seed an entry from persisted session state after a process restart,
    /// so status lookups survive session boundaries.
    pub fn restore(&mut self, target: &str, handle: JobHandle) {
        self.entries.insert(
            self.key(target),
            JobEntry {
                handle,
                submitted_at: Utc::now(),
            },
        );
    }

    pub fn tracks(&self, target: &str) -> bool {
        self.entries.contains_key(&self.key(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnInfo, Row};
    use crate::errors::EngineError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine stub with scriptable submit/poll behavior.
    struct StubEngine {
        fail_submit: bool,
        fail_poll: bool,
        poll_state: JobState,
        next_job: Mutex<u32>,
    }

    impl StubEngine {
        fn new() -> Self {
            Self {
                fail_submit: false,
                fail_poll: false,
                poll_state: JobState::Running,
                next_job: Mutex::new(1),
            }
        }
    }

    #[async_trait]
    impl DataEngine for StubEngine {
        async fn list_tables(&self, _dataset: &str) -> Result<Vec<String>, EngineError> {
            Ok(vec![])
        }

        async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, EngineError> {
            Err(EngineError::NotFound {
                table: table.to_string(),
            })
        }

        async fn run_query(&self, _sql: &str, _row_limit: usize) -> Result<Vec<Row>, EngineError> {
            Ok(vec![])
        }

        async fn submit_job(
            &self,
            _sql: &str,
            _destination: &str,
            _write_mode: WriteMode,
        ) -> Result<JobHandle, EngineError> {
            if self.fail_submit {
                return Err(EngineError::Submission {
                    message: "quota exceeded".into(),
                });
            }
            let mut next = self.next_job.lock().unwrap();
            let id = format!("job_{}", *next);
            *next += 1;
            Ok(JobHandle {
                id,
                location: "US".into(),
            })
        }

        async fn poll_job(&self, _handle: &JobHandle) -> Result<JobState, EngineError> {
            if self.fail_poll {
                return Err(EngineError::Transport {
                    message: "connection reset".into(),
                });
            }
            Ok(self.poll_state.clone())
        }
    }

    fn registry(engine: StubEngine) -> JobRegistry {
        JobRegistry::new(Arc::new(engine), "session-1")
    }

    fn spec() -> JobSpec {
        JobSpec {
            sql: "SELECT 1".into(),
            destination: "proj.ds.daily".into(),
            write_mode: WriteMode::Truncate,
        }
    }

    #[tokio::test]
    async fn test_status_before_submit_is_unknown_target() {
        let reg = registry(StubEngine::new());
        let err = reg.status("proj.ds.daily").await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownTarget { .. }));
    }

    #[tokio::test]
    async fn test_submit_then_status_never_unknown_again() {
        let mut reg = registry(StubEngine::new());
        reg.submit("proj.ds.daily", &spec()).await.unwrap();

        let state = reg.status("proj.ds.daily").await.unwrap();
        assert_eq!(state, JobState::Running);
    }

    #[tokio::test]
    async fn test_failed_submit_registers_nothing() {
        let mut engine = StubEngine::new();
        engine.fail_submit = true;
        let mut reg = registry(engine);

        let err = reg.submit("proj.ds.daily", &spec()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Submission(_)));
        assert!(!reg.tracks("proj.ds.daily"));
    }

    #[tokio::test]
    async fn test_resubmit_overwrites_entry() {
        let mut reg = registry(StubEngine::new());
        let first = reg.submit("proj.ds.daily", &spec()).await.unwrap();
        let second = reg.submit("proj.ds.daily", &spec()).await.unwrap();

        assert_ne!(first.id, second.id);
        let entry = reg.entries.get(&reg.key("proj.ds.daily")).unwrap();
        assert_eq!(entry.handle.id, second.id);
    }

    #[tokio::test]
    async fn test_poll_error_surfaces_as_failed_not_err() {
        let mut engine = StubEngine::new();
        engine.fail_poll = true;
        let mut reg = registry(engine);
        reg.submit("proj.ds.daily", &spec()).await.unwrap();

        let state = reg.status("proj.ds.daily").await.unwrap();
        match state {
            JobState::Failed(reason) => {
                assert!(reason.starts_with("status check error:"));
                assert!(reason.contains("connection reset"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restore_seeds_entry_for_status() {
        let mut engine = StubEngine::new();
        engine.poll_state = JobState::Succeeded;
        let mut reg = registry(engine);

        reg.restore(
            "proj.ds.daily",
            JobHandle {
                id: "job_persisted".into(),
                location: "US".into(),
            },
        );

        let state = reg.status("proj.ds.daily").await.unwrap();
        assert_eq!(state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_keys_are_session_scoped() {
        let mut reg_a = JobRegistry::new(Arc::new(StubEngine::new()), "session-a");
        reg_a.submit("proj.ds.daily", &spec()).await.unwrap();

        let reg_b = JobRegistry::new(Arc::new(StubEngine::new()), "session-b");
        assert!(reg_a.tracks("proj.ds.daily"));
        assert!(!reg_b.tracks("proj.ds.daily"));
    }
}
