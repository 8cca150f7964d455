//! Data-engine seam: the warehouse operations the orchestrator depends on.
//!
//! The orchestrator only ever talks to the warehouse through the [`DataEngine`]
//! trait: listing tables, reading schemas, running bounded synchronous queries
//! for sampling, and submitting/polling asynchronous data-movement jobs.

pub mod http;

pub use http::HttpEngine;

use crate::errors::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single column of a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub nullable: bool,
}

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Opaque handle to a submitted asynchronous job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub location: String,
}

/// Terminal and non-terminal job states reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed(reason) => write!(f, "FAILED: {}", reason),
        }
    }
}

/// Write disposition for the destination table of a data-movement job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Overwrite the destination table (the supported model: one logical
    /// target, latest job wins).
    #[default]
    Truncate,
    Append,
}

/// Warehouse operations required by the orchestration core.
#[async_trait]
pub trait DataEngine: Send + Sync {
    /// List table names in a dataset. An empty list is valid, not an error.
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>, EngineError>;

    /// Fetch the schema of a table. Fails with `NotFound` if the table is absent.
    async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, EngineError>;

    /// Run a query synchronously, bounded by `row_limit`. Used for sampling
    /// and validation only; the limit must already be embedded in the SQL by
    /// the caller, `row_limit` is the server-side cap.
    async fn run_query(&self, sql: &str, row_limit: usize) -> Result<Vec<Row>, EngineError>;

    /// Submit an asynchronous query job writing into `destination`.
    /// Fire-and-forget: returns as soon as the engine acknowledges the job.
    async fn submit_job(
        &self,
        sql: &str,
        destination: &str,
        write_mode: WriteMode,
    ) -> Result<JobHandle, EngineError>;

    /// Poll a previously submitted job for its current state.
    async fn poll_job(&self, handle: &JobHandle) -> Result<JobState, EngineError>;
}
