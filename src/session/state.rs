//! Session state: the single mutable entity of a workflow session.
//!
//! Owned exclusively by the orchestrator and mutated only by the steps it
//! invokes. Revision sequences (`transformation_plan`, `sql_query`) are
//! append-only — the current value is always the last element, earlier
//! elements form the audit trail. Feedback fields are cleared on consumption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state approval for a human checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approval {
    #[default]
    Unset,
    Approved,
    /// The user (or an automated check) asked for another revision; the
    /// corresponding feedback field holds the critique.
    Revise,
}

/// Which human checkpoint is currently awaiting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Plan,
    Sample,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Qualifies job-registry keys so concurrent sessions cannot collide.
    pub session_id: String,

    pub schema_requested: bool,
    pub target_schema: Option<String>,
    pub target_table_id: Option<String>,
    pub target_table_name: Option<String>,
    /// True when the table id came from the best-effort fallback parser.
    #[serde(default)]
    pub target_id_fallback: bool,

    #[serde(default)]
    pub source_tables: Vec<String>,

    #[serde(default)]
    pub transformation_plan: Vec<String>,
    pub plan_feedback: Option<String>,
    #[serde(default)]
    pub plan_approved: Approval,

    #[serde(default)]
    pub sql_query: Vec<String>,
    pub sql_feedback: Option<String>,
    #[serde(default)]
    pub sample_approved: Approval,
    /// Rendered sample rows from the last successful validation run.
    pub sample_preview: Option<String>,

    pub pending_gate: Option<Gate>,

    pub job_id: Option<String>,
    pub job_location: Option<String>,
    pub job_submitted_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            schema_requested: false,
            target_schema: None,
            target_table_id: None,
            target_table_name: None,
            target_id_fallback: false,
            source_tables: Vec::new(),
            transformation_plan: Vec::new(),
            plan_feedback: None,
            plan_approved: Approval::Unset,
            sql_query: Vec::new(),
            sql_feedback: None,
            sample_approved: Approval::Unset,
            sample_preview: None,
            pending_gate: None,
            job_id: None,
            job_location: None,
            job_submitted_at: None,
        }
    }

    /// The current plan is the latest revision.
    pub fn latest_plan(&self) -> Option<&str> {
        self.transformation_plan.last().map(String::as_str)
    }

    /// The current SQL is the latest revision.
    pub fn latest_sql(&self) -> Option<&str> {
        self.sql_query.last().map(String::as_str)
    }

    pub fn push_plan(&mut self, plan: String) {
        self.transformation_plan.push(plan);
    }

    pub fn push_sql(&mut self, sql: String) {
        self.sql_query.push(sql);
    }

    /// Append newly discovered tables, preserving order and skipping
    /// duplicates. The list is append-only.
    pub fn append_source_tables(&mut self, tables: impl IntoIterator<Item = String>) {
        for table in tables {
            if !self.source_tables.contains(&table) {
                self.source_tables.push(table);
            }
        }
    }

    /// Consume pending plan feedback. Clear-on-consumption keeps the
    /// `Revise` => feedback-present invariant checkable.
    pub fn take_plan_feedback(&mut self) -> Option<String> {
        self.plan_feedback.take()
    }

    pub fn take_sql_feedback(&mut self) -> Option<String> {
        self.sql_feedback.take()
    }

    pub fn set_plan_feedback(&mut self, feedback: String) {
        self.plan_feedback = Some(feedback);
        self.plan_approved = Approval::Revise;
    }

    pub fn set_sql_feedback(&mut self, feedback: String) {
        self.sql_feedback = Some(feedback);
        self.sample_approved = Approval::Revise;
    }

    /// Record a submitted job handle, overwriting any prior handle.
    pub fn record_job(&mut self, id: String, location: String) {
        self.job_id = Some(id);
        self.job_location = Some(location);
        self.job_submitted_at = Some(Utc::now());
    }

    pub fn has_job(&self) -> bool {
        self.job_id.is_some()
    }

    /// Clear everything except the session id. Only valid at session end.
    pub fn clear(&mut self) {
        let session_id = self.session_id.clone();
        *self = Self::new();
        self.session_id = session_id;
    }
}
