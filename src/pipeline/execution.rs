//! Execution pipeline: a bounded SQL generate/sample-validate loop followed by
//! the sample confirmation checkpoint.
//!
//! Sample validation runs a row-limited version of the generated query against
//! the data engine. Every sample query carries an explicit row cap so a
//! validation run stays cheap regardless of backend throttling.

use super::PipelineOutcome;
use crate::engine::{DataEngine, Row};
use crate::errors::OrchestratorError;
use crate::reasoning::{PromptContext, Reasoner};
use crate::revision::{GenerateStep, LoopOutcome, RevisionLoop, ValidateStep, Verdict};
use crate::session::{Approval, Gate, SessionState};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static TRAILING_LIMIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\s+\d+\s*$").unwrap());

pub struct ExecutionPipeline {
    engine: Arc<dyn DataEngine>,
    reasoner: Arc<dyn Reasoner>,
    source_dataset: String,
    sample_row_limit: usize,
    max_iterations: u32,
}

impl ExecutionPipeline {
    pub fn new(
        engine: Arc<dyn DataEngine>,
        reasoner: Arc<dyn Reasoner>,
        source_dataset: &str,
        sample_row_limit: usize,
        max_iterations: u32,
    ) -> Self {
        Self {
            engine,
            reasoner,
            source_dataset: source_dataset.to_string(),
            sample_row_limit,
            max_iterations,
        }
    }

    pub async fn run(&self, state: &mut SessionState) -> PipelineOutcome {
        let generate = SqlGenerate {
            reasoner: Arc::clone(&self.reasoner),
            source_dataset: self.source_dataset.clone(),
        };
        let validate = SampleValidate {
            engine: Arc::clone(&self.engine),
            row_limit: self.sample_row_limit,
        };

        let outcome = RevisionLoop::new(self.max_iterations)
            .run(state, &generate, &validate)
            .await;

        match outcome {
            LoopOutcome::Approved => {
                state.sample_approved = Approval::Unset;
                state.pending_gate = Some(Gate::Sample);
                PipelineOutcome::AwaitingApproval {
                    message: format!(
                        "Generated SQL (revision {}):\n\n{}\n\nSample rows:\n{}\n\n\
                         Does this sample look correct? Reply 'yes' to approve, 'no' to \
                         abandon, or describe what to refine.",
                        state.sql_query.len(),
                        state.latest_sql().unwrap_or("(empty)"),
                        state.sample_preview.as_deref().unwrap_or("(no rows)")
                    ),
                }
            }
            LoopOutcome::Rejected => PipelineOutcome::Rejected {
                message: "SQL generation was abandoned.".to_string(),
            },
            LoopOutcome::Exhausted { last_error } => {
                let detail = last_error
                    .or_else(|| state.sql_feedback.clone())
                    .map(|e| format!(" Last failure: {}", e))
                    .unwrap_or_default();
                PipelineOutcome::Exhausted {
                    message: format!(
                        "SQL could not be validated after {} attempts.{} \
                         Provide feedback to steer the next revision.",
                        self.max_iterations, detail
                    ),
                }
            }
        }
    }
}

/// Rewrite a query into its row-limited sample form: trailing semicolon
/// stripped, `LIMIT` appended unless the query already ends with one.
pub fn sample_sql(sql: &str, row_limit: usize) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if TRAILING_LIMIT_REGEX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("{} LIMIT {}", trimmed, row_limit)
    }
}

/// Render sample rows for presentation, one JSON object per line.
pub fn render_sample(rows: &[Row]) -> String {
    if rows.is_empty() {
        return "(query returned no rows)".to_string();
    }
    rows.iter()
        .map(|row| serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate step: draft or revise the SELECT query via the reasoner.
struct SqlGenerate {
    reasoner: Arc<dyn Reasoner>,
    source_dataset: String,
}

#[async_trait]
impl GenerateStep for SqlGenerate {
    async fn generate(&self, state: &mut SessionState) -> Result<(), OrchestratorError> {
        let feedback = state.take_sql_feedback();
        let context = PromptContext {
            target_schema: state.target_schema.clone().unwrap_or_default(),
            target_table_id: state.target_table_id.clone().unwrap_or_default(),
            source_dataset: self.source_dataset.clone(),
            source_tables: state.source_tables.clone(),
            source_schemas: Vec::new(),
            latest_plan: state.latest_plan().map(String::from),
            latest_sql: state.latest_sql().map(String::from),
            feedback: feedback.clone(),
        };

        // A failed attempt must not swallow the critique: put it back so
        // Revise still has its feedback on the next invocation.
        let sql = match self.reasoner.generate(&context.render_sql_prompt()).await {
            Ok(sql) if !sql.trim().is_empty() => sql,
            Ok(_) => {
                if let Some(feedback) = feedback {
                    state.set_sql_feedback(feedback);
                }
                return Err(OrchestratorError::Generation {
                    message: "reasoner returned an empty query".into(),
                });
            }
            Err(e) => {
                if let Some(feedback) = feedback {
                    state.set_sql_feedback(feedback);
                }
                return Err(e);
            }
        };

        state.push_sql(sql);
        Ok(())
    }
}

/// Validate step: execute a row-limited sample of the latest query. Query
/// failures become pending SQL feedback for the next generate pass.
struct SampleValidate {
    engine: Arc<dyn DataEngine>,
    row_limit: usize,
}

#[async_trait]
impl ValidateStep for SampleValidate {
    async fn validate(&self, state: &mut SessionState) -> Result<Verdict, OrchestratorError> {
        let sql = match state.latest_sql() {
            Some(sql) => sql.to_string(),
            None => {
                state.set_sql_feedback("No query was produced; write one from scratch.".into());
                return Ok(Verdict::Retry);
            }
        };

        let sampled = sample_sql(&sql, self.row_limit);
        match self.engine.run_query(&sampled, self.row_limit).await {
            Ok(rows) => {
                state.sample_preview = Some(render_sample(&rows));
                Ok(Verdict::Approved)
            }
            Err(e) => {
                tracing::info!(error = %e, "sample validation failed, queuing feedback");
                state.set_sql_feedback(e.to_string());
                Ok(Verdict::Retry)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnInfo, JobHandle, JobState, WriteMode};
    use crate::errors::EngineError;
    use std::sync::Mutex;

    /// Engine whose run_query fails the first `fail_count` calls.
    struct FlakyEngine {
        fail_count: Mutex<u32>,
        rows: Vec<Row>,
    }

    impl FlakyEngine {
        fn new(fail_count: u32) -> Self {
            let mut row = Row::new();
            row.insert("day".into(), serde_json::json!("2026-08-01"));
            row.insert("total".into(), serde_json::json!(42));
            Self {
                fail_count: Mutex::new(fail_count),
                rows: vec![row],
            }
        }
    }

    #[async_trait]
    impl DataEngine for FlakyEngine {
        async fn list_tables(&self, _dataset: &str) -> Result<Vec<String>, EngineError> {
            Ok(vec![])
        }

        async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, EngineError> {
            Err(EngineError::NotFound {
                table: table.to_string(),
            })
        }

        async fn run_query(&self, _sql: &str, _row_limit: usize) -> Result<Vec<Row>, EngineError> {
            let mut remaining = self.fail_count.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(EngineError::Query {
                    message: "Unrecognized name: totl".into(),
                });
            }
            Ok(self.rows.clone())
        }

        async fn submit_job(
            &self,
            _sql: &str,
            _destination: &str,
            _write_mode: WriteMode,
        ) -> Result<JobHandle, EngineError> {
            unimplemented!("not used by execution pipeline")
        }

        async fn poll_job(&self, _handle: &JobHandle) -> Result<JobState, EngineError> {
            unimplemented!("not used by execution pipeline")
        }
    }

    struct EchoReasoner;

    #[async_trait]
    impl Reasoner for EchoReasoner {
        async fn generate(&self, _prompt: &str) -> Result<String, OrchestratorError> {
            Ok("SELECT day, total FROM proj.raw.orders".into())
        }
    }

    fn state_with_plan() -> SessionState {
        let mut state = SessionState::new();
        state.target_schema = Some("CREATE TABLE proj.ds.daily (day DATE, total INT64)".into());
        state.target_table_id = Some("proj.ds.daily".into());
        state.append_source_tables(["orders".to_string()]);
        state.push_plan("read orders, keep day and total".into());
        state.plan_approved = Approval::Approved;
        state
    }

    #[test]
    fn test_sample_sql_appends_limit_and_strips_semicolon() {
        assert_eq!(
            sample_sql("SELECT * FROM t;", 10),
            "SELECT * FROM t LIMIT 10"
        );
    }

    #[test]
    fn test_sample_sql_keeps_existing_trailing_limit() {
        assert_eq!(sample_sql("SELECT * FROM t LIMIT 5", 10), "SELECT * FROM t LIMIT 5");
        assert_eq!(
            sample_sql("SELECT * FROM t limit 5;", 10),
            "SELECT * FROM t limit 5"
        );
    }

    #[test]
    fn test_sample_sql_inner_limit_still_gets_cap() {
        // LIMIT inside a subquery is not a trailing cap.
        let sql = "SELECT * FROM (SELECT x FROM t LIMIT 100) sub WHERE x > 0";
        assert!(sample_sql(sql, 10).ends_with("LIMIT 10"));
    }

    #[test]
    fn test_render_sample_rows_and_empty() {
        assert_eq!(render_sample(&[]), "(query returned no rows)");

        let mut row = Row::new();
        row.insert("x".into(), serde_json::json!(1));
        let rendered = render_sample(&[row]);
        assert!(rendered.contains("\"x\":1"));
    }

    #[tokio::test]
    async fn test_execution_happy_path_sets_sample_gate() {
        let pipeline = ExecutionPipeline::new(
            Arc::new(FlakyEngine::new(0)),
            Arc::new(EchoReasoner),
            "proj.raw",
            10,
            2,
        );
        let mut state = state_with_plan();

        let outcome = pipeline.run(&mut state).await;

        assert!(matches!(outcome, PipelineOutcome::AwaitingApproval { .. }));
        assert!(outcome.message().contains("2026-08-01"));
        assert_eq!(state.pending_gate, Some(Gate::Sample));
        assert_eq!(state.sql_query.len(), 1);
        assert!(state.sample_preview.is_some());
    }

    #[tokio::test]
    async fn test_execution_retries_after_query_error_then_succeeds() {
        let pipeline = ExecutionPipeline::new(
            Arc::new(FlakyEngine::new(1)),
            Arc::new(EchoReasoner),
            "proj.raw",
            10,
            3,
        );
        let mut state = state_with_plan();

        let outcome = pipeline.run(&mut state).await;

        assert!(matches!(outcome, PipelineOutcome::AwaitingApproval { .. }));
        // Both the failed and the successful revision are kept.
        assert_eq!(state.sql_query.len(), 2);
        // Error feedback was consumed by the second generate pass.
        assert!(state.sql_feedback.is_none());
    }

    /// Succeeds on the first call, errors afterwards.
    struct OneShotReasoner {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Reasoner for OneShotReasoner {
        async fn generate(&self, _prompt: &str) -> Result<String, OrchestratorError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > 1 {
                return Err(OrchestratorError::Generation {
                    message: "model unavailable".into(),
                });
            }
            Ok("SELECT day, totl FROM proj.raw.orders".into())
        }
    }

    #[tokio::test]
    async fn test_generate_failure_keeps_revise_feedback_pair_intact() {
        // The failed sample queues query-error feedback; the second generate
        // attempt consumes it and then errors. The feedback must be back in
        // state when the loop exhausts.
        let pipeline = ExecutionPipeline::new(
            Arc::new(FlakyEngine::new(10)),
            Arc::new(OneShotReasoner {
                calls: Mutex::new(0),
            }),
            "proj.raw",
            10,
            2,
        );
        let mut state = state_with_plan();

        let outcome = pipeline.run(&mut state).await;

        assert!(matches!(outcome, PipelineOutcome::Exhausted { .. }));
        assert_eq!(state.sample_approved, Approval::Revise);
        let feedback = state.sql_feedback.as_deref().expect("feedback restored");
        assert!(feedback.contains("Unrecognized name"));
    }

    #[tokio::test]
    async fn test_execution_exhausts_under_two_iteration_cap() {
        let pipeline = ExecutionPipeline::new(
            Arc::new(FlakyEngine::new(10)),
            Arc::new(EchoReasoner),
            "proj.raw",
            10,
            2,
        );
        let mut state = state_with_plan();

        let outcome = pipeline.run(&mut state).await;

        match &outcome {
            PipelineOutcome::Exhausted { message } => {
                assert!(message.contains("SQL could not be validated"));
                assert!(message.contains("Unrecognized name"));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
        assert_eq!(state.sql_query.len(), 2);
        assert_eq!(state.sample_approved, Approval::Revise);
        assert!(state.pending_gate.is_none());
    }
}
