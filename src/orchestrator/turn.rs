//! Turn executor: owns the collaborators, loads state, runs the decided
//! action, persists state, and replies.
//!
//! One external turn is processed to completion before the next; the only
//! operation that outlives a turn is the submitted data-movement job itself.

use super::machine::{self, Action};
use crate::config::Config;
use crate::engine::DataEngine;
use crate::errors::{OrchestratorError, RegistryError};
use crate::engine::{JobHandle, WriteMode};
use crate::pipeline::{ExecutionPipeline, PlanningPipeline};
use crate::reasoning::Reasoner;
use crate::registry::{JobRegistry, JobSpec};
use crate::schema;
use crate::session::{Approval, SessionState, StateStore};
use std::sync::Arc;

pub struct Orchestrator {
    config: Config,
    engine: Arc<dyn DataEngine>,
    reasoner: Arc<dyn Reasoner>,
    store: StateStore,
}

impl Orchestrator {
    pub fn new(config: Config, engine: Arc<dyn DataEngine>, reasoner: Arc<dyn Reasoner>) -> Self {
        let store = StateStore::new(config.state_file.clone());
        Self {
            config,
            engine,
            reasoner,
            store,
        }
    }

    /// Process one user turn: decide the single next action, execute it,
    /// persist the updated session, and return the reply text.
    pub async fn handle_turn(&self, turn: &str) -> Result<String, OrchestratorError> {
        let mut state = self.store.load()?;
        let action = machine::decide(&state, turn);
        tracing::info!(?action, "turn decided");

        let reply = self.execute(action, &mut state).await;
        self.store.save(&state)?;
        Ok(reply)
    }

    /// Direct status lookup, bypassing the decision table. Used by the
    /// `status` CLI command so a status check never counts as feedback.
    pub async fn status_report(&self) -> Result<String, OrchestratorError> {
        let state = self.store.load()?;
        Ok(self.report_status(&state).await)
    }

    /// Dump the persisted session state as pretty JSON.
    pub fn show_state(&self) -> Result<String, OrchestratorError> {
        let state = self.store.load()?;
        serde_json::to_string_pretty(&state)
            .map_err(|e| OrchestratorError::Other(anyhow::Error::new(e)))
    }

    /// End the session: remove the persisted state.
    pub fn reset(&self) -> Result<(), OrchestratorError> {
        self.store.reset()
    }

    async fn execute(&self, action: Action, state: &mut SessionState) -> String {
        match action {
            Action::Greet => {
                state.schema_requested = true;
                "Hello! I build ETL workflows: give me the target table schema \
                 (ideally a CREATE TABLE DDL) and I will discover source tables, \
                 propose a transformation plan, validate the SQL on a sample, and \
                 launch the data-movement job once you approve each step."
                    .to_string()
            }

            Action::CaptureSchema { raw } => {
                let parsed = schema::parse_target(&raw, &self.config.target_dataset);
                state.target_schema = Some(raw.trim().to_string());
                state.target_table_id = Some(parsed.table_id.clone());
                state.target_table_name = Some(parsed.table_name.clone());
                state.target_id_fallback = parsed.fallback;

                if parsed.fallback {
                    format!(
                        "I could not find a table identifier in that schema, so I am \
                         using '{}' as a best-effort target. Correct me with a proper \
                         CREATE TABLE DDL if that is wrong; otherwise send any message \
                         to start planning.",
                        parsed.table_id
                    )
                } else {
                    format!(
                        "Target table '{}' captured. Send any message to start planning.",
                        parsed.table_id
                    )
                }
            }

            Action::RunPlanning => self.planning_pipeline().run(state).await.message().to_string(),

            Action::ReviseAndRunPlanning { feedback } => {
                state.set_plan_feedback(feedback);
                state.pending_gate = None;
                self.planning_pipeline().run(state).await.message().to_string()
            }

            Action::ApprovePlan => {
                state.plan_approved = Approval::Approved;
                state.pending_gate = None;
                "Plan approved. Send any message and I will generate the SQL and \
                 validate it on a sample."
                    .to_string()
            }

            Action::AbandonPlan => {
                state.pending_gate = None;
                state.plan_approved = Approval::Unset;
                "Planning abandoned. Send feedback or any message to plan again, or \
                 run `loadstone reset` to end the session."
                    .to_string()
            }

            Action::RunExecution => self.execution_pipeline().run(state).await.message().to_string(),

            Action::RefineAndRunExecution { feedback } => {
                state.set_sql_feedback(feedback);
                state.pending_gate = None;
                self.execution_pipeline().run(state).await.message().to_string()
            }

            Action::ApproveSample => {
                state.sample_approved = Approval::Approved;
                state.pending_gate = None;
                "Sample approved. Send any message to launch the data-movement job \
                 (you can ask for status at any time)."
                    .to_string()
            }

            Action::AbandonSample => {
                state.pending_gate = None;
                state.sample_approved = Approval::Unset;
                "SQL generation abandoned. Send feedback or any message to try \
                 again, or run `loadstone reset` to end the session."
                    .to_string()
            }

            Action::SubmitJob => self.submit_job(state).await,

            Action::ReportStatus => self.report_status(state).await,

            Action::Monitor => {
                let job = state.job_id.as_deref().unwrap_or("(unknown)");
                format!(
                    "Job {} is running in the background. Ask \"what's the status?\" \
                     to check on it, or say \"resubmit\" to run it again.",
                    job
                )
            }
        }
    }

    async fn submit_job(&self, state: &mut SessionState) -> String {
        let (Some(target), Some(table_name), Some(sql)) = (
            state.target_table_id.clone(),
            state.target_table_name.clone(),
            state.latest_sql().map(String::from),
        ) else {
            return "Nothing to submit yet: no validated SQL is available.".to_string();
        };

        let spec = JobSpec {
            sql,
            destination: format!("{}.{}", self.config.target_dataset, table_name),
            write_mode: WriteMode::Truncate,
        };

        let mut registry = self.registry(state);
        match registry.submit(&target, &spec).await {
            Ok(handle) => {
                state.record_job(handle.id.clone(), handle.location.clone());
                format!(
                    "ETL job submitted: it is now running asynchronously in the \
                     warehouse (job {} in {}). Ask \"what's the status?\" anytime.",
                    handle.id, handle.location
                )
            }
            Err(e) => format!(
                "Job submission failed: {}. Nothing was registered; send any \
                 message to retry, or give feedback to revise the SQL first.",
                e
            ),
        }
    }

    async fn report_status(&self, state: &SessionState) -> String {
        let Some(target) = state.target_table_id.as_deref() else {
            return "No target table yet - start by giving me the target schema.".to_string();
        };

        let registry = self.registry(state);
        match registry.status(target).await {
            Ok(job_state) => format!("Job status for '{}': {}", target, job_state),
            Err(RegistryError::UnknownTarget { .. }) => format!(
                "No job found for '{}'. Approve the plan and the sample first, \
                 then I can launch it.",
                target
            ),
            Err(e) => format!("Status check failed: {}", e),
        }
    }

    /// Build a registry for this turn, seeded from persisted state so status
    /// lookups survive process restarts.
    fn registry(&self, state: &SessionState) -> JobRegistry {
        let mut registry = JobRegistry::new(Arc::clone(&self.engine), &state.session_id);
        if let (Some(target), Some(id), Some(location)) = (
            state.target_table_id.as_deref(),
            state.job_id.clone(),
            state.job_location.clone(),
        ) {
            registry.restore(target, JobHandle { id, location });
        }
        registry
    }

    fn planning_pipeline(&self) -> PlanningPipeline {
        PlanningPipeline::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.reasoner),
            &self.config.source_dataset,
            self.config.plan_max_iterations,
        )
    }

    fn execution_pipeline(&self) -> ExecutionPipeline {
        ExecutionPipeline::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.reasoner),
            &self.config.source_dataset,
            self.config.sample_row_limit,
            self.config.sql_max_iterations,
        )
    }
}
