//! Planning pipeline: discovery, then a bounded plan/critique loop, then the
//! plan confirmation checkpoint.

use super::PipelineOutcome;
use crate::engine::DataEngine;
use crate::errors::OrchestratorError;
use crate::reasoning::{PromptContext, Reasoner};
use crate::revision::{GenerateStep, LoopOutcome, RevisionLoop, ValidateStep, Verdict};
use crate::session::{Approval, Gate, SessionState};
use async_trait::async_trait;
use std::sync::Arc;

pub struct PlanningPipeline {
    engine: Arc<dyn DataEngine>,
    reasoner: Arc<dyn Reasoner>,
    source_dataset: String,
    max_iterations: u32,
}

impl PlanningPipeline {
    pub fn new(
        engine: Arc<dyn DataEngine>,
        reasoner: Arc<dyn Reasoner>,
        source_dataset: &str,
        max_iterations: u32,
    ) -> Self {
        Self {
            engine,
            reasoner,
            source_dataset: source_dataset.to_string(),
            max_iterations,
        }
    }

    pub async fn run(&self, state: &mut SessionState) -> PipelineOutcome {
        // Discovery: list source tables and append them. An empty dataset is
        // valid; the critique step handles plans with nothing to read from.
        match self.engine.list_tables(&self.source_dataset).await {
            Ok(tables) => {
                tracing::info!(count = tables.len(), dataset = %self.source_dataset, "discovered source tables");
                state.append_source_tables(tables);
            }
            Err(e) => {
                tracing::warn!(error = %e, "source table discovery failed");
                return PipelineOutcome::Exhausted {
                    message: format!(
                        "Could not discover source tables in '{}': {}. \
                         Send another message to retry planning.",
                        self.source_dataset, e
                    ),
                };
            }
        }

        let generate = PlanGenerate {
            reasoner: Arc::clone(&self.reasoner),
            source_dataset: self.source_dataset.clone(),
            source_schemas: self.describe_sources(state).await,
        };
        let validate = PlanCritique;

        let outcome = RevisionLoop::new(self.max_iterations)
            .run(state, &generate, &validate)
            .await;

        match outcome {
            LoopOutcome::Approved => {
                state.plan_approved = Approval::Unset;
                state.pending_gate = Some(Gate::Plan);
                let revision = state.transformation_plan.len();
                PipelineOutcome::AwaitingApproval {
                    message: format!(
                        "Proposed transformation plan (revision {}):\n\n{}\n\n\
                         Does this look right? Reply 'yes' to approve, 'no' to abandon, \
                         or describe what to change.",
                        revision,
                        state.latest_plan().unwrap_or("(empty)")
                    ),
                }
            }
            LoopOutcome::Rejected => PipelineOutcome::Rejected {
                message: "Planning was abandoned.".to_string(),
            },
            LoopOutcome::Exhausted { last_error } => {
                let detail = last_error
                    .map(|e| format!(" Last error: {}", e))
                    .unwrap_or_default();
                PipelineOutcome::Exhausted {
                    message: format!(
                        "The plan could not be validated after {} attempts.{} \
                         Provide feedback to steer the next revision, or adjust the \
                         target schema.",
                        self.max_iterations, detail
                    ),
                }
            }
        }
    }

    /// Fetch schemas for the discovered sources, best-effort. A failed lookup
    /// just leaves that table undescribed in the prompt.
    async fn describe_sources(&self, state: &SessionState) -> Vec<String> {
        let mut described = Vec::new();
        for table in &state.source_tables {
            let qualified = format!("{}.{}", self.source_dataset, table);
            match self.engine.table_schema(&qualified).await {
                Ok(columns) => {
                    let cols = columns
                        .iter()
                        .map(|c| format!("{} {}", c.name, c.ty))
                        .collect::<Vec<_>>()
                        .join(", ");
                    described.push(format!("{}({})", table, cols));
                }
                Err(e) => {
                    tracing::debug!(table = %qualified, error = %e, "schema lookup failed");
                }
            }
        }
        described
    }
}

/// Generate step: draft or revise the transformation plan via the reasoner.
struct PlanGenerate {
    reasoner: Arc<dyn Reasoner>,
    source_dataset: String,
    source_schemas: Vec<String>,
}

#[async_trait]
impl GenerateStep for PlanGenerate {
    async fn generate(&self, state: &mut SessionState) -> Result<(), OrchestratorError> {
        let feedback = state.take_plan_feedback();
        let context = PromptContext {
            target_schema: state.target_schema.clone().unwrap_or_default(),
            target_table_id: state.target_table_id.clone().unwrap_or_default(),
            source_dataset: self.source_dataset.clone(),
            source_tables: state.source_tables.clone(),
            source_schemas: self.source_schemas.clone(),
            latest_plan: state.latest_plan().map(String::from),
            latest_sql: None,
            feedback: feedback.clone(),
        };

        // A failed attempt must not swallow the critique: put it back so
        // Revise still has its feedback on the next invocation.
        let plan = match self.reasoner.generate(&context.render_plan_prompt()).await {
            Ok(plan) if !plan.trim().is_empty() => plan,
            Ok(_) => {
                if let Some(feedback) = feedback {
                    state.set_plan_feedback(feedback);
                }
                return Err(OrchestratorError::Generation {
                    message: "reasoner returned an empty plan".into(),
                });
            }
            Err(e) => {
                if let Some(feedback) = feedback {
                    state.set_plan_feedback(feedback);
                }
                return Err(e);
            }
        };

        state.push_plan(plan);
        Ok(())
    }
}

/// Automated plan critique: the plan must reference at least one table that
/// discovery actually found. A plan proposing nonexistent sources gets a
/// revise verdict with feedback, not an approval.
struct PlanCritique;

#[async_trait]
impl ValidateStep for PlanCritique {
    async fn validate(&self, state: &mut SessionState) -> Result<Verdict, OrchestratorError> {
        let plan = match state.latest_plan() {
            Some(p) => p.to_lowercase(),
            None => {
                state.set_plan_feedback("No plan was produced; write one from scratch.".into());
                return Ok(Verdict::Retry);
            }
        };

        if state.source_tables.is_empty() {
            state.set_plan_feedback(
                "No source tables were discovered in the source dataset; the plan \
                 cannot reference sources that do not exist."
                    .into(),
            );
            return Ok(Verdict::Retry);
        }

        let references_known_source = state
            .source_tables
            .iter()
            .any(|t| plan.contains(&t.to_lowercase()));

        if !references_known_source {
            state.set_plan_feedback(format!(
                "The plan references none of the discovered source tables ({}). \
                 Rewrite it against tables that exist.",
                state.source_tables.join(", ")
            ));
            return Ok(Verdict::Retry);
        }

        Ok(Verdict::Approved)
    }
}
