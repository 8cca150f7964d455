//! Stage pipelines: fixed compositions of steps around the revision loop.
//!
//! A pipeline never decides when to run — the orchestrator invokes it and
//! interprets its outcome. Each pipeline runs to completion or to a human
//! checkpoint within a single turn, then returns control.

pub mod execution;
pub mod planning;

pub use execution::ExecutionPipeline;
pub use planning::PlanningPipeline;

/// How a pipeline invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Work validated automatically; a human checkpoint is now pending and
    /// the message presents what needs confirming.
    AwaitingApproval { message: String },
    /// The loop terminated with an explicit rejection.
    Rejected { message: String },
    /// Degraded: the iteration budget ran out (or a blocking step failed)
    /// without approval. Surfaced to the user, never silently skipped.
    Exhausted { message: String },
}

impl PipelineOutcome {
    pub fn message(&self) -> &str {
        match self {
            PipelineOutcome::AwaitingApproval { message }
            | PipelineOutcome::Rejected { message }
            | PipelineOutcome::Exhausted { message } => message,
        }
    }
}
