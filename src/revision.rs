//! Bounded generate/validate revision loop.
//!
//! The loop runs a generate step then a validate step, repeating until the
//! validate step reports a terminal verdict or the iteration cap is hit. The
//! cap is a safety backstop, not the expected path: loops are designed to exit
//! as soon as automated validation passes.
//!
//! Step errors (generation failures, query errors, timeouts) never escape the
//! loop — each counts as one failed iteration, and the last error message is
//! carried in the `Exhausted` outcome so the orchestrator can surface it.

use crate::errors::OrchestratorError;
use crate::session::SessionState;
use async_trait::async_trait;

/// Produces the next revision (plan or SQL) into session state.
#[async_trait]
pub trait GenerateStep: Send + Sync {
    async fn generate(&self, state: &mut SessionState) -> Result<(), OrchestratorError>;
}

/// Judges the latest revision. `Retry` must leave feedback in state for the
/// next generate pass; `Approved` hands control to the human checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
    Retry,
}

#[async_trait]
pub trait ValidateStep: Send + Sync {
    async fn validate(&self, state: &mut SessionState) -> Result<Verdict, OrchestratorError>;
}

/// Terminal outcome of a revision loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopOutcome {
    Approved,
    Rejected,
    /// The iteration cap was reached without approval. Degraded, not fatal:
    /// the orchestrator reports it to the user instead of proceeding.
    Exhausted { last_error: Option<String> },
}

pub struct RevisionLoop {
    max_iterations: u32,
}

impl RevisionLoop {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    pub async fn run(
        &self,
        state: &mut SessionState,
        generate: &dyn GenerateStep,
        validate: &dyn ValidateStep,
    ) -> LoopOutcome {
        let mut last_error: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            tracing::debug!(iteration, max = self.max_iterations, "revision iteration");

            if let Err(e) = generate.generate(state).await {
                tracing::warn!(iteration, error = %e, "generate step failed");
                last_error = Some(e.to_string());
                continue;
            }

            match validate.validate(state).await {
                Ok(Verdict::Approved) => return LoopOutcome::Approved,
                Ok(Verdict::Rejected) => return LoopOutcome::Rejected,
                Ok(Verdict::Retry) => {}
                Err(e) => {
                    tracing::warn!(iteration, error = %e, "validate step failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        tracing::warn!(max = self.max_iterations, "revision loop exhausted");
        LoopOutcome::Exhausted { last_error }
    }
}
