//! The orchestrator decision table.
//!
//! Session state is not a flat tag: the machine's coarse states are derived
//! from the tri-state/gate fields. Each turn, `decide` evaluates a fixed,
//! total order of guard conditions and returns the single action for this
//! turn, which the executor then performs. One action per turn means at most
//! one pipeline invocation or engine call per turn — no double-submission, no
//! double-invocation of revision loops.

use super::approval::{self, ConfirmDecision};
use crate::session::{Approval, Gate, SessionState};

/// The single next action for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// First contact: greet and ask for the target schema.
    Greet,
    /// Parse the user's schema text into target identifiers.
    CaptureSchema { raw: String },
    /// Invoke the planning pipeline.
    RunPlanning,
    /// Store plan feedback, mark the plan for revision, re-invoke planning.
    ReviseAndRunPlanning { feedback: String },
    /// Record plan approval at the plan checkpoint.
    ApprovePlan,
    /// The user rejected the plan outright.
    AbandonPlan,
    /// Invoke the execution (SQL) pipeline.
    RunExecution,
    /// Store SQL feedback, mark the sample for refinement, re-invoke execution.
    RefineAndRunExecution { feedback: String },
    /// Record sample approval at the sample checkpoint.
    ApproveSample,
    /// The user rejected the sample outright.
    AbandonSample,
    /// Submit (or resubmit) the asynchronous data-movement job.
    SubmitJob,
    /// Query the job registry and report.
    ReportStatus,
    /// Job tracked, nothing asked: acknowledge and explain what is available.
    Monitor,
}

/// Evaluate the guard conditions in their fixed order and return the first
/// matching action.
pub fn decide(state: &SessionState, turn: &str) -> Action {
    // 1. Not started.
    if !state.schema_requested {
        return Action::Greet;
    }

    // 2. Awaiting schema.
    if state.target_schema.is_none() {
        return Action::CaptureSchema {
            raw: turn.to_string(),
        };
    }

    // 3-4. Planning stage.
    if state.plan_approved != Approval::Approved {
        if state.pending_gate == Some(Gate::Plan) {
            return match approval::classify(turn) {
                ConfirmDecision::Approve => Action::ApprovePlan,
                ConfirmDecision::Reject => Action::AbandonPlan,
                ConfirmDecision::Feedback(feedback) => Action::ReviseAndRunPlanning { feedback },
            };
        }
        return Action::RunPlanning;
    }

    // 5-6. SQL generation and sampling stage.
    if state.sample_approved != Approval::Approved {
        if state.pending_gate == Some(Gate::Sample) {
            return match approval::classify(turn) {
                ConfirmDecision::Approve => Action::ApproveSample,
                ConfirmDecision::Reject => Action::AbandonSample,
                ConfirmDecision::Feedback(feedback) => Action::RefineAndRunExecution { feedback },
            };
        }
        return Action::RunExecution;
    }

    // 7-8. Execution and monitoring. A status question is answered before any
    // submission happens, so asking early yields "no job found" instead of
    // silently launching one.
    if approval::is_status_request(turn) {
        return Action::ReportStatus;
    }

    if !state.has_job() {
        return Action::SubmitJob;
    }

    if approval::is_resubmit_request(turn) {
        return Action::SubmitJob;
    }

    Action::Monitor
}
