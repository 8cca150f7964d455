//! Typed error hierarchy for the loadstone orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `EngineError` — data-engine (warehouse) call failures
//! - `RegistryError` — job registry failures
//! - `OrchestratorError` — turn execution and state persistence failures
//!
//! Leaf errors never abort a turn: each stage converts its own failures into
//! the feedback/tri-state fields the decision table already understands.

use thiserror::Error;

/// Errors from data-engine operations (discovery, sampling, submission, polling).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Table {table} not found")]
    NotFound { table: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Job submission failed: {message}")]
    Submission { message: String },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Errors from the job registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No job registered for target '{target}'")]
    UnknownTarget { target: String },

    #[error("Submission failed: {0}")]
    Submission(#[source] EngineError),
}

/// Errors from the orchestrator turn executor.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to load session state from {path}: {source}")]
    StateLoad {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to save session state to {path}: {source}")]
    StateSave {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_not_found_carries_table() {
        let err = EngineError::NotFound {
            table: "sales.orders".into(),
        };
        match &err {
            EngineError::NotFound { table } => assert_eq!(table, "sales.orders"),
            _ => panic!("Expected NotFound variant"),
        }
        assert!(err.to_string().contains("sales.orders"));
    }

    #[test]
    fn engine_error_timeout_carries_operation_and_budget() {
        let err = EngineError::Timeout {
            operation: "run_query".into(),
            secs: 60,
        };
        assert!(err.to_string().contains("run_query"));
        assert!(err.to_string().contains("60"));
    }

    #[test]
    fn registry_error_unknown_target_is_matchable() {
        let err = RegistryError::UnknownTarget {
            target: "proj.dataset.table".into(),
        };
        assert!(matches!(err, RegistryError::UnknownTarget { .. }));
        assert!(err.to_string().contains("proj.dataset.table"));
    }

    #[test]
    fn registry_error_submission_wraps_engine_error() {
        let inner = EngineError::Submission {
            message: "permission denied".into(),
        };
        let err = RegistryError::Submission(inner);
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn orchestrator_error_converts_from_engine_error() {
        let inner = EngineError::Query {
            message: "syntax error near SELECT".into(),
        };
        let err: OrchestratorError = inner.into();
        match &err {
            OrchestratorError::Engine(EngineError::Query { message }) => {
                assert_eq!(message, "syntax error near SELECT");
            }
            _ => panic!("Expected OrchestratorError::Engine(Query)"),
        }
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&EngineError::Transport {
            message: "x".into(),
        });
        assert_std_error(&RegistryError::UnknownTarget { target: "t".into() });
        assert_std_error(&OrchestratorError::Generation {
            message: "y".into(),
        });
    }
}
