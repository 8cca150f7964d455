//! loadstone: a turn-based ETL workflow orchestrator.
//!
//! A session walks the user from a target schema through source discovery,
//! a reviewed transformation plan, sample-validated SQL, and finally an
//! asynchronous data-movement job, with bounded revision loops and human
//! checkpoints between the stages.

pub mod config;
pub mod engine;
pub mod errors;
pub mod orchestrator;
pub mod pipeline;
pub mod reasoning;
pub mod registry;
pub mod revision;
pub mod schema;
pub mod session;
