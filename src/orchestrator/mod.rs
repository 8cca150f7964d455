pub mod approval;
pub mod machine;
pub mod turn;

pub use machine::{Action, decide};
pub use turn::Orchestrator;
