pub mod state;
pub mod store;

pub use state::{Approval, Gate, SessionState};
pub use store::StateStore;
