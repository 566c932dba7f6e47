//! Workflow engine: eligibility, transitions, roll-ups and audit events.
//!
//! # Responsibility
//! - Decide what an actor may do next and validate requested transitions.
//! - Keep derived completion flags consistent after every mutation.
//!
//! # Invariants
//! - Engine functions are pure over in-memory snapshots; persistence lives
//!   in `repo` and orchestration in `service`.

pub mod actor;
pub mod completion;
pub mod eligibility;
pub mod error;
pub mod queue;
pub mod timeline;
pub mod transition;
