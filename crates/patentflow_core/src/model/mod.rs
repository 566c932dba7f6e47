//! Patent workflow domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the workflow engine.
//! - Keep one aggregate shape (patent + tracks + rounds) for every view.
//!
//! # Invariants
//! - Every patent is identified by a stable `PatentId`.
//! - Patents are never hard-deleted by core; withdrawal is a flag.

pub mod patent;
pub mod status;
pub mod timeline;
