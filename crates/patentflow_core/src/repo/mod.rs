//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the storage collaborator contract for the patent aggregate.
//! - Isolate SQLite query details from workflow orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`PatentNotFound`,
//!   `VersionConflict`) in addition to DB transport errors.

pub mod patent_repo;
