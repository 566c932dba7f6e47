//! Core workflow engine for PatentFlow.
//! This crate is the single source of truth for patent workflow invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::EngineConfig;
pub use engine::actor::{parse_role, Actor, Role, RoleParseError};
pub use engine::eligibility::{resolve_task, resolve_tasks, TaskDescriptor, TaskKind};
pub use engine::error::{WorkflowError, WorkflowResult};
pub use engine::queue::{drafting_queue, filing_queue, review_queue};
pub use engine::transition::{
    Action, Evaluation, PlannedTransition, TransitionEngine, TransitionRequest,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::patent::{
    normalize_tracking_code, Assignment, ExaminationRound, FormFlags, Gate, Patent, PatentId,
    Pipeline, Slot, StageFlags, StageKind, Track, TrackId, TrackingCodeError,
};
pub use model::status::{Prerequisite, StageState};
pub use model::timeline::{EventId, EventKind, TimelineEvent};
pub use repo::patent_repo::{
    PatentListQuery, PatentRepository, RepoError, RepoResult, SqlitePatentRepository,
};
pub use service::workflow_service::{NewPatent, TransitionOutcome, WorkflowService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
