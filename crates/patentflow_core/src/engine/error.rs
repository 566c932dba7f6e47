//! Workflow error taxonomy.
//!
//! # Invariants
//! - Only `Storage` is transient; every other variant is a permanent
//!   rejection of the given input.
//! - "Already in state" is not an error; it is reported as an unchanged
//!   outcome by the engine.

use crate::engine::actor::Role;
use crate::model::patent::{PatentId, Slot, StageKind, TrackingCodeError};
use crate::model::status::Prerequisite;
use crate::repo::patent_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors surfaced by the transition engine and workflow service.
#[derive(Debug)]
pub enum WorkflowError {
    /// A gate or upstream stage is not satisfied.
    PreconditionNotMet { slot: Option<Slot>, missing: Prerequisite },
    /// Actor is not the recorded drafter/filer for the slot.
    NotAssigned {
        slot: Slot,
        duty: StageKind,
        actor_name: String,
    },
    /// Actor role may not perform the action.
    RoleNotPermitted { role: Role, action: &'static str },
    /// Round sequence does not exist under the patent.
    UnknownRound { patent_id: PatentId, sequence: u32 },
    /// Patent does not exist.
    PatentNotFound(PatentId),
    /// Tracking code failed normalization.
    InvalidTrackingCode(TrackingCodeError),
    /// Tracking code already used by another patent.
    DuplicateTrackingCode(String),
    /// Storage collaborator failure, including lost concurrency races.
    Storage(RepoError),
}

impl WorkflowError {
    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PreconditionNotMet { .. } => "precondition_not_met",
            Self::NotAssigned { .. } => "not_assigned",
            Self::RoleNotPermitted { .. } => "role_not_permitted",
            Self::UnknownRound { .. } => "unknown_round",
            Self::PatentNotFound(_) => "patent_not_found",
            Self::InvalidTrackingCode(_) => "invalid_tracking_code",
            Self::DuplicateTrackingCode(_) => "duplicate_tracking_code",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreconditionNotMet { slot, missing } => match slot {
                Some(slot) => write!(f, "{slot}: {}", missing.message()),
                None => write!(f, "{}", missing.message()),
            },
            Self::NotAssigned {
                slot,
                duty,
                actor_name,
            } => write!(
                f,
                "`{actor_name}` is not the assigned {} for {slot}",
                match duty {
                    StageKind::Draft => "drafter",
                    StageKind::File => "filer",
                }
            ),
            Self::RoleNotPermitted { role, action } => {
                write!(f, "role `{role}` may not {action}")
            }
            Self::UnknownRound {
                patent_id,
                sequence,
            } => write!(
                f,
                "examination round #{sequence} not found on patent {patent_id}"
            ),
            Self::PatentNotFound(id) => write!(f, "patent not found: {id}"),
            Self::InvalidTrackingCode(err) => write!(f, "{err}"),
            Self::DuplicateTrackingCode(code) => {
                write!(f, "tracking code already in use: {code}")
            }
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for WorkflowError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTrackingCode(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for WorkflowError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PatentNotFound(id) => Self::PatentNotFound(id),
            RepoError::DuplicateTrackingCode(code) => Self::DuplicateTrackingCode(code),
            other => Self::Storage(other),
        }
    }
}

impl From<TrackingCodeError> for WorkflowError {
    fn from(value: TrackingCodeError) -> Self {
        Self::InvalidTrackingCode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_message_is_actionable() {
        let err = WorkflowError::PreconditionNotMet {
            slot: Some(Slot::CS),
            missing: Prerequisite::CsDataReceived,
        };
        assert_eq!(
            err.to_string(),
            "CS: CS Data must be received before CS Drafting can be completed"
        );
        assert_eq!(err.code(), "precondition_not_met");
        assert!(!err.is_retryable());
    }

    #[test]
    fn only_storage_errors_are_retryable() {
        let id = uuid::Uuid::new_v4();
        let storage = WorkflowError::from(RepoError::VersionConflict {
            patent_id: id,
            expected_version: 1,
        });
        assert!(storage.is_retryable());

        let not_found = WorkflowError::from(RepoError::PatentNotFound(id));
        assert!(matches!(not_found, WorkflowError::PatentNotFound(found) if found == id));
        assert!(!not_found.is_retryable());
    }
}
