//! Timeline (audit) event model.
//!
//! # Responsibility
//! - Define the immutable audit record appended for every transition.
//! - Own the fixed event-kind vocabulary and its stable string codes.
//!
//! # Invariants
//! - Events are never mutated after creation.
//! - `EventKind::as_str` codes are stable storage values; parsing accepts
//!   exactly the codes produced by `as_str`.

use crate::model::patent::{PatentId, Pipeline, StageKind};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a timeline event.
pub type EventId = Uuid;

/// Fixed vocabulary of timeline event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EventKind {
    /// Assignee marked a stage done (`{pipeline}_{stage}_completed`).
    StageCompleted { pipeline: Pipeline, stage: StageKind },
    /// Admin approved a stage (`{pipeline}_{stage}_approved`).
    StageApproved { pipeline: Pipeline, stage: StageKind },
    /// Admin bounced a stage (`{pipeline}_{stage}_rejected`).
    StageRejected { pipeline: Pipeline, stage: StageKind },
    PatentCreated,
    AssignmentUpdated,
    GateUpdated,
    ExaminationActivated,
    ExaminationDeactivated,
    RoundOpened,
    OverallCompleted,
    PatentWithdrawn,
    PatentReinstated,
}

const PIPELINES: [Pipeline; 3] = [Pipeline::Ps, Pipeline::Cs, Pipeline::Fer];
const STAGES: [StageKind; 2] = [StageKind::Draft, StageKind::File];

impl EventKind {
    /// Stable snake_case code.
    pub fn as_str(self) -> &'static str {
        use Pipeline::{Cs, Fer, Ps};
        use StageKind::{Draft, File};

        match self {
            Self::StageCompleted { pipeline, stage } => match (pipeline, stage) {
                (Ps, Draft) => "ps_draft_completed",
                (Ps, File) => "ps_filing_completed",
                (Cs, Draft) => "cs_draft_completed",
                (Cs, File) => "cs_filing_completed",
                (Fer, Draft) => "fer_draft_completed",
                (Fer, File) => "fer_filing_completed",
            },
            Self::StageApproved { pipeline, stage } => match (pipeline, stage) {
                (Ps, Draft) => "ps_draft_approved",
                (Ps, File) => "ps_filing_approved",
                (Cs, Draft) => "cs_draft_approved",
                (Cs, File) => "cs_filing_approved",
                (Fer, Draft) => "fer_draft_approved",
                (Fer, File) => "fer_filing_approved",
            },
            Self::StageRejected { pipeline, stage } => match (pipeline, stage) {
                (Ps, Draft) => "ps_draft_rejected",
                (Ps, File) => "ps_filing_rejected",
                (Cs, Draft) => "cs_draft_rejected",
                (Cs, File) => "cs_filing_rejected",
                (Fer, Draft) => "fer_draft_rejected",
                (Fer, File) => "fer_filing_rejected",
            },
            Self::PatentCreated => "patent_created",
            Self::AssignmentUpdated => "assignment_updated",
            Self::GateUpdated => "gate_updated",
            Self::ExaminationActivated => "examination_activated",
            Self::ExaminationDeactivated => "examination_deactivated",
            Self::RoundOpened => "fer_round_opened",
            Self::OverallCompleted => "overall_completed",
            Self::PatentWithdrawn => "patent_withdrawn",
            Self::PatentReinstated => "patent_reinstated",
        }
    }

    /// Every kind in the vocabulary.
    pub fn all() -> Vec<EventKind> {
        let mut kinds = Vec::with_capacity(27);
        for pipeline in PIPELINES {
            for stage in STAGES {
                kinds.push(Self::StageCompleted { pipeline, stage });
                kinds.push(Self::StageApproved { pipeline, stage });
                kinds.push(Self::StageRejected { pipeline, stage });
            }
        }
        kinds.extend([
            Self::PatentCreated,
            Self::AssignmentUpdated,
            Self::GateUpdated,
            Self::ExaminationActivated,
            Self::ExaminationDeactivated,
            Self::RoundOpened,
            Self::OverallCompleted,
            Self::PatentWithdrawn,
            Self::PatentReinstated,
        ]);
        kinds
    }

    /// Parses a code produced by [`EventKind::as_str`].
    pub fn parse(value: &str) -> Option<EventKind> {
        Self::all().into_iter().find(|kind| kind.as_str() == value)
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<EventKind> for String {
    fn from(value: EventKind) -> Self {
        value.as_str().to_string()
    }
}

impl TryFrom<String> for EventKind {
    type Error = UnknownEventKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventKind::parse(&value).ok_or(UnknownEventKind(value))
    }
}

/// Code outside the event-kind vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind(pub String);

impl Display for UnknownEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown timeline event kind `{}`", self.0)
    }
}

impl Error for UnknownEventKind {}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: EventId,
    pub patent_id: PatentId,
    pub kind: EventKind,
    /// Human-readable summary, including any rejection reason verbatim.
    pub description: String,
    /// Acting employee, when the event has one.
    pub actor_name: Option<String>,
    /// Deadline of the affected assignment at event time (epoch ms).
    pub deadline_snapshot: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn vocabulary_codes_are_unique_and_parse_back() {
        let kinds = EventKind::all();
        let codes: HashSet<&str> = kinds.iter().map(|kind| kind.as_str()).collect();
        assert_eq!(codes.len(), kinds.len());
        for kind in kinds {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::parse("ps_review_started"), None);
    }

    #[test]
    fn stage_codes_match_published_vocabulary() {
        let kind = EventKind::StageCompleted {
            pipeline: Pipeline::Fer,
            stage: StageKind::File,
        };
        assert_eq!(kind.as_str(), "fer_filing_completed");

        let kind = EventKind::StageRejected {
            pipeline: Pipeline::Ps,
            stage: StageKind::Draft,
        };
        assert_eq!(kind.as_str(), "ps_draft_rejected");
    }
}
