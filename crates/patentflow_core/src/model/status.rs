//! Status predicates over the patent model.
//!
//! # Responsibility
//! - Expose total, side-effect-free predicates for workflow gates.
//! - Derive the displayed per-slot stage from stored flags.
//!
//! # Invariants
//! - Predicates never fail over a well-formed record; unknown rounds yield
//!   `false`/`None` instead of errors.

use crate::model::patent::{Patent, Slot, StageFlags, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A condition that must hold before a transition is permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    IdfReceived,
    CsDataSent,
    CsDataReceived,
    DraftingDone,
    /// Stage has been submitted and awaits review.
    ReviewPending,
    ExaminationActive,
    PsStageComplete,
    CsStageComplete,
    ExaminationComplete,
    /// Patent is neither withdrawn nor overall-completed.
    PatentOpen,
}

impl Prerequisite {
    /// Stable machine-readable code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdfReceived => "idf_received",
            Self::CsDataSent => "cs_data_sent",
            Self::CsDataReceived => "cs_data_received",
            Self::DraftingDone => "drafting_done",
            Self::ReviewPending => "review_pending",
            Self::ExaminationActive => "examination_active",
            Self::PsStageComplete => "ps_stage_complete",
            Self::CsStageComplete => "cs_stage_complete",
            Self::ExaminationComplete => "examination_completion",
            Self::PatentOpen => "patent_open",
        }
    }

    /// User-facing explanation of what is missing.
    pub fn message(self) -> &'static str {
        match self {
            Self::IdfReceived => "IDF must be received before PS Drafting can be completed",
            Self::CsDataSent => "CS Data must be sent before CS Drafting can be completed",
            Self::CsDataReceived => {
                "CS Data must be received before CS Drafting can be completed"
            }
            Self::DraftingDone => "Drafting must be completed before Filing can be completed",
            Self::ReviewPending => "Stage has not been submitted for review",
            Self::ExaminationActive => "Further examination is not active for this patent",
            Self::PsStageComplete => "PS stage must be complete",
            Self::CsStageComplete => "CS stage must be complete",
            Self::ExaminationComplete => "All further examination rounds must be complete",
            Self::PatentOpen => "Patent is withdrawn or already completed",
        }
    }
}

impl Display for Prerequisite {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Displayed position of one slot in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    NotStarted,
    Drafting,
    DraftUnderReview,
    Drafted,
    Filing,
    FileUnderReview,
    Complete,
}

impl StageState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Drafting => "drafting",
            Self::DraftUnderReview => "draft_under_review",
            Self::Drafted => "drafted",
            Self::Filing => "filing",
            Self::FileUnderReview => "file_under_review",
            Self::Complete => "complete",
        }
    }
}

impl Display for StageState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PS drafting gate (`idf_received`).
pub fn can_start_ps_drafting(patent: &Patent) -> bool {
    patent.idf_received
}

/// CS drafting gate (`cs_data_sent` and `cs_data_received`).
pub fn can_start_cs_drafting(patent: &Patent) -> bool {
    patent.cs_data_sent && patent.cs_data_received
}

/// Filing may only be completed after drafting is done.
pub fn can_file(flags: &StageFlags) -> bool {
    flags.drafting_done
}

/// Both stages done and neither awaiting review.
pub fn is_stage_complete(flags: &StageFlags) -> bool {
    flags.drafting_done
        && flags.filing_done
        && !flags.drafting_under_review
        && !flags.filing_under_review
}

/// First unmet drafting gate for `slot`, or `None` when drafting may complete.
///
/// Unknown rounds report `ExaminationActive` only when examination is off;
/// callers resolve round existence separately.
pub fn drafting_blocker(patent: &Patent, slot: Slot) -> Option<Prerequisite> {
    match slot {
        Slot::Track(TrackId::Ps) => {
            (!can_start_ps_drafting(patent)).then_some(Prerequisite::IdfReceived)
        }
        Slot::Track(TrackId::Cs) => {
            if !patent.cs_data_sent {
                Some(Prerequisite::CsDataSent)
            } else if !patent.cs_data_received {
                Some(Prerequisite::CsDataReceived)
            } else {
                None
            }
        }
        Slot::Round(_) => (!patent.examination_active).then_some(Prerequisite::ExaminationActive),
    }
}

/// Derives the displayed stage for `slot`.
///
/// Review states take precedence over assignment-based states so pending
/// admin work is always visible.
pub fn stage_state(patent: &Patent, slot: Slot) -> Option<StageState> {
    let view = patent.slot(slot)?;
    let flags = view.flags;
    let state = if is_stage_complete(&flags) {
        StageState::Complete
    } else if flags.filing_done && flags.filing_under_review {
        StageState::FileUnderReview
    } else if flags.drafting_done && flags.drafting_under_review {
        StageState::DraftUnderReview
    } else if flags.drafting_done {
        if view.filer.is_some() {
            StageState::Filing
        } else {
            StageState::Drafted
        }
    } else if view.drafter.is_some() {
        StageState::Drafting
    } else {
        StageState::NotStarted
    };
    Some(state)
}
