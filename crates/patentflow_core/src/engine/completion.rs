//! Roll-up completion flags.
//!
//! # Responsibility
//! - Recompute every derived flag on a patent after a mutation.
//!
//! # Invariants
//! - `stage_complete` and round `complete` are exactly `is_stage_complete`
//!   of their flags.
//! - Inactive examination resets every round to the inert state before
//!   roll-ups are computed.
//! - `overall_completed` is never written here.

use crate::config::EngineConfig;
use crate::model::patent::Patent;
use crate::model::status::{is_stage_complete, Prerequisite};

/// Recomputes all derived flags in place.
pub fn recompute(patent: &mut Patent, config: &EngineConfig) {
    patent.ps.stage_complete = is_stage_complete(&patent.ps.flags);
    patent.cs.stage_complete = is_stage_complete(&patent.cs.flags);

    if !patent.examination_active {
        for round in &mut patent.rounds {
            round.flags.reset();
        }
    }
    for round in &mut patent.rounds {
        round.complete = is_stage_complete(&round.flags);
    }

    patent.examination_completion = examination_complete(patent, config);
}

/// Examination roll-up for the current round set.
pub fn examination_complete(patent: &Patent, config: &EngineConfig) -> bool {
    if !patent.examination_active {
        return true;
    }
    if patent.rounds.is_empty() {
        return config.empty_examination_complete;
    }
    patent.rounds.iter().all(|round| is_stage_complete(&round.flags))
}

/// First roll-up still blocking overall completion, checked PS, then CS,
/// then examination.
pub fn overall_completion_blocker(patent: &Patent, config: &EngineConfig) -> Option<Prerequisite> {
    if !is_stage_complete(&patent.ps.flags) {
        Some(Prerequisite::PsStageComplete)
    } else if !is_stage_complete(&patent.cs.flags) {
        Some(Prerequisite::CsStageComplete)
    } else if !examination_complete(patent, config) {
        Some(Prerequisite::ExaminationComplete)
    } else {
        None
    }
}
