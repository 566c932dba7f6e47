//! Eligibility resolver.
//!
//! # Responsibility
//! - Answer "what is the next task for this actor on this patent".
//!
//! # Invariants
//! - Pure queries over a snapshot; a missing gate yields no task, not an
//!   error.
//! - Closed (withdrawn or overall-completed) patents yield no tasks.
//! - Tasks are ordered drafting, then filing, then review; within a kind
//!   PS precedes CS precedes rounds in ascending sequence.

use crate::engine::actor::{Actor, Role};
use crate::model::patent::{Patent, PatentId, Slot, StageKind};
use crate::model::status::{can_file, drafting_blocker};
use serde::{Deserialize, Serialize};

/// Kind of pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Drafting,
    Filing,
    /// Admin review of a submitted stage.
    Review(StageKind),
}

/// One unit of pending work surfaced to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub patent_id: PatentId,
    pub tracking_code: String,
    pub slot: Slot,
    pub kind: TaskKind,
    /// Deadline of the assignee responsible for the stage.
    pub deadline: Option<i64>,
}

impl TaskDescriptor {
    fn new(patent: &Patent, slot: Slot, kind: TaskKind, deadline: Option<i64>) -> Self {
        Self {
            patent_id: patent.id,
            tracking_code: patent.tracking_code.clone(),
            slot,
            kind,
            deadline,
        }
    }
}

/// Earliest-in-pipeline task for `actor`, if any.
pub fn resolve_task(patent: &Patent, actor: &Actor) -> Option<TaskDescriptor> {
    resolve_tasks(patent, actor).into_iter().next()
}

/// All tasks for `actor` on `patent` in pipeline order.
///
/// Drafters and filers are matched by name against both duties, so one
/// employee holding several assignments sees drafting before filing.
pub fn resolve_tasks(patent: &Patent, actor: &Actor) -> Vec<TaskDescriptor> {
    match actor.role {
        Role::Drafter | Role::Filer => {
            let mut tasks = drafting_tasks(patent, &actor.name);
            tasks.extend(filing_tasks(patent, &actor.name));
            tasks
        }
        Role::Admin => review_tasks(patent),
    }
}

/// Drafting tasks assigned to `actor_name` whose start gate holds.
pub fn drafting_tasks(patent: &Patent, actor_name: &str) -> Vec<TaskDescriptor> {
    active_slots(patent)
        .into_iter()
        .filter_map(|slot| {
            let view = patent.slot(slot)?;
            let assignment = view.drafter.filter(|a| a.is_held_by(actor_name))?;
            if view.flags.drafting_done || drafting_blocker(patent, slot).is_some() {
                return None;
            }
            Some(TaskDescriptor::new(
                patent,
                slot,
                TaskKind::Drafting,
                assignment.deadline,
            ))
        })
        .collect()
}

/// Filing tasks assigned to `actor_name` whose drafting is done.
pub fn filing_tasks(patent: &Patent, actor_name: &str) -> Vec<TaskDescriptor> {
    active_slots(patent)
        .into_iter()
        .filter_map(|slot| {
            let view = patent.slot(slot)?;
            let assignment = view.filer.filter(|a| a.is_held_by(actor_name))?;
            if view.flags.filing_done || !can_file(&view.flags) {
                return None;
            }
            Some(TaskDescriptor::new(
                patent,
                slot,
                TaskKind::Filing,
                assignment.deadline,
            ))
        })
        .collect()
}

/// Stages awaiting admin review, drafting reviews before filing reviews.
pub fn review_tasks(patent: &Patent) -> Vec<TaskDescriptor> {
    let slots = active_slots(patent);
    let mut tasks = Vec::new();
    for stage in [StageKind::Draft, StageKind::File] {
        for slot in &slots {
            let Some(view) = patent.slot(*slot) else {
                continue;
            };
            let (_, under_review) = view.flags.stage(stage);
            if under_review {
                let deadline = view.assignee(stage).and_then(|a| a.deadline);
                tasks.push(TaskDescriptor::new(
                    patent,
                    *slot,
                    TaskKind::Review(stage),
                    deadline,
                ));
            }
        }
    }
    tasks
}

/// Slots that can carry work: none on closed patents, rounds only while
/// examination is active.
fn active_slots(patent: &Patent) -> Vec<Slot> {
    if !patent.is_open() {
        return Vec::new();
    }
    let mut slots = patent.slots();
    if !patent.examination_active {
        slots.retain(|slot| matches!(slot, Slot::Track(_)));
    }
    slots.sort();
    slots
}
