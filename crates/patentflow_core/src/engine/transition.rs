//! Transition engine.
//!
//! # Responsibility
//! - Evaluate one `TransitionRequest` against a patent snapshot.
//! - Enforce role, assignment and gate preconditions.
//! - Produce the complete next aggregate (roll-ups recomputed) plus exactly
//!   one timeline event, or report that nothing changes.
//!
//! # Invariants
//! - The input snapshot is never mutated; callers persist the returned
//!   aggregate as one unit.
//! - `filing_done` is only set while `drafting_done` holds, and a drafting
//!   rejection resets filing for the same slot.
//! - Requests whose outcome already holds are `Evaluation::Unchanged`, never
//!   errors.
//! - Gates only guard work that has not happened yet; once drafting is done,
//!   clearing its gate does not turn a repeat request into an error.
//! - For pending work, gate checks precede assignment checks so a blocked
//!   stage reports what is missing regardless of who asks.

use crate::config::EngineConfig;
use crate::engine::actor::{Actor, Role};
use crate::engine::completion::{overall_completion_blocker, recompute};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::timeline::{now_epoch_ms, record_at};
use crate::model::patent::{
    Assignment, ExaminationRound, FormFlags, Gate, Patent, PatentId, Slot, SlotView, SlotViewMut,
    StageKind,
};
use crate::model::status::{can_file, drafting_blocker, stage_state, Prerequisite};
use crate::model::timeline::{EventKind, TimelineEvent};

/// Requested workflow or administrator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Assigned drafter marks drafting done.
    CompleteDrafting { slot: Slot },
    /// Assigned filer marks filing done, merging auxiliary form flags.
    CompleteFiling { slot: Slot, forms: FormFlags },
    /// Admin accepts a stage under review.
    ApproveReview { slot: Slot, review: StageKind },
    /// Admin bounces a stage under review back to its assignee.
    RejectReview {
        slot: Slot,
        review: StageKind,
        reason: String,
    },
    /// Admin sets (`Some`) or clears (`None`) a drafter/filer assignment.
    Assign {
        slot: Slot,
        duty: StageKind,
        assignee: Option<String>,
        deadline: Option<i64>,
    },
    SetGate { gate: Gate, value: bool },
    SetExaminationActive(bool),
    /// Admin or filer appends the next numbered round.
    OpenExaminationRound,
    MarkOverallCompleted,
    SetWithdrawn(bool),
}

impl Action {
    /// Stable action name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CompleteDrafting { .. } => "complete_drafting",
            Self::CompleteFiling { .. } => "complete_filing",
            Self::ApproveReview { .. } => "approve_review",
            Self::RejectReview { .. } => "reject_review",
            Self::Assign { .. } => "assign",
            Self::SetGate { .. } => "set_gate",
            Self::SetExaminationActive(_) => "set_examination_active",
            Self::OpenExaminationRound => "open_examination_round",
            Self::MarkOverallCompleted => "mark_overall_completed",
            Self::SetWithdrawn(_) => "set_withdrawn",
        }
    }

    /// Slot addressed by the action, if any.
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Self::CompleteDrafting { slot }
            | Self::CompleteFiling { slot, .. }
            | Self::ApproveReview { slot, .. }
            | Self::RejectReview { slot, .. }
            | Self::Assign { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

/// One action performed by an explicit actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub actor: Actor,
    pub action: Action,
}

impl TransitionRequest {
    pub fn new(actor: Actor, action: Action) -> Self {
        Self { actor, action }
    }

    pub fn complete_drafting(actor: Actor, slot: Slot) -> Self {
        Self::new(actor, Action::CompleteDrafting { slot })
    }

    pub fn complete_filing(actor: Actor, slot: Slot, forms: FormFlags) -> Self {
        Self::new(actor, Action::CompleteFiling { slot, forms })
    }

    pub fn approve(actor: Actor, slot: Slot, review: StageKind) -> Self {
        Self::new(actor, Action::ApproveReview { slot, review })
    }

    pub fn reject(actor: Actor, slot: Slot, review: StageKind, reason: impl Into<String>) -> Self {
        Self::new(
            actor,
            Action::RejectReview {
                slot,
                review,
                reason: reason.into(),
            },
        )
    }
}

/// Next aggregate plus the event describing the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub patent: Patent,
    pub event: TimelineEvent,
}

/// Result of evaluating a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Changed(PlannedTransition),
    /// The requested outcome already holds; nothing to persist.
    Unchanged,
}

struct Change {
    kind: EventKind,
    summary: String,
    deadline: Option<i64>,
}

impl Change {
    fn new(kind: EventKind, summary: String, deadline: Option<i64>) -> Self {
        Self {
            kind,
            summary,
            deadline,
        }
    }
}

/// Stateless evaluator configured with engine policy.
#[derive(Debug, Clone, Default)]
pub struct TransitionEngine {
    config: EngineConfig,
}

impl TransitionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluates `request` against `patent` at the current time.
    pub fn evaluate(
        &self,
        patent: &Patent,
        request: &TransitionRequest,
    ) -> WorkflowResult<Evaluation> {
        self.evaluate_at(patent, request, now_epoch_ms())
    }

    /// Evaluates `request` against `patent` at `now` (epoch ms).
    pub fn evaluate_at(
        &self,
        patent: &Patent,
        request: &TransitionRequest,
        now: i64,
    ) -> WorkflowResult<Evaluation> {
        let actor = &request.actor;
        let action = &request.action;

        let bypasses_open_check = matches!(
            action,
            Action::SetWithdrawn(_) | Action::MarkOverallCompleted
        );
        if !bypasses_open_check && !patent.is_open() {
            return Err(precondition(action.slot(), Prerequisite::PatentOpen));
        }

        let mut next = patent.clone();
        let change = match action {
            Action::CompleteDrafting { slot } => complete_drafting(&mut next, *slot, actor)?,
            Action::CompleteFiling { slot, forms } => {
                complete_filing(&mut next, *slot, actor, forms)?
            }
            Action::ApproveReview { slot, review } => {
                approve_review(&mut next, *slot, *review, actor)?
            }
            Action::RejectReview {
                slot,
                review,
                reason,
            } => reject_review(&mut next, *slot, *review, reason, actor)?,
            Action::Assign {
                slot,
                duty,
                assignee,
                deadline,
            } => assign(&mut next, *slot, *duty, assignee.as_deref(), *deadline, actor)?,
            Action::SetGate { gate, value } => set_gate(&mut next, *gate, *value, actor)?,
            Action::SetExaminationActive(active) => {
                set_examination_active(&mut next, *active, actor)?
            }
            Action::OpenExaminationRound => open_examination_round(&mut next, actor, now)?,
            Action::MarkOverallCompleted => {
                mark_overall_completed(&mut next, actor, &self.config)?
            }
            Action::SetWithdrawn(withdrawn) => set_withdrawn(&mut next, *withdrawn, actor)?,
        };

        let Some(change) = change else {
            return Ok(Evaluation::Unchanged);
        };

        recompute(&mut next, &self.config);
        next.updated_at = now;

        let description = match action.slot() {
            Some(slot) => describe_slot_change(patent, &next, slot, &change.summary),
            None => change.summary,
        };
        let event = record_at(
            next.id,
            change.kind,
            description,
            Some(actor.name.as_str()),
            change.deadline,
            now,
        );

        Ok(Evaluation::Changed(PlannedTransition {
            patent: next,
            event,
        }))
    }
}

fn complete_drafting(
    patent: &mut Patent,
    slot: Slot,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    ensure_round_usable(patent, slot)?;
    let current = view(patent, slot)?;
    if current.flags.drafting_done {
        ensure_assigned(current, slot, StageKind::Draft, actor)?;
        return Ok(None);
    }
    if let Some(missing) = drafting_blocker(patent, slot) {
        return Err(precondition(Some(slot), missing));
    }
    let deadline = ensure_assigned(current, slot, StageKind::Draft, actor)?;

    let target = view_mut(patent, slot)?;
    target.flags.drafting_done = true;
    target.flags.drafting_under_review = true;

    Ok(Some(Change::new(
        EventKind::StageCompleted {
            pipeline: slot.pipeline(),
            stage: StageKind::Draft,
        },
        format!("{slot} drafting completed by {}", actor.name.trim()),
        deadline,
    )))
}

fn complete_filing(
    patent: &mut Patent,
    slot: Slot,
    actor: &Actor,
    forms: &FormFlags,
) -> WorkflowResult<Option<Change>> {
    ensure_round_usable(patent, slot)?;

    let current = view(patent, slot)?;
    if !can_file(&current.flags) {
        return Err(precondition(Some(slot), Prerequisite::DraftingDone));
    }
    let deadline = ensure_assigned(current, slot, StageKind::File, actor)?;
    if current.flags.filing_done {
        return Ok(None);
    }

    let target = view_mut(patent, slot)?;
    target.flags.filing_done = true;
    target.flags.filing_under_review = true;
    for (form, value) in forms {
        target.forms.insert(form.clone(), *value);
    }

    let mut summary = format!("{slot} filing completed by {}", actor.name.trim());
    if !forms.is_empty() {
        let names = forms.keys().map(String::as_str).collect::<Vec<_>>();
        summary.push_str(&format!("; forms: {}", names.join(", ")));
    }

    Ok(Some(Change::new(
        EventKind::StageCompleted {
            pipeline: slot.pipeline(),
            stage: StageKind::File,
        },
        summary,
        deadline,
    )))
}

fn approve_review(
    patent: &mut Patent,
    slot: Slot,
    review: StageKind,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "approve reviews")?;
    ensure_round_usable(patent, slot)?;

    let current = view(patent, slot)?;
    let (done, under_review) = current.flags.stage(review);
    let deadline = current.assignee(review).and_then(|assignment| assignment.deadline);
    if !under_review {
        if done {
            return Ok(None);
        }
        return Err(precondition(Some(slot), Prerequisite::ReviewPending));
    }

    let target = view_mut(patent, slot)?;
    match review {
        StageKind::Draft => target.flags.drafting_under_review = false,
        StageKind::File => target.flags.filing_under_review = false,
    }

    Ok(Some(Change::new(
        EventKind::StageApproved {
            pipeline: slot.pipeline(),
            stage: review,
        },
        format!(
            "{slot} {} approved by {}",
            review.label().to_ascii_lowercase(),
            actor.name.trim()
        ),
        deadline,
    )))
}

fn reject_review(
    patent: &mut Patent,
    slot: Slot,
    review: StageKind,
    reason: &str,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "reject reviews")?;
    ensure_round_usable(patent, slot)?;

    let current = view(patent, slot)?;
    let (done, under_review) = current.flags.stage(review);
    let deadline = current.assignee(review).and_then(|assignment| assignment.deadline);
    if !under_review {
        if !done {
            return Ok(None);
        }
        return Err(precondition(Some(slot), Prerequisite::ReviewPending));
    }

    let target = view_mut(patent, slot)?;
    let mut cascaded = false;
    match review {
        StageKind::Draft => {
            target.flags.drafting_done = false;
            target.flags.drafting_under_review = false;
            cascaded = target.flags.filing_done || target.flags.filing_under_review;
            target.flags.filing_done = false;
            target.flags.filing_under_review = false;
        }
        StageKind::File => {
            target.flags.filing_done = false;
            target.flags.filing_under_review = false;
        }
    }

    let mut summary = format!(
        "{slot} {} rejected by {}: {reason}",
        review.label().to_ascii_lowercase(),
        actor.name.trim()
    );
    if cascaded {
        summary.push_str("; filing reset");
    }

    Ok(Some(Change::new(
        EventKind::StageRejected {
            pipeline: slot.pipeline(),
            stage: review,
        },
        summary,
        deadline,
    )))
}

fn assign(
    patent: &mut Patent,
    slot: Slot,
    duty: StageKind,
    assignee: Option<&str>,
    deadline: Option<i64>,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "change assignments")?;
    ensure_round_usable(patent, slot)?;

    let replacement = assignee
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Assignment::new(name, deadline));

    let target = view_mut(patent, slot)?;
    let holder = match duty {
        StageKind::Draft => target.drafter,
        StageKind::File => target.filer,
    };
    if *holder == replacement {
        return Ok(None);
    }

    let role_name = match duty {
        StageKind::Draft => "drafter",
        StageKind::File => "filer",
    };
    let summary = match &replacement {
        Some(assignment) => format!("{slot} {role_name} assigned to {}", assignment.name),
        None => format!("{slot} {role_name} assignment cleared"),
    };
    let snapshot = replacement.as_ref().and_then(|assignment| assignment.deadline);
    *holder = replacement;

    Ok(Some(Change::new(
        EventKind::AssignmentUpdated,
        summary,
        snapshot,
    )))
}

fn set_gate(
    patent: &mut Patent,
    gate: Gate,
    value: bool,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "update gates")?;
    let before = patent.gate(gate);
    if before == value {
        return Ok(None);
    }
    patent.set_gate(gate, value);

    Ok(Some(Change::new(
        EventKind::GateUpdated,
        format!("{}: {before} -> {value}", gate.as_str()),
        None,
    )))
}

fn set_examination_active(
    patent: &mut Patent,
    active: bool,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "toggle further examination")?;
    if patent.examination_active == active {
        return Ok(None);
    }
    patent.examination_active = active;

    if active {
        return Ok(Some(Change::new(
            EventKind::ExaminationActivated,
            "further examination activated".to_string(),
            None,
        )));
    }

    Ok(Some(Change::new(
        EventKind::ExaminationDeactivated,
        format!(
            "further examination deactivated; {} round(s) reset",
            patent.rounds.len()
        ),
        None,
    )))
}

fn open_examination_round(
    patent: &mut Patent,
    actor: &Actor,
    now: i64,
) -> WorkflowResult<Option<Change>> {
    if !matches!(actor.role, Role::Admin | Role::Filer) {
        return Err(WorkflowError::RoleNotPermitted {
            role: actor.role,
            action: "open examination rounds",
        });
    }
    if !patent.examination_active {
        return Err(precondition(None, Prerequisite::ExaminationActive));
    }

    let sequence = patent.next_round_sequence();
    patent.rounds.push(ExaminationRound::new(sequence, now));

    Ok(Some(Change::new(
        EventKind::RoundOpened,
        format!("{} opened by {}", Slot::Round(sequence), actor.name.trim()),
        None,
    )))
}

fn mark_overall_completed(
    patent: &mut Patent,
    actor: &Actor,
    config: &EngineConfig,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "mark patents completed")?;
    if patent.withdrawn {
        return Err(precondition(None, Prerequisite::PatentOpen));
    }
    if patent.overall_completed {
        return Ok(None);
    }
    if let Some(missing) = overall_completion_blocker(patent, config) {
        return Err(precondition(None, missing));
    }

    patent.overall_completed = true;
    Ok(Some(Change::new(
        EventKind::OverallCompleted,
        format!("{} marked completed", patent.tracking_code),
        None,
    )))
}

fn set_withdrawn(
    patent: &mut Patent,
    withdrawn: bool,
    actor: &Actor,
) -> WorkflowResult<Option<Change>> {
    require_admin(actor, "withdraw or reinstate patents")?;
    if patent.withdrawn == withdrawn {
        return Ok(None);
    }
    patent.withdrawn = withdrawn;

    let (kind, verb) = if withdrawn {
        (EventKind::PatentWithdrawn, "withdrawn")
    } else {
        (EventKind::PatentReinstated, "reinstated")
    };
    Ok(Some(Change::new(
        kind,
        format!("{} {verb}", patent.tracking_code),
        None,
    )))
}

fn describe_slot_change(before: &Patent, after: &Patent, slot: Slot, summary: &str) -> String {
    match (stage_state(before, slot), stage_state(after, slot)) {
        (Some(from), Some(to)) => format!("{summary} [{from} -> {to}]"),
        _ => summary.to_string(),
    }
}

fn precondition(slot: Option<Slot>, missing: Prerequisite) -> WorkflowError {
    WorkflowError::PreconditionNotMet { slot, missing }
}

fn require_admin(actor: &Actor, action: &'static str) -> WorkflowResult<()> {
    if actor.is_admin() {
        return Ok(());
    }
    Err(WorkflowError::RoleNotPermitted {
        role: actor.role,
        action,
    })
}

fn unknown_round(patent_id: PatentId, slot: Slot) -> WorkflowError {
    let sequence = match slot {
        Slot::Round(sequence) => sequence,
        Slot::Track(_) => 0,
    };
    WorkflowError::UnknownRound {
        patent_id,
        sequence,
    }
}

/// Rounds must exist and examination must be active; tracks always pass.
fn ensure_round_usable(patent: &Patent, slot: Slot) -> WorkflowResult<()> {
    if let Slot::Round(sequence) = slot {
        if patent.round(sequence).is_none() {
            return Err(unknown_round(patent.id, slot));
        }
        if !patent.examination_active {
            return Err(precondition(Some(slot), Prerequisite::ExaminationActive));
        }
    }
    Ok(())
}

fn view(patent: &Patent, slot: Slot) -> WorkflowResult<SlotView<'_>> {
    patent.slot(slot).ok_or_else(|| unknown_round(patent.id, slot))
}

fn view_mut(patent: &mut Patent, slot: Slot) -> WorkflowResult<SlotViewMut<'_>> {
    let patent_id = patent.id;
    patent
        .slot_mut(slot)
        .ok_or_else(|| unknown_round(patent_id, slot))
}

/// Returns the assignment deadline when `actor` holds the duty.
fn ensure_assigned(
    current: SlotView<'_>,
    slot: Slot,
    duty: StageKind,
    actor: &Actor,
) -> WorkflowResult<Option<i64>> {
    match current.assignee(duty) {
        Some(assignment) if assignment.is_held_by(&actor.name) => Ok(assignment.deadline),
        _ => Err(WorkflowError::NotAssigned {
            slot,
            duty,
            actor_name: actor.name.trim().to_string(),
        }),
    }
}
