//! Workflow use-case service.
//!
//! # Responsibility
//! - Load a patent, evaluate a transition, and persist the result plus its
//!   event as one atomic commit.
//! - Expose patent creation, task resolution, queues and timeline reads.
//!
//! # Invariants
//! - Every transition is a read-modify-write guarded by the stored version;
//!   lost races are re-evaluated against fresh state, never blindly
//!   re-applied.
//! - No-op requests write nothing and append no event.
//! - Storage failures are propagated, never swallowed.

use crate::config::EngineConfig;
use crate::engine::actor::Actor;
use crate::engine::completion::recompute;
use crate::engine::eligibility::{resolve_task, resolve_tasks, TaskDescriptor};
use crate::engine::error::{WorkflowError, WorkflowResult};
use crate::engine::queue;
use crate::engine::timeline::{now_epoch_ms, record, record_at};
use crate::engine::transition::{Evaluation, TransitionEngine, TransitionRequest};
use crate::model::patent::{normalize_tracking_code, FormFlags, Patent, PatentId, Slot, StageKind};
use crate::model::timeline::{EventKind, TimelineEvent};
use crate::repo::patent_repo::{PatentListQuery, PatentRepository, RepoError};
use log::{info, warn};
use std::time::Instant;

/// Input for creating a patent record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatent {
    /// Human-entered tracking code; normalized before storage.
    pub tracking_code: String,
    pub title: Option<String>,
}

impl NewPatent {
    pub fn new(tracking_code: impl Into<String>) -> Self {
        Self {
            tracking_code: tracking_code.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Result of applying one transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// State after the request (unchanged snapshot for no-ops).
    pub patent: Patent,
    /// `false` when the requested outcome already held.
    pub changed: bool,
    /// Event committed with the change; `None` for no-ops.
    pub event: Option<TimelineEvent>,
}

/// Workflow service facade over repository implementations.
pub struct WorkflowService<R: PatentRepository> {
    repo: R,
    engine: TransitionEngine,
}

impl<R: PatentRepository> WorkflowService<R> {
    /// Creates a service using the provided repository and engine policy.
    pub fn new(repo: R, config: EngineConfig) -> Self {
        Self {
            repo,
            engine: TransitionEngine::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.engine.config()
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Creates a patent in the initial state and records `patent_created`.
    ///
    /// Only administrators may create patents.
    pub fn create_patent(&self, input: NewPatent, actor: &Actor) -> WorkflowResult<Patent> {
        if !actor.is_admin() {
            return Err(WorkflowError::RoleNotPermitted {
                role: actor.role,
                action: "create patents",
            });
        }

        let tracking_code = normalize_tracking_code(&input.tracking_code)?;
        if self.repo.find_by_tracking_code(&tracking_code)?.is_some() {
            return Err(WorkflowError::DuplicateTrackingCode(tracking_code));
        }

        let now = now_epoch_ms();
        let mut patent = Patent::new(tracking_code, now);
        patent.title = input
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty());
        recompute(&mut patent, self.engine.config());

        let event = record_at(
            patent.id,
            EventKind::PatentCreated,
            format!("{} created", patent.tracking_code),
            Some(actor.name.as_str()),
            None,
            now,
        );
        self.repo.create_patent(&patent, &event)?;

        info!(
            "event=patent_create module=service status=ok patent_id={} tracking_code={}",
            patent.id, patent.tracking_code
        );
        Ok(patent)
    }

    /// Loads one patent or fails with `PatentNotFound`.
    pub fn get_patent(&self, patent_id: PatentId) -> WorkflowResult<Patent> {
        self.repo
            .load_patent(patent_id)?
            .ok_or(WorkflowError::PatentNotFound(patent_id))
    }

    /// Looks a patent up by tracking code, normalizing the input first.
    pub fn find_by_tracking_code(&self, tracking_code: &str) -> WorkflowResult<Option<Patent>> {
        let normalized = normalize_tracking_code(tracking_code)?;
        Ok(self.repo.find_by_tracking_code(&normalized)?)
    }

    pub fn list_patents(&self, query: &PatentListQuery) -> WorkflowResult<Vec<Patent>> {
        Ok(self.repo.list_patents(query)?)
    }

    /// Applies one request through the single transition path.
    ///
    /// Version conflicts are retried up to `max_conflict_retries` times, each
    /// attempt re-evaluating against freshly loaded state.
    pub fn apply(
        &self,
        patent_id: PatentId,
        request: &TransitionRequest,
    ) -> WorkflowResult<TransitionOutcome> {
        let started_at = Instant::now();
        let action = request.action.name();
        let max_retries = self.engine.config().max_conflict_retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let patent = self.get_patent(patent_id)?;
            let expected_version = patent.version;

            let planned = match self.engine.evaluate(&patent, request) {
                Ok(Evaluation::Changed(planned)) => planned,
                Ok(Evaluation::Unchanged) => {
                    info!(
                        "event=transition_apply module=service status=unchanged patent_id={patent_id} action={action} attempts={attempt} duration_ms={}",
                        started_at.elapsed().as_millis()
                    );
                    return Ok(TransitionOutcome {
                        patent,
                        changed: false,
                        event: None,
                    });
                }
                Err(err) => {
                    warn!(
                        "event=transition_apply module=service status=rejected patent_id={patent_id} action={action} error_code={} error={}",
                        err.code(),
                        err
                    );
                    return Err(err);
                }
            };

            match self
                .repo
                .commit_transition(&planned.patent, expected_version, &planned.event)
            {
                Ok(version) => {
                    let mut next = planned.patent;
                    next.version = version;
                    info!(
                        "event=transition_apply module=service status=ok patent_id={patent_id} action={action} event_kind={} version={version} attempts={attempt} duration_ms={}",
                        planned.event.kind,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(TransitionOutcome {
                        patent: next,
                        changed: true,
                        event: Some(planned.event),
                    });
                }
                Err(RepoError::VersionConflict { .. }) if attempt <= max_retries => {
                    warn!(
                        "event=transition_apply module=service status=retry patent_id={patent_id} action={action} attempts={attempt} error_code=version_conflict"
                    );
                }
                Err(err) => {
                    let err = WorkflowError::from(err);
                    warn!(
                        "event=transition_apply module=service status=error patent_id={patent_id} action={action} attempts={attempt} duration_ms={} error_code={} error={}",
                        started_at.elapsed().as_millis(),
                        err.code(),
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    pub fn complete_drafting(
        &self,
        patent_id: PatentId,
        actor: &Actor,
        slot: Slot,
    ) -> WorkflowResult<TransitionOutcome> {
        self.apply(
            patent_id,
            &TransitionRequest::complete_drafting(actor.clone(), slot),
        )
    }

    pub fn complete_filing(
        &self,
        patent_id: PatentId,
        actor: &Actor,
        slot: Slot,
        forms: FormFlags,
    ) -> WorkflowResult<TransitionOutcome> {
        self.apply(
            patent_id,
            &TransitionRequest::complete_filing(actor.clone(), slot, forms),
        )
    }

    pub fn approve_review(
        &self,
        patent_id: PatentId,
        actor: &Actor,
        slot: Slot,
        review: StageKind,
    ) -> WorkflowResult<TransitionOutcome> {
        self.apply(
            patent_id,
            &TransitionRequest::approve(actor.clone(), slot, review),
        )
    }

    pub fn reject_review(
        &self,
        patent_id: PatentId,
        actor: &Actor,
        slot: Slot,
        review: StageKind,
        reason: &str,
    ) -> WorkflowResult<TransitionOutcome> {
        self.apply(
            patent_id,
            &TransitionRequest::reject(actor.clone(), slot, review, reason),
        )
    }

    /// Earliest-in-pipeline task for `actor` on one patent.
    pub fn next_task(
        &self,
        patent_id: PatentId,
        actor: &Actor,
    ) -> WorkflowResult<Option<TaskDescriptor>> {
        let patent = self.get_patent(patent_id)?;
        Ok(resolve_task(&patent, actor))
    }

    /// All tasks for `actor` on one patent.
    pub fn tasks(&self, patent_id: PatentId, actor: &Actor) -> WorkflowResult<Vec<TaskDescriptor>> {
        let patent = self.get_patent(patent_id)?;
        Ok(resolve_tasks(&patent, actor))
    }

    pub fn drafting_queue(&self, actor_name: &str) -> WorkflowResult<Vec<TaskDescriptor>> {
        let patents = self.open_patents()?;
        Ok(queue::drafting_queue(&patents, actor_name))
    }

    pub fn filing_queue(&self, actor_name: &str) -> WorkflowResult<Vec<TaskDescriptor>> {
        let patents = self.open_patents()?;
        Ok(queue::filing_queue(&patents, actor_name))
    }

    pub fn review_queue(&self) -> WorkflowResult<Vec<TaskDescriptor>> {
        let patents = self.open_patents()?;
        Ok(queue::review_queue(&patents))
    }

    /// Appends a free-standing event to a patent's timeline.
    pub fn record_event(
        &self,
        patent_id: PatentId,
        kind: EventKind,
        description: &str,
        actor: Option<&Actor>,
        deadline: Option<i64>,
    ) -> WorkflowResult<TimelineEvent> {
        let event = record(
            patent_id,
            kind,
            description,
            actor.map(|actor| actor.name.as_str()),
            deadline,
        );
        self.repo.append_event(&event)?;
        Ok(event)
    }

    /// Events for one patent, oldest first.
    pub fn timeline(&self, patent_id: PatentId) -> WorkflowResult<Vec<TimelineEvent>> {
        let _ = self.get_patent(patent_id)?;
        Ok(self.repo.list_events(patent_id)?)
    }

    fn open_patents(&self) -> WorkflowResult<Vec<Patent>> {
        Ok(self.repo.list_patents(&PatentListQuery::default())?)
    }
}
