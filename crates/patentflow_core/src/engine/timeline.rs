//! Timeline recorder.
//!
//! # Responsibility
//! - Build immutable audit events with fresh identity and timestamp.
//!
//! # Invariants
//! - Recording performs no business validation; persistence happens in the
//!   storage collaborator, inside the same transaction as the patent write.

use crate::model::patent::PatentId;
use crate::model::timeline::{EventKind, TimelineEvent};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Clocks set before the epoch report `0`.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Builds a timeline event stamped with the current time.
pub fn record(
    patent_id: PatentId,
    kind: EventKind,
    description: impl Into<String>,
    actor_name: Option<&str>,
    deadline_snapshot: Option<i64>,
) -> TimelineEvent {
    record_at(
        patent_id,
        kind,
        description,
        actor_name,
        deadline_snapshot,
        now_epoch_ms(),
    )
}

/// Builds a timeline event with an explicit creation timestamp.
pub fn record_at(
    patent_id: PatentId,
    kind: EventKind,
    description: impl Into<String>,
    actor_name: Option<&str>,
    deadline_snapshot: Option<i64>,
    created_at: i64,
) -> TimelineEvent {
    TimelineEvent {
        id: Uuid::new_v4(),
        patent_id,
        kind,
        description: description.into(),
        actor_name: actor_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        deadline_snapshot,
        created_at,
    }
}
