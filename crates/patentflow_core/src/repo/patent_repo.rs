//! Patent repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the whole patent aggregate (patent row, tracks, rounds, form
//!   flags) together with its timeline events.
//! - Detect lost updates through the `version` column.
//!
//! # Invariants
//! - `create_patent` and `commit_transition` write the aggregate and its
//!   event in one `BEGIN IMMEDIATE` transaction; nothing is written when any
//!   step fails.
//! - `commit_transition` only succeeds while the stored version equals the
//!   caller's expected version, and bumps it by exactly one.
//! - Read paths reject non 0/1 booleans and malformed keys instead of
//!   masking them.
//! - Timeline rows are append-only (enforced by schema triggers as well).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::patent::{
    Assignment, ExaminationRound, FormFlags, Patent, PatentId, Slot, StageFlags, Track, TrackId,
};
use crate::model::timeline::{EventKind, TimelineEvent};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PATENT_SELECT_SQL: &str = "SELECT
    uuid,
    tracking_code,
    title,
    idf_received,
    cs_data_sent,
    cs_data_received,
    withdrawn,
    overall_completed,
    examination_active,
    examination_completion,
    version,
    created_at,
    updated_at
FROM patents";

const EVENT_SELECT_SQL: &str = "SELECT
    uuid,
    patent_uuid,
    kind,
    description,
    actor_name,
    deadline_snapshot,
    created_at
FROM timeline_events";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from patent persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    PatentNotFound(PatentId),
    /// Another patent already uses this normalized tracking code.
    DuplicateTrackingCode(String),
    /// Stored version moved since the caller loaded the aggregate.
    VersionConflict {
        patent_id: PatentId,
        expected_version: u64,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid aggregate.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::PatentNotFound(id) => write!(f, "patent not found: {id}"),
            Self::DuplicateTrackingCode(code) => {
                write!(f, "tracking code already in use: {code}")
            }
            Self::VersionConflict {
                patent_id,
                expected_version,
            } => write!(
                f,
                "patent {patent_id} changed concurrently (expected version {expected_version})"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "patent repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "patent repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "patent repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted patent data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing patents.
#[derive(Debug, Clone, Default)]
pub struct PatentListQuery {
    /// Include withdrawn and overall-completed patents.
    pub include_closed: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Storage collaborator for the patent aggregate and its timeline.
pub trait PatentRepository {
    /// Inserts a new patent together with its creation event.
    fn create_patent(&self, patent: &Patent, event: &TimelineEvent) -> RepoResult<()>;
    fn load_patent(&self, id: PatentId) -> RepoResult<Option<Patent>>;
    /// Exact match on the normalized code.
    fn find_by_tracking_code(&self, tracking_code: &str) -> RepoResult<Option<Patent>>;
    /// Patents ordered by tracking code.
    fn list_patents(&self, query: &PatentListQuery) -> RepoResult<Vec<Patent>>;
    /// Saves the aggregate and appends `event` atomically when the stored
    /// version equals `expected_version`. Returns the new version.
    fn commit_transition(
        &self,
        patent: &Patent,
        expected_version: u64,
        event: &TimelineEvent,
    ) -> RepoResult<u64>;
    /// Appends a free-standing event to an existing patent's timeline.
    fn append_event(&self, event: &TimelineEvent) -> RepoResult<()>;
    /// Events for one patent, oldest first.
    fn list_events(&self, patent_id: PatentId) -> RepoResult<Vec<TimelineEvent>>;
}

/// SQLite-backed patent repository.
pub struct SqlitePatentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePatentRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_patent_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PatentRepository for SqlitePatentRepository<'_> {
    fn create_patent(&self, patent: &Patent, event: &TimelineEvent) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let taken: Option<String> = tx
            .query_row(
                "SELECT uuid FROM patents WHERE tracking_code = ?1;",
                [patent.tracking_code.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(RepoError::DuplicateTrackingCode(patent.tracking_code.clone()));
        }

        tx.execute(
            "INSERT INTO patents (
                uuid,
                tracking_code,
                title,
                idf_received,
                cs_data_sent,
                cs_data_received,
                withdrawn,
                overall_completed,
                examination_active,
                examination_completion,
                version,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
            params![
                patent.id.to_string(),
                patent.tracking_code.as_str(),
                patent.title.as_deref(),
                bool_to_int(patent.idf_received),
                bool_to_int(patent.cs_data_sent),
                bool_to_int(patent.cs_data_received),
                bool_to_int(patent.withdrawn),
                bool_to_int(patent.overall_completed),
                bool_to_int(patent.examination_active),
                bool_to_int(patent.examination_completion),
                version_to_db(patent.version)?,
                patent.created_at,
                patent.updated_at,
            ],
        )?;
        write_children(&tx, patent)?;
        insert_event(&tx, event)?;

        tx.commit()?;
        Ok(())
    }

    fn load_patent(&self, id: PatentId) -> RepoResult<Option<Patent>> {
        read_snapshot(self.conn, |conn| load_aggregate(conn, "uuid", &id.to_string()))
    }

    fn find_by_tracking_code(&self, tracking_code: &str) -> RepoResult<Option<Patent>> {
        read_snapshot(self.conn, |conn| {
            load_aggregate(conn, "tracking_code", tracking_code)
        })
    }

    fn list_patents(&self, query: &PatentListQuery) -> RepoResult<Vec<Patent>> {
        read_snapshot(self.conn, |conn| list_aggregates(conn, query))
    }

    fn commit_transition(
        &self,
        patent: &Patent,
        expected_version: u64,
        event: &TimelineEvent,
    ) -> RepoResult<u64> {
        let next_version = expected_version.checked_add(1).ok_or_else(|| {
            RepoError::InvalidData(format!("version overflow on patent {}", patent.id))
        })?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE patents
             SET
                title = ?1,
                idf_received = ?2,
                cs_data_sent = ?3,
                cs_data_received = ?4,
                withdrawn = ?5,
                overall_completed = ?6,
                examination_active = ?7,
                examination_completion = ?8,
                updated_at = ?9,
                version = ?10
             WHERE uuid = ?11
               AND version = ?12;",
            params![
                patent.title.as_deref(),
                bool_to_int(patent.idf_received),
                bool_to_int(patent.cs_data_sent),
                bool_to_int(patent.cs_data_received),
                bool_to_int(patent.withdrawn),
                bool_to_int(patent.overall_completed),
                bool_to_int(patent.examination_active),
                bool_to_int(patent.examination_completion),
                patent.updated_at,
                version_to_db(next_version)?,
                patent.id.to_string(),
                version_to_db(expected_version)?,
            ],
        )?;

        if changed == 0 {
            return Err(if patent_exists(&tx, patent.id)? {
                RepoError::VersionConflict {
                    patent_id: patent.id,
                    expected_version,
                }
            } else {
                RepoError::PatentNotFound(patent.id)
            });
        }

        write_children(&tx, patent)?;
        insert_event(&tx, event)?;

        tx.commit()?;
        Ok(next_version)
    }

    fn append_event(&self, event: &TimelineEvent) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !patent_exists(&tx, event.patent_id)? {
            return Err(RepoError::PatentNotFound(event.patent_id));
        }
        insert_event(&tx, event)?;
        tx.commit()?;
        Ok(())
    }

    fn list_events(&self, patent_id: PatentId) -> RepoResult<Vec<TimelineEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EVENT_SELECT_SQL}
             WHERE patent_uuid = ?1
             ORDER BY created_at ASC, rowid ASC;"
        ))?;
        let mut rows = stmt.query([patent_id.to_string()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }
}

/// Runs `read` inside one deferred transaction so a patent row and its child
/// rows come from the same database snapshot.
fn read_snapshot<T>(
    conn: &Connection,
    read: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let value = read(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn list_aggregates(conn: &Connection, query: &PatentListQuery) -> RepoResult<Vec<Patent>> {
    let mut sql = format!("{PATENT_SELECT_SQL} WHERE 1 = 1");
    let mut bind_values: Vec<Value> = Vec::new();

    if !query.include_closed {
        sql.push_str(" AND withdrawn = 0 AND overall_completed = 0");
    }

    sql.push_str(" ORDER BY tracking_code ASC");

    if let Some(limit) = query.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
    } else if query.offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(query.offset)));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut patents = Vec::new();
    while let Some(row) = rows.next()? {
        patents.push(parse_patent_row(row)?);
    }
    drop(rows);

    for patent in &mut patents {
        load_children(conn, patent)?;
    }
    Ok(patents)
}

fn load_aggregate(conn: &Connection, column: &str, value: &str) -> RepoResult<Option<Patent>> {
    let mut stmt = conn.prepare(&format!("{PATENT_SELECT_SQL} WHERE {column} = ?1;"))?;
    let mut rows = stmt.query([value])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut patent = parse_patent_row(row)?;
    drop(rows);

    load_children(conn, &mut patent)?;
    Ok(Some(patent))
}

fn load_children(conn: &Connection, patent: &mut Patent) -> RepoResult<()> {
    let patent_uuid = patent.id.to_string();

    let mut ps = None;
    let mut cs = None;
    let mut stmt = conn.prepare(
        "SELECT
            track,
            drafter_name,
            drafter_deadline,
            filer_name,
            filer_deadline,
            drafting_done,
            drafting_under_review,
            filing_done,
            filing_under_review,
            stage_complete
         FROM patent_tracks
         WHERE patent_uuid = ?1;",
    )?;
    let mut rows = stmt.query([patent_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let track_text: String = row.get("track")?;
        let track = Track {
            drafter: parse_assignment(row, "drafter_name", "drafter_deadline")?,
            filer: parse_assignment(row, "filer_name", "filer_deadline")?,
            flags: parse_stage_flags(row, "patent_tracks")?,
            stage_complete: parse_bool(row, "patent_tracks", "stage_complete")?,
            forms: FormFlags::new(),
        };
        match track_text.as_str() {
            "ps" => ps = Some(track),
            "cs" => cs = Some(track),
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid track `{other}` in patent_tracks.track"
                )));
            }
        }
    }
    drop(rows);

    patent.ps = ps.ok_or_else(|| missing_track(patent.id, TrackId::Ps))?;
    patent.cs = cs.ok_or_else(|| missing_track(patent.id, TrackId::Cs))?;

    let mut stmt = conn.prepare(
        "SELECT
            sequence,
            drafter_name,
            drafter_deadline,
            filer_name,
            filer_deadline,
            drafting_done,
            drafting_under_review,
            filing_done,
            filing_under_review,
            complete,
            created_at
         FROM examination_rounds
         WHERE patent_uuid = ?1
         ORDER BY sequence ASC;",
    )?;
    let mut rows = stmt.query([patent_uuid.as_str()])?;
    let mut rounds = Vec::new();
    while let Some(row) = rows.next()? {
        let sequence: i64 = row.get("sequence")?;
        let sequence = u32::try_from(sequence)
            .ok()
            .filter(|value| *value > 0)
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid sequence `{sequence}` in examination_rounds.sequence"
                ))
            })?;
        rounds.push(ExaminationRound {
            sequence,
            drafter: parse_assignment(row, "drafter_name", "drafter_deadline")?,
            filer: parse_assignment(row, "filer_name", "filer_deadline")?,
            flags: parse_stage_flags(row, "examination_rounds")?,
            complete: parse_bool(row, "examination_rounds", "complete")?,
            forms: FormFlags::new(),
            created_at: row.get("created_at")?,
        });
    }
    drop(rows);
    patent.rounds = rounds;

    let mut stmt = conn.prepare(
        "SELECT slot_key, form_name, value
         FROM slot_form_flags
         WHERE patent_uuid = ?1
         ORDER BY slot_key ASC, form_name ASC;",
    )?;
    let mut rows = stmt.query([patent_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let slot_key: String = row.get("slot_key")?;
        let slot = Slot::parse_storage_key(&slot_key).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid slot key `{slot_key}` in slot_form_flags.slot_key"
            ))
        })?;
        let form_name: String = row.get("form_name")?;
        let value = parse_bool(row, "slot_form_flags", "value")?;
        let target = patent.slot_mut(slot).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "form flag `{form_name}` references missing slot `{slot_key}`"
            ))
        })?;
        target.forms.insert(form_name, value);
    }

    Ok(())
}

fn write_children(tx: &Transaction<'_>, patent: &Patent) -> RepoResult<()> {
    let patent_uuid = patent.id.to_string();

    for track_id in [TrackId::Ps, TrackId::Cs] {
        let track = patent.track(track_id);
        tx.execute(
            "INSERT INTO patent_tracks (
                patent_uuid,
                track,
                drafter_name,
                drafter_deadline,
                filer_name,
                filer_deadline,
                drafting_done,
                drafting_under_review,
                filing_done,
                filing_under_review,
                stage_complete
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(patent_uuid, track) DO UPDATE SET
                drafter_name = excluded.drafter_name,
                drafter_deadline = excluded.drafter_deadline,
                filer_name = excluded.filer_name,
                filer_deadline = excluded.filer_deadline,
                drafting_done = excluded.drafting_done,
                drafting_under_review = excluded.drafting_under_review,
                filing_done = excluded.filing_done,
                filing_under_review = excluded.filing_under_review,
                stage_complete = excluded.stage_complete;",
            params![
                patent_uuid.as_str(),
                track_id.as_str(),
                track.drafter.as_ref().map(|a| a.name.as_str()),
                track.drafter.as_ref().and_then(|a| a.deadline),
                track.filer.as_ref().map(|a| a.name.as_str()),
                track.filer.as_ref().and_then(|a| a.deadline),
                bool_to_int(track.flags.drafting_done),
                bool_to_int(track.flags.drafting_under_review),
                bool_to_int(track.flags.filing_done),
                bool_to_int(track.flags.filing_under_review),
                bool_to_int(track.stage_complete),
            ],
        )?;
    }

    for round in &patent.rounds {
        tx.execute(
            "INSERT INTO examination_rounds (
                patent_uuid,
                sequence,
                drafter_name,
                drafter_deadline,
                filer_name,
                filer_deadline,
                drafting_done,
                drafting_under_review,
                filing_done,
                filing_under_review,
                complete,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(patent_uuid, sequence) DO UPDATE SET
                drafter_name = excluded.drafter_name,
                drafter_deadline = excluded.drafter_deadline,
                filer_name = excluded.filer_name,
                filer_deadline = excluded.filer_deadline,
                drafting_done = excluded.drafting_done,
                drafting_under_review = excluded.drafting_under_review,
                filing_done = excluded.filing_done,
                filing_under_review = excluded.filing_under_review,
                complete = excluded.complete;",
            params![
                patent_uuid.as_str(),
                i64::from(round.sequence),
                round.drafter.as_ref().map(|a| a.name.as_str()),
                round.drafter.as_ref().and_then(|a| a.deadline),
                round.filer.as_ref().map(|a| a.name.as_str()),
                round.filer.as_ref().and_then(|a| a.deadline),
                bool_to_int(round.flags.drafting_done),
                bool_to_int(round.flags.drafting_under_review),
                bool_to_int(round.flags.filing_done),
                bool_to_int(round.flags.filing_under_review),
                bool_to_int(round.complete),
                round.created_at,
            ],
        )?;
    }

    tx.execute(
        "DELETE FROM slot_form_flags WHERE patent_uuid = ?1;",
        [patent_uuid.as_str()],
    )?;
    for slot in patent.slots() {
        let Some(view) = patent.slot(slot) else {
            continue;
        };
        let slot_key = slot.storage_key();
        for (form_name, value) in view.forms {
            tx.execute(
                "INSERT INTO slot_form_flags (patent_uuid, slot_key, form_name, value)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    patent_uuid.as_str(),
                    slot_key.as_str(),
                    form_name.as_str(),
                    bool_to_int(*value),
                ],
            )?;
        }
    }

    Ok(())
}

fn insert_event(tx: &Transaction<'_>, event: &TimelineEvent) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO timeline_events (
            uuid,
            patent_uuid,
            kind,
            description,
            actor_name,
            deadline_snapshot,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            event.id.to_string(),
            event.patent_id.to_string(),
            event.kind.as_str(),
            event.description.as_str(),
            event.actor_name.as_deref(),
            event.deadline_snapshot,
            event.created_at,
        ],
    )?;
    Ok(())
}

fn patent_exists(conn: &Connection, id: PatentId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM patents WHERE uuid = ?1);",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_patent_row(row: &Row<'_>) -> RepoResult<Patent> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "patents.uuid")?;

    let version: i64 = row.get("version")?;
    let version = u64::try_from(version).map_err(|_| {
        RepoError::InvalidData(format!("invalid version `{version}` in patents.version"))
    })?;

    Ok(Patent {
        id,
        tracking_code: row.get("tracking_code")?,
        title: row.get("title")?,
        idf_received: parse_bool(row, "patents", "idf_received")?,
        cs_data_sent: parse_bool(row, "patents", "cs_data_sent")?,
        cs_data_received: parse_bool(row, "patents", "cs_data_received")?,
        withdrawn: parse_bool(row, "patents", "withdrawn")?,
        overall_completed: parse_bool(row, "patents", "overall_completed")?,
        examination_active: parse_bool(row, "patents", "examination_active")?,
        examination_completion: parse_bool(row, "patents", "examination_completion")?,
        ps: Track::default(),
        cs: Track::default(),
        rounds: Vec::new(),
        version,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<TimelineEvent> {
    let uuid_text: String = row.get("uuid")?;
    let patent_text: String = row.get("patent_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = EventKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid event kind `{kind_text}` in timeline_events.kind"
        ))
    })?;

    Ok(TimelineEvent {
        id: parse_uuid(&uuid_text, "timeline_events.uuid")?,
        patent_id: parse_uuid(&patent_text, "timeline_events.patent_uuid")?,
        kind,
        description: row.get("description")?,
        actor_name: row.get("actor_name")?,
        deadline_snapshot: row.get("deadline_snapshot")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_stage_flags(row: &Row<'_>, table: &str) -> RepoResult<StageFlags> {
    let flags = StageFlags {
        drafting_done: parse_bool(row, table, "drafting_done")?,
        drafting_under_review: parse_bool(row, table, "drafting_under_review")?,
        filing_done: parse_bool(row, table, "filing_done")?,
        filing_under_review: parse_bool(row, table, "filing_under_review")?,
    };
    if flags.filing_done && !flags.drafting_done {
        return Err(RepoError::InvalidData(format!(
            "filing_done without drafting_done in {table}"
        )));
    }
    Ok(flags)
}

/// A blank or missing name means unassigned; its deadline is ignored.
fn parse_assignment(
    row: &Row<'_>,
    name_column: &str,
    deadline_column: &str,
) -> RepoResult<Option<Assignment>> {
    let name: Option<String> = row.get(name_column)?;
    let deadline: Option<i64> = row.get(deadline_column)?;
    Ok(name
        .filter(|value| !value.trim().is_empty())
        .map(|value| Assignment::new(value, deadline)))
}

fn parse_bool(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {table}.{column}"
        ))),
    }
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn missing_track(patent_id: PatentId, track: TrackId) -> RepoError {
    RepoError::InvalidData(format!(
        "patent {patent_id} has no `{}` row in patent_tracks",
        track.as_str()
    ))
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version `{version}` exceeds storage range")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_patent_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        (
            "patents",
            &[
                "uuid",
                "tracking_code",
                "version",
                "examination_active",
                "examination_completion",
            ],
        ),
        ("patent_tracks", &["patent_uuid", "track", "stage_complete"]),
        ("examination_rounds", &["patent_uuid", "sequence", "complete"]),
        ("slot_form_flags", &["patent_uuid", "slot_key", "form_name"]),
        ("timeline_events", &["uuid", "patent_uuid", "kind", "created_at"]),
    ];

    for (table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(*table));
        }
        for column in *columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: *table,
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
