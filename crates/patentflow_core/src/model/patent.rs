//! Patent aggregate model.
//!
//! # Responsibility
//! - Define the canonical patent record, its two specification tracks and
//!   its further-examination rounds.
//! - Provide slot addressing so tracks and rounds share one flag vocabulary.
//!
//! # Invariants
//! - `id` is stable and never reused for another patent.
//! - `tracking_code` is stored in normalized form (see [`normalize_tracking_code`]).
//! - Round `sequence` values are dense and start at 1.
//! - Derived flags (`stage_complete`, round `complete`,
//!   `examination_completion`) are only written by the completion aggregator.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static TRACKING_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9._/-]{0,63}$").expect("valid tracking code regex")
});

/// Stable identifier for a patent record.
pub type PatentId = Uuid;

/// Auxiliary boolean filing-form flags keyed by form name.
pub type FormFlags = BTreeMap<String, bool>;

/// One of the two parallel specification pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackId {
    /// Provisional Specification.
    Ps,
    /// Complete Specification.
    Cs,
}

impl TrackId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ps => "ps",
            Self::Cs => "cs",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ps => "PS",
            Self::Cs => "CS",
        }
    }
}

/// Addressable place carrying the drafting/filing flag set.
///
/// Rounds are addressed by their per-patent sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Track(TrackId),
    Round(u32),
}

impl Slot {
    pub const PS: Slot = Slot::Track(TrackId::Ps);
    pub const CS: Slot = Slot::Track(TrackId::Cs);

    /// Pipeline used for event naming.
    pub fn pipeline(self) -> Pipeline {
        match self {
            Self::Track(TrackId::Ps) => Pipeline::Ps,
            Self::Track(TrackId::Cs) => Pipeline::Cs,
            Self::Round(_) => Pipeline::Fer,
        }
    }

    /// Stable storage key (`ps`, `cs`, `fer:<sequence>`).
    pub fn storage_key(self) -> String {
        match self {
            Self::Track(track) => track.as_str().to_string(),
            Self::Round(sequence) => format!("fer:{sequence}"),
        }
    }

    /// Parses a storage key produced by [`Slot::storage_key`].
    pub fn parse_storage_key(value: &str) -> Option<Self> {
        match value {
            "ps" => Some(Self::PS),
            "cs" => Some(Self::CS),
            other => other
                .strip_prefix("fer:")
                .and_then(|sequence| sequence.parse::<u32>().ok())
                .filter(|sequence| *sequence > 0)
                .map(Self::Round),
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Track(track) => write!(f, "{}", track.label()),
            Self::Round(sequence) => write!(f, "FER #{sequence}"),
        }
    }
}

/// Event-naming family of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    Ps,
    Cs,
    Fer,
}

impl Pipeline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ps => "ps",
            Self::Cs => "cs",
            Self::Fer => "fer",
        }
    }
}

/// Which half of a slot a review or assignment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Draft,
    File,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::File => "file",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Draft => "Drafting",
            Self::File => "Filing",
        }
    }
}

/// Assignee plus informational deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Employee display name used for actor matching.
    pub name: String,
    /// Unix epoch milliseconds. Informational only.
    pub deadline: Option<i64>,
}

impl Assignment {
    pub fn new(name: impl Into<String>, deadline: Option<i64>) -> Self {
        Self {
            name: name.into(),
            deadline,
        }
    }

    /// Returns whether `actor_name` designates this assignee.
    ///
    /// Matching trims surrounding whitespace and is case-sensitive.
    pub fn is_held_by(&self, actor_name: &str) -> bool {
        let actor_name = actor_name.trim();
        !actor_name.is_empty() && self.name.trim() == actor_name
    }
}

/// The four workflow flags shared by tracks and rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageFlags {
    pub drafting_done: bool,
    pub drafting_under_review: bool,
    pub filing_done: bool,
    pub filing_under_review: bool,
}

impl StageFlags {
    /// Returns `(done, under_review)` for one stage kind.
    pub fn stage(&self, kind: StageKind) -> (bool, bool) {
        match kind {
            StageKind::Draft => (self.drafting_done, self.drafting_under_review),
            StageKind::File => (self.filing_done, self.filing_under_review),
        }
    }

    /// Clears all flags back to the not-started state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One specification pipeline on a patent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub drafter: Option<Assignment>,
    pub filer: Option<Assignment>,
    pub flags: StageFlags,
    /// Derived roll-up; see `engine::completion`.
    pub stage_complete: bool,
    pub forms: FormFlags,
}

/// One numbered further-examination sub-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationRound {
    /// Dense per-patent number starting at 1.
    pub sequence: u32,
    pub drafter: Option<Assignment>,
    pub filer: Option<Assignment>,
    pub flags: StageFlags,
    /// Derived roll-up; see `engine::completion`.
    pub complete: bool,
    pub forms: FormFlags,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl ExaminationRound {
    pub fn new(sequence: u32, created_at: i64) -> Self {
        Self {
            sequence,
            drafter: None,
            filer: None,
            flags: StageFlags::default(),
            complete: false,
            forms: FormFlags::new(),
            created_at,
        }
    }
}

/// Patent-level gate that unlocks drafting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    IdfReceived,
    CsDataSent,
    CsDataReceived,
}

impl Gate {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdfReceived => "idf_received",
            Self::CsDataSent => "cs_data_sent",
            Self::CsDataReceived => "cs_data_received",
        }
    }
}

/// Root workflow record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patent {
    pub id: PatentId,
    /// Human-assigned unique code, normalized.
    pub tracking_code: String,
    pub title: Option<String>,
    pub idf_received: bool,
    pub cs_data_sent: bool,
    pub cs_data_received: bool,
    pub withdrawn: bool,
    pub overall_completed: bool,
    pub examination_active: bool,
    /// Derived roll-up; see `engine::completion`.
    pub examination_completion: bool,
    pub ps: Track,
    pub cs: Track,
    /// Ordered by ascending `sequence`.
    pub rounds: Vec<ExaminationRound>,
    /// Optimistic concurrency counter, bumped by every committed transition.
    pub version: u64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Patent {
    /// Creates a patent in the initial state with a generated stable ID.
    ///
    /// The tracking code is stored as given; callers validate it with
    /// [`normalize_tracking_code`] first.
    pub fn new(tracking_code: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tracking_code: tracking_code.into(),
            title: None,
            idf_received: false,
            cs_data_sent: false,
            cs_data_received: false,
            withdrawn: false,
            overall_completed: false,
            examination_active: false,
            examination_completion: true,
            ps: Track::default(),
            cs: Track::default(),
            rounds: Vec::new(),
            version: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn track(&self, track: TrackId) -> &Track {
        match track {
            TrackId::Ps => &self.ps,
            TrackId::Cs => &self.cs,
        }
    }

    pub fn track_mut(&mut self, track: TrackId) -> &mut Track {
        match track {
            TrackId::Ps => &mut self.ps,
            TrackId::Cs => &mut self.cs,
        }
    }

    pub fn round(&self, sequence: u32) -> Option<&ExaminationRound> {
        self.rounds.iter().find(|round| round.sequence == sequence)
    }

    pub fn round_mut(&mut self, sequence: u32) -> Option<&mut ExaminationRound> {
        self.rounds
            .iter_mut()
            .find(|round| round.sequence == sequence)
    }

    /// Next dense round sequence number.
    pub fn next_round_sequence(&self) -> u32 {
        self.rounds
            .iter()
            .map(|round| round.sequence)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn gate(&self, gate: Gate) -> bool {
        match gate {
            Gate::IdfReceived => self.idf_received,
            Gate::CsDataSent => self.cs_data_sent,
            Gate::CsDataReceived => self.cs_data_received,
        }
    }

    pub fn set_gate(&mut self, gate: Gate, value: bool) {
        match gate {
            Gate::IdfReceived => self.idf_received = value,
            Gate::CsDataSent => self.cs_data_sent = value,
            Gate::CsDataReceived => self.cs_data_received = value,
        }
    }

    /// Returns whether the patent still accepts workflow transitions.
    pub fn is_open(&self) -> bool {
        !self.withdrawn && !self.overall_completed
    }

    /// All slots currently present, in pipeline order.
    pub fn slots(&self) -> Vec<Slot> {
        let mut slots = vec![Slot::PS, Slot::CS];
        slots.extend(self.rounds.iter().map(|round| Slot::Round(round.sequence)));
        slots
    }

    /// Read view over one slot, `None` for unknown rounds.
    pub fn slot(&self, slot: Slot) -> Option<SlotView<'_>> {
        match slot {
            Slot::Track(track) => {
                let track = self.track(track);
                Some(SlotView {
                    drafter: track.drafter.as_ref(),
                    filer: track.filer.as_ref(),
                    flags: track.flags,
                    forms: &track.forms,
                })
            }
            Slot::Round(sequence) => self.round(sequence).map(|round| SlotView {
                drafter: round.drafter.as_ref(),
                filer: round.filer.as_ref(),
                flags: round.flags,
                forms: &round.forms,
            }),
        }
    }

    /// Mutable view over one slot, `None` for unknown rounds.
    pub fn slot_mut(&mut self, slot: Slot) -> Option<SlotViewMut<'_>> {
        match slot {
            Slot::Track(track) => {
                let track = self.track_mut(track);
                Some(SlotViewMut {
                    drafter: &mut track.drafter,
                    filer: &mut track.filer,
                    flags: &mut track.flags,
                    forms: &mut track.forms,
                })
            }
            Slot::Round(sequence) => self.round_mut(sequence).map(|round| SlotViewMut {
                drafter: &mut round.drafter,
                filer: &mut round.filer,
                flags: &mut round.flags,
                forms: &mut round.forms,
            }),
        }
    }
}

/// Borrowed read view of a track or round.
#[derive(Debug, Clone, Copy)]
pub struct SlotView<'a> {
    pub drafter: Option<&'a Assignment>,
    pub filer: Option<&'a Assignment>,
    pub flags: StageFlags,
    pub forms: &'a FormFlags,
}

impl SlotView<'_> {
    pub fn assignee(&self, kind: StageKind) -> Option<&Assignment> {
        match kind {
            StageKind::Draft => self.drafter,
            StageKind::File => self.filer,
        }
    }
}

/// Borrowed mutable view of a track or round.
#[derive(Debug)]
pub struct SlotViewMut<'a> {
    pub drafter: &'a mut Option<Assignment>,
    pub filer: &'a mut Option<Assignment>,
    pub flags: &'a mut StageFlags,
    pub forms: &'a mut FormFlags,
}

/// Tracking-code validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingCodeError {
    Empty,
    InvalidFormat(String),
}

impl Display for TrackingCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "tracking code must not be blank"),
            Self::InvalidFormat(value) => write!(
                f,
                "tracking code `{value}` must start with a letter or digit and use only A-Z, 0-9, `.`, `_`, `/`, `-` (max 64 chars)"
            ),
        }
    }
}

impl Error for TrackingCodeError {}

/// Normalizes a human-entered tracking code: trims and upper-cases it, then
/// checks the allowed character set.
pub fn normalize_tracking_code(value: &str) -> Result<String, TrackingCodeError> {
    let normalized = value.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(TrackingCodeError::Empty);
    }
    if !TRACKING_CODE_RE.is_match(&normalized) {
        return Err(TrackingCodeError::InvalidFormat(normalized));
    }
    Ok(normalized)
}
