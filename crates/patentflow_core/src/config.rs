//! Engine configuration.
//!
//! # Responsibility
//! - Hold product-policy switches and concurrency limits for the workflow
//!   service.
//!
//! # Invariants
//! - `Default` values are the safe production defaults.
//! - Missing fields in deserialized input fall back to defaults.

use serde::Deserialize;

const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Tunables for the workflow engine and service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether an active examination with zero rounds counts as complete.
    ///
    /// Defaults to `false`: an opened-but-empty examination blocks overall
    /// completion until a round is opened and finished.
    pub empty_examination_complete: bool,
    /// How many times a transition is re-evaluated after losing an
    /// optimistic-concurrency race before the conflict is surfaced.
    pub max_conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            empty_examination_complete: false,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}
