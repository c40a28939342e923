use serde::{Deserialize, Serialize};

/// Availability status of a projected object or resolution result.
///
/// None of these states is terminal: a `Loaded` object flips back to
/// `Loading` when the store reports it stale, and an `Unavailable` object
/// becomes `Loaded` if it later arrives over sync. Consumers read this as a
/// plain value; transitions happen only inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Fetch or sync in flight; no value yet.
    Loading,
    /// Value available and current as of the last known consistent state.
    Loaded,
    /// Fetch failed, timed out, or the target does not exist / is inaccessible.
    Unavailable,
}

impl LoadState {
    /// True only for [`LoadState::Loaded`].
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }
}
