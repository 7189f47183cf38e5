//! Lifecycle states of a draft.
//!
//! ```text
//! Empty ─select image─▶ ImageSelected ─auto─▶ Analyzing ─┬─▶ Classified
//!                                                         └─▶ ClassificationFailed
//!   (location capture is orthogonal: LocationPending while the query runs)
//! all required fields set ─▶ Ready ─submit─▶ Submitting ─┬─▶ Submitted (draft reset to Empty)
//!                                                         └─▶ SubmitFailed (draft kept)
//! ```
//!
//! The state is derived from the draft data and the controller's flags
//! rather than stored, so it cannot drift from what the draft holds.

use std::fmt;

use super::model::IncidentDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    ImageSelected,
    Analyzing,
    Classified,
    ClassificationFailed,
    LocationPending,
    Ready,
    Submitting,
    SubmitFailed,
}

impl DraftState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftState::Empty => "empty",
            DraftState::ImageSelected => "image_selected",
            DraftState::Analyzing => "analyzing",
            DraftState::Classified => "classified",
            DraftState::ClassificationFailed => "classification_failed",
            DraftState::LocationPending => "location_pending",
            DraftState::Ready => "ready",
            DraftState::Submitting => "submitting",
            DraftState::SubmitFailed => "submit_failed",
        }
    }

    /// Whether the submit action is enabled.
    pub fn can_submit(&self) -> bool {
        matches!(self, DraftState::Ready | DraftState::SubmitFailed)
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of the classification request for the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationStatus {
    #[default]
    Idle,
    Pending,
    Classified,
    Failed,
}

/// Controller flags that, together with the draft, determine the state.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateFlags {
    pub classification: ClassificationStatus,
    pub locating: bool,
    pub submitting: bool,
    pub submit_failed: bool,
}

pub fn derive_state(draft: &IncidentDraft, flags: StateFlags) -> DraftState {
    if flags.submitting {
        return DraftState::Submitting;
    }
    if draft.image().is_none() {
        return DraftState::Empty;
    }
    if draft.is_submittable() {
        return if flags.submit_failed {
            DraftState::SubmitFailed
        } else {
            DraftState::Ready
        };
    }
    if flags.locating {
        return DraftState::LocationPending;
    }
    match flags.classification {
        ClassificationStatus::Pending => DraftState::Analyzing,
        ClassificationStatus::Classified => DraftState::Classified,
        ClassificationStatus::Failed => DraftState::ClassificationFailed,
        ClassificationStatus::Idle => DraftState::ImageSelected,
    }
}
