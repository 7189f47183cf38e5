//! Incident draft lifecycle.
//!
//! - [`model`]: the draft aggregate and its field rules
//! - [`state`]: lifecycle states derived from the draft
//! - [`preview`]: revocable preview references for selected images
//! - [`controller`]: applies user actions and async results to the draft

pub mod controller;
pub mod model;
pub mod preview;
pub mod state;

pub use controller::IncidentCapture;
pub use model::{
    DraftField, IncidentDraft, SelectionSource, GET_LOCATION_LABEL, LOCATION_REQUIRED_HINT,
    UPDATE_LOCATION_LABEL,
};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use state::{derive_state, ClassificationStatus, DraftState, StateFlags};
