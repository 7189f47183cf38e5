//! Capture flow controller.
//!
//! Owns the single [`IncidentDraft`] of a report flow and applies user
//! actions and completed async results to it. Results are only applied when
//! they still belong to the draft that requested them:
//!
//! - every image selection bumps a generation counter; a classification
//!   result carrying an older generation is discarded
//! - every reset bumps an epoch counter; location and submission results
//!   carrying an older epoch are discarded
//! - teardown cancels a token that every in-flight call is raced against
//!
//! The slot mutex is never held across an `.await`, and task handles and
//! preview handles are released after the lock is dropped.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::model::IncidentDraft;
use super::preview::{PreviewHandle, PreviewRegistry};
use super::state::{derive_state, ClassificationStatus, DraftState, StateFlags};
use crate::config::PipelineConfig;
use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::geolocation::GeoLocator;
use crate::models::{GeoPoint, ImageBlob, IncidentCategory};
use crate::remote::{ClassificationService, IngestionService};
use crate::services::{
    ClassificationClient, ClassificationOutcome, ReportSubmitter, SubmissionReceipt,
};

struct CaptureSlot {
    draft: IncidentDraft,
    preview: Option<PreviewHandle>,
    generation: u64,
    epoch: u64,
    flags: StateFlags,
    task: Option<JoinHandle<()>>,
    torn_down: bool,
}

/// Resources detached from the slot, released once the lock is gone.
struct Released {
    task: Option<JoinHandle<()>>,
    preview: Option<PreviewHandle>,
}

impl Released {
    fn release(self) {
        if let Some(task) = self.task {
            task.abort();
        }
        drop(self.preview);
    }
}

struct Shared {
    slot: Mutex<CaptureSlot>,
    classifier: ClassificationClient,
    submitter: ReportSubmitter,
    previews: PreviewRegistry,
    analyzing: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl Shared {
    /// Replace the draft with a fresh one. Caller holds the slot lock.
    fn reset_locked(&self, slot: &mut CaptureSlot) -> Released {
        slot.generation += 1;
        slot.epoch += 1;
        slot.draft = IncidentDraft::new();
        slot.flags = StateFlags::default();
        self.analyzing.send_replace(false);
        Released {
            task: slot.task.take(),
            preview: slot.preview.take(),
        }
    }
}

/// Drives one incident report from image selection to submission.
///
/// Dropping the controller tears it down.
pub struct IncidentCapture {
    shared: Arc<Shared>,
}

impl IncidentCapture {
    pub fn new(classifier: ClassificationClient, submitter: ReportSubmitter) -> Self {
        let (analyzing, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(CaptureSlot {
                    draft: IncidentDraft::new(),
                    preview: None,
                    generation: 0,
                    epoch: 0,
                    flags: StateFlags::default(),
                    task: None,
                    torn_down: false,
                }),
                classifier,
                submitter,
                previews: PreviewRegistry::new(),
                analyzing,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Build a controller over one backend, with timeouts from `config`.
    pub fn with_services<S>(services: Arc<S>, config: &PipelineConfig) -> Self
    where
        S: ClassificationService + IngestionService + 'static,
    {
        let classification: Arc<dyn ClassificationService> = services.clone();
        let ingestion: Arc<dyn IngestionService> = services;
        Self::new(
            ClassificationClient::new(classification, config.classification_timeout()),
            ReportSubmitter::new(ingestion, config.submission_timeout()),
        )
    }

    // ==================== Observation ====================

    /// Copy of the current draft.
    pub fn snapshot(&self) -> IncidentDraft {
        self.shared.slot.lock().draft.clone()
    }

    pub fn state(&self) -> DraftState {
        let slot = self.shared.slot.lock();
        derive_state(&slot.draft, slot.flags)
    }

    pub fn preview_url(&self) -> Option<String> {
        let slot = self.shared.slot.lock();
        slot.preview.as_ref().map(|p| p.url().to_string())
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.shared.previews
    }

    /// Observable "analyzing" flag; `true` while a classification for the
    /// current image is pending.
    pub fn analyzing(&self) -> watch::Receiver<bool> {
        self.shared.analyzing.subscribe()
    }

    pub fn is_analyzing(&self) -> bool {
        *self.shared.analyzing.borrow()
    }

    /// Wait until no classification is pending.
    pub async fn classification_settled(&self) {
        let mut analyzing = self.analyzing();
        let _ = analyzing.wait_for(|busy| !*busy).await;
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.slot.lock().torn_down
    }

    // ==================== User actions ====================

    /// Attach an image, derive its preview and start classifying it.
    ///
    /// Returns the preview URL. The previous preview is revoked and any
    /// classification still running for the previous image is superseded.
    /// Must be called from within a Tokio runtime.
    pub fn select_image(&self, image: ImageBlob) -> PipelineResult<String> {
        let runtime = Handle::try_current().map_err(|_| {
            PipelineError::configuration("select_image must run inside a Tokio runtime")
        })?;

        let (generation, url, released) = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return Err(closed("select_image"));
            }
            slot.generation += 1;
            let preview = self.shared.previews.create(&image);
            let url = preview.url().to_string();
            let released = Released {
                task: slot.task.take(),
                preview: slot.preview.replace(preview),
            };
            slot.draft.set_image(image.clone());
            slot.flags.classification = ClassificationStatus::Pending;
            slot.flags.submit_failed = false;
            self.shared.analyzing.send_replace(true);
            (slot.generation, url, released)
        };
        released.release();

        debug!(generation, bytes = image.len(), "image selected, classifying");
        let task = runtime.spawn(run_classification(Arc::clone(&self.shared), image, generation));

        let stale = {
            let mut slot = self.shared.slot.lock();
            if slot.generation == generation && !slot.torn_down {
                slot.task = Some(task);
                None
            } else {
                Some(task)
            }
        };
        if let Some(task) = stale {
            task.abort();
        }
        Ok(url)
    }

    /// Manual animal type pick. Never overwritten by classification.
    pub fn select_animal_type(&self, animal_type: impl Into<String>) -> PipelineResult<()> {
        let mut slot = self.shared.slot.lock();
        if slot.torn_down {
            return Err(closed("select_animal_type"));
        }
        slot.draft.select_animal_type(animal_type);
        Ok(())
    }

    pub fn select_category(&self, category: IncidentCategory) -> PipelineResult<()> {
        let mut slot = self.shared.slot.lock();
        if slot.torn_down {
            return Err(closed("select_category"));
        }
        slot.draft.set_incident_category(category);
        slot.flags.submit_failed = false;
        Ok(())
    }

    /// Ask `locator` for the device position once and store it.
    ///
    /// # Errors
    /// * `PermissionError` when the request is denied; the draft is left as it was
    /// * `ValidationError` when no image is selected yet, or when the draft
    ///   was reset or torn down before the position arrived
    pub async fn capture_location(&self, locator: &dyn GeoLocator) -> PipelineResult<GeoPoint> {
        let epoch = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return Err(closed("capture_location"));
            }
            if slot.draft.image().is_none() {
                return Err(PipelineError::validation_with_context(
                    "Select a photo before capturing location",
                    ErrorContext::new("capture_location"),
                ));
            }
            slot.flags.locating = true;
            slot.epoch
        };
        let _locating = FlagGuard::new(&self.shared, epoch, |flags: &mut StateFlags| flags.locating = false);

        let result = tokio::select! {
            _ = self.shared.cancel.cancelled() => return Err(closed("capture_location")),
            result = locator.current_position() => result,
        };
        let position = match result {
            Ok(position) => position,
            Err(err) => {
                warn!(error = %err, "location capture failed");
                return Err(err);
            }
        };

        let mut slot = self.shared.slot.lock();
        if slot.torn_down || slot.epoch != epoch {
            return Err(discarded("capture_location"));
        }
        slot.draft.set_location(position);
        slot.flags.submit_failed = false;
        debug!(lat = position.lat(), lng = position.lng(), "location captured");
        Ok(position)
    }

    /// Submit the draft.
    ///
    /// On success the draft is reset to empty. On failure it is kept
    /// unchanged and the state becomes [`DraftState::SubmitFailed`], so the
    /// same report (same report id) can be retried.
    pub async fn submit(&self) -> PipelineResult<SubmissionReceipt> {
        let (draft, epoch) = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return Err(closed("submit"));
            }
            if slot.flags.submitting {
                return Err(PipelineError::validation_with_context(
                    "A submission is already in progress",
                    ErrorContext::new("submit_report"),
                ));
            }
            ReportSubmitter::validate(&slot.draft)?;
            slot.flags.submitting = true;
            (slot.draft.clone(), slot.epoch)
        };
        let _submitting = FlagGuard::new(&self.shared, epoch, |flags: &mut StateFlags| flags.submitting = false);

        let result = tokio::select! {
            _ = self.shared.cancel.cancelled() => return Err(closed("submit")),
            result = self.shared.submitter.submit(&draft) => result,
        };

        let released = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return Err(closed("submit"));
            }
            if slot.epoch != epoch {
                return result;
            }
            match &result {
                Ok(receipt) => {
                    info!(report_id = %receipt.report_id, "draft submitted, resetting");
                    Some(self.shared.reset_locked(&mut slot))
                }
                Err(_) => {
                    slot.flags.submit_failed = true;
                    None
                }
            }
        };
        if let Some(released) = released {
            released.release();
        }
        result
    }

    /// Discard the draft and start over with an empty one.
    pub fn reset(&self) {
        let released = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return;
            }
            self.shared.reset_locked(&mut slot)
        };
        released.release();
    }

    /// Leave the report flow: cancel in-flight work and release the draft.
    /// Later results are ignored and further actions are rejected.
    pub fn teardown(&self) {
        self.shared.cancel.cancel();
        let released = {
            let mut slot = self.shared.slot.lock();
            if slot.torn_down {
                return;
            }
            slot.torn_down = true;
            self.shared.reset_locked(&mut slot)
        };
        released.release();
        debug!("capture flow torn down");
    }
}

impl Drop for IncidentCapture {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_classification(shared: Arc<Shared>, image: ImageBlob, generation: u64) {
    let _analyzing = AnalyzingGuard {
        shared: Arc::clone(&shared),
        generation,
    };
    let outcome = shared.classifier.classify_outcome(&image).await;

    let mut slot = shared.slot.lock();
    if slot.torn_down || slot.generation != generation {
        debug!(generation, current = slot.generation, "discarding stale classification");
        return;
    }
    match outcome {
        ClassificationOutcome::Classified(predictions) => {
            let count = predictions.len();
            let auto = slot.draft.apply_predictions(predictions);
            slot.flags.classification = ClassificationStatus::Classified;
            debug!(generation, count, auto_selected = auto, "classification applied");
        }
        ClassificationOutcome::Failed(_) => {
            slot.flags.classification = ClassificationStatus::Failed;
        }
    }
    slot.task = None;
}

/// Clears the analyzing flag when the classification task ends, however it
/// ends, unless a newer image has taken over the flag.
struct AnalyzingGuard {
    shared: Arc<Shared>,
    generation: u64,
}

impl Drop for AnalyzingGuard {
    fn drop(&mut self) {
        let slot = self.shared.slot.lock();
        if slot.generation == self.generation {
            self.shared.analyzing.send_replace(false);
        }
    }
}

/// Runs `clear` on the slot flags when dropped, unless the draft was reset.
struct FlagGuard<'a, F: Fn(&mut StateFlags)> {
    shared: &'a Shared,
    epoch: u64,
    clear: F,
}

impl<'a, F: Fn(&mut StateFlags)> FlagGuard<'a, F> {
    fn new(shared: &'a Shared, epoch: u64, clear: F) -> Self {
        Self {
            shared,
            epoch,
            clear,
        }
    }
}

impl<F: Fn(&mut StateFlags)> Drop for FlagGuard<'_, F> {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        if slot.epoch == self.epoch {
            (self.clear)(&mut slot.flags);
        }
    }
}

fn closed(operation: &str) -> PipelineError {
    PipelineError::validation_with_context(
        "Incident capture has been closed",
        ErrorContext::new(operation),
    )
}

fn discarded(operation: &str) -> PipelineError {
    PipelineError::validation_with_context(
        "Draft was reset before the result arrived",
        ErrorContext::new(operation),
    )
}
