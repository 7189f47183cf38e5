//! Report submission.
//!
//! Packages a completed draft and sends it to the ingestion service in a
//! single request. Incomplete drafts are rejected before any network I/O.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::IngestionPayload;
use crate::draft::IncidentDraft;
use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::remote::IngestionService;

/// Acknowledgement of an accepted report.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub report_id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

pub struct ReportSubmitter {
    service: Arc<dyn IngestionService>,
    timeout: Duration,
}

impl ReportSubmitter {
    pub fn new(service: Arc<dyn IngestionService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Check the submittability invariant.
    ///
    /// # Errors
    /// `ValidationError` naming every missing field, e.g.
    /// "Cannot submit report: missing location, incident type".
    pub fn validate(draft: &IncidentDraft) -> PipelineResult<()> {
        let missing = draft.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        let fields: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        Err(PipelineError::validation_with_context(
            format!("Cannot submit report: missing {}", fields.join(", ")),
            ErrorContext::new("submit_report").with_details(format!("report_id={}", draft.report_id())),
        ))
    }

    /// Build the wire payload for a submittable draft.
    pub fn build_payload(
        draft: &IncidentDraft,
        reported_at: DateTime<Utc>,
    ) -> PipelineResult<IngestionPayload> {
        Self::validate(draft)?;
        let (Some(image), Some(location), Some(category)) =
            (draft.image(), draft.location(), draft.incident_category())
        else {
            return Err(PipelineError::validation("Cannot submit report: incomplete draft"));
        };

        let animal_type = match draft.selected_animal_type().trim() {
            "" => None,
            chosen => Some(chosen.to_string()),
        };

        Ok(IngestionPayload {
            report_id: draft.report_id(),
            image_ref: image.image_ref(),
            image_file_name: image.file_name().map(str::to_string),
            animal_type,
            category,
            location,
            top_prediction: draft.top_prediction().cloned(),
            reported_at,
            image_base64: None,
        })
    }

    /// Submit `draft`. One request, one outcome.
    pub async fn submit(&self, draft: &IncidentDraft) -> PipelineResult<SubmissionReceipt> {
        let payload = Self::build_payload(draft, Utc::now())?;
        let Some(image) = draft.image() else {
            return Err(PipelineError::validation("Cannot submit report: missing photo"));
        };

        let result = tokio::time::timeout(self.timeout, self.service.submit_report(&payload, image))
            .await
            .map_err(|_| PipelineError::timeout("submit_report", self.timeout.as_millis() as u64))
            .and_then(|inner| inner);

        match result {
            Ok(()) => {
                info!(report_id = %payload.report_id, category = %payload.category, "report submitted");
                Ok(SubmissionReceipt {
                    report_id: payload.report_id,
                    submitted_at: payload.reported_at,
                })
            }
            Err(err) => {
                warn!(report_id = %payload.report_id, error = %err, "report submission failed");
                Err(err)
            }
        }
    }
}
