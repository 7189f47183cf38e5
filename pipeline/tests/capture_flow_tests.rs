//! Incident capture flow against the HTTP stub services.

#![cfg(feature = "stub-server")]

mod support;

use std::sync::Arc;
use std::time::Duration;

use ecoguard_pipeline::config::IngestionFormat;
use ecoguard_pipeline::draft::{DraftState, IncidentCapture};
use ecoguard_pipeline::error::ErrorKind;
use ecoguard_pipeline::geolocation::{DeniedLocator, FixedLocator};
use ecoguard_pipeline::http::{serve_stub, StubServer};
use ecoguard_pipeline::models::{ImageBlob, IncidentCategory, Prediction};
use ecoguard_pipeline::remote::{HttpGateway, LocalFailure, LocalServices};

async fn capture_over_stub(
    local: &LocalServices,
    format: IngestionFormat,
) -> (StubServer, IncidentCapture) {
    support::init_tracing();
    let server = serve_stub(local.clone()).await.unwrap();
    let mut config = server.config();
    config.ingestion.format = format;
    let gateway = Arc::new(HttpGateway::new(&config).unwrap());
    (server, IncidentCapture::with_services(gateway, &config))
}

#[tokio::test]
async fn test_roadkill_report_end_to_end() {
    let local = LocalServices::new();
    let photo = support::deer_photo();
    local.script_classification(&photo, support::deer_predictions(), Duration::from_millis(20));
    let (_server, capture) = capture_over_stub(&local, IngestionFormat::Multipart).await;

    capture.select_image(photo.clone()).unwrap();
    assert!(capture.is_analyzing());
    capture.classification_settled().await;
    tokio::task::yield_now().await;

    let draft = capture.snapshot();
    assert_eq!(draft.selected_animal_type(), "deer");
    assert_eq!(draft.prediction_summary(), vec!["deer 87.0%", "elk 5.0%"]);
    assert_eq!(capture.state(), DraftState::Classified);

    let position = capture
        .capture_location(&FixedLocator::new(support::nyc()))
        .await
        .unwrap();
    assert_eq!(position, support::nyc());
    assert_eq!(capture.snapshot().location_display().as_deref(), Some("40.7100, -74.0000"));

    capture.select_category(IncidentCategory::Roadkill).unwrap();
    assert_eq!(capture.state(), DraftState::Ready);
    let report_id = capture.snapshot().report_id();

    capture.submit().await.unwrap();
    assert_eq!(capture.state(), DraftState::Empty);
    assert_eq!(capture.previews().live_count(), 0);

    let reports = local.submitted_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].report_id, report_id);
    assert_eq!(reports[0].image_ref, photo.image_ref());
    assert_eq!(reports[0].top_prediction, Some(Prediction::new("deer", 0.87)));
}

#[tokio::test]
async fn test_classification_race_over_http() {
    let local = LocalServices::new();
    let a = ImageBlob::new(b"first photo".to_vec()).with_file_name("a.jpg");
    let b = ImageBlob::new(b"second photo".to_vec()).with_file_name("b.png");
    local.script_classification(&a, vec![Prediction::new("elk", 0.8)], Duration::from_millis(200));
    local.script_classification(&b, vec![Prediction::new("raccoon", 0.7)], Duration::from_millis(10));
    let (_server, capture) = capture_over_stub(&local, IngestionFormat::JsonReference).await;

    capture.select_image(a).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    capture.select_image(b).unwrap();
    capture.classification_settled().await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let draft = capture.snapshot();
    let names: Vec<_> = draft.predictions().iter().map(|p| p.class_name.as_str()).collect();
    assert_eq!(names, vec!["raccoon"]);
    assert_eq!(draft.selected_animal_type(), "raccoon");
    assert_eq!(draft.image().unwrap().file_name(), Some("b.png"));
}

#[tokio::test]
async fn test_classification_outage_does_not_block_submission() {
    let local = LocalServices::new();
    local.set_classification_failure(Some(LocalFailure::Status(503)));
    let (_server, capture) = capture_over_stub(&local, IngestionFormat::JsonInline).await;

    capture.select_image(support::deer_photo()).unwrap();
    capture.classification_settled().await;
    tokio::task::yield_now().await;
    assert_eq!(capture.state(), DraftState::ClassificationFailed);

    capture.select_animal_type("small_mammal").unwrap();
    capture.capture_location(&FixedLocator::new(support::nyc())).await.unwrap();
    capture.select_category(IncidentCategory::NearMiss).unwrap();
    capture.submit().await.unwrap();

    let reports = local.submitted_reports();
    assert_eq!(reports[0].animal_type.as_deref(), Some("small_mammal"));
    assert_eq!(reports[0].top_prediction, None);
    assert!(reports[0].image_base64.is_some());
}

#[tokio::test]
async fn test_submit_failure_then_retry_over_http() {
    let local = LocalServices::new();
    local.set_ingestion_failure(Some(LocalFailure::Status(502)));
    let (_server, capture) = capture_over_stub(&local, IngestionFormat::JsonReference).await;

    capture.select_image(support::deer_photo()).unwrap();
    capture.capture_location(&FixedLocator::new(support::nyc())).await.unwrap();
    capture.select_category(IncidentCategory::Roadkill).unwrap();
    let report_id = capture.snapshot().report_id();

    let err = capture.submit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(capture.state(), DraftState::SubmitFailed);
    assert!(capture.snapshot().image().is_some());

    local.set_ingestion_failure(None);
    capture.submit().await.unwrap();
    assert_eq!(local.submitted_reports()[0].report_id, report_id);
}

#[tokio::test]
async fn test_denied_location_then_validation_message() {
    let local = LocalServices::new();
    let (_server, capture) = capture_over_stub(&local, IngestionFormat::JsonReference).await;

    capture.select_image(support::deer_photo()).unwrap();
    capture.select_category(IncidentCategory::Roadkill).unwrap();

    let err = capture.capture_location(&DeniedLocator).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(err.message(), "location unavailable, request denied");

    let err = capture.submit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Cannot submit report: missing location");
    assert_eq!(local.ingestion_calls(), 0);
}
