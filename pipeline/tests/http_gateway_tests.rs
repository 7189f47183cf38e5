//! HttpGateway against the in-process stub services.

#![cfg(feature = "stub-server")]

mod support;

use std::time::Duration;

use ecoguard_pipeline::api::{ClassificationResponse, RiskQuery};
use ecoguard_pipeline::config::{IngestionFormat, PipelineConfig};
use ecoguard_pipeline::error::ErrorKind;
use ecoguard_pipeline::http::serve_stub;
use ecoguard_pipeline::models::{ImageBlob, IncidentCategory};
use ecoguard_pipeline::remote::{
    ClassificationService, HttpGateway, LocalFailure, LocalServices, RiskService,
};
use ecoguard_pipeline::draft::IncidentDraft;
use ecoguard_pipeline::services::ReportSubmitter;

fn submittable_draft() -> IncidentDraft {
    let mut draft = IncidentDraft::new();
    draft.set_image(support::deer_photo());
    draft.apply_predictions(support::deer_predictions());
    draft.set_location(support::nyc());
    draft.set_incident_category(IncidentCategory::Roadkill);
    draft
}

#[tokio::test]
async fn test_health_check() {
    support::init_tracing();
    let local = LocalServices::new();
    let server = serve_stub(local.clone()).await.unwrap();
    let gateway = HttpGateway::new(&server.config()).unwrap();

    assert_eq!(gateway.health_check().await.unwrap().status, "ok");

    local.set_healthy(false);
    let err = gateway.health_check().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.context().status, Some(503));
}

#[tokio::test]
async fn test_risk_query_string_and_body() {
    support::init_tracing();
    let local = LocalServices::new();
    local.set_risk_points(support::manhattan_risk_points());
    let server = serve_stub(local.clone()).await.unwrap();
    let gateway = HttpGateway::new(&server.config()).unwrap();

    let points = gateway
        .fetch_risk_points(RiskQuery { lat: 40.7128, lng: -74.006 })
        .await
        .unwrap();
    assert_eq!(points, support::manhattan_risk_points());
    assert_eq!(
        local.risk_queries(),
        vec![RiskQuery { lat: 40.7128, lng: -74.006 }]
    );
}

#[tokio::test]
async fn test_risk_failures_map_to_taxonomy() {
    support::init_tracing();
    let local = LocalServices::new();
    let server = serve_stub(local.clone()).await.unwrap();
    let gateway = HttpGateway::new(&server.config()).unwrap();
    let query = RiskQuery { lat: 0.0, lng: 0.0 };

    local.set_risk_failure(Some(LocalFailure::Status(502)));
    let err = gateway.fetch_risk_points(query).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.context().status, Some(502));
    assert!(err.is_retryable());

    local.set_risk_failure(Some(LocalFailure::Malformed));
    let err = gateway.fetch_risk_points(query).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert!(err.message().starts_with("Malformed response"));
}

#[tokio::test]
async fn test_transport_error_when_server_gone() {
    let server = serve_stub(LocalServices::new()).await.unwrap();
    let config = server.config();
    server.shutdown().await;

    let gateway = HttpGateway::new(&config).unwrap();
    let err = gateway
        .fetch_risk_points(RiskQuery { lat: 0.0, lng: 0.0 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_classification_multipart_upload() {
    support::init_tracing();
    let local = LocalServices::new();
    let photo = support::deer_photo();
    local.script_classification(&photo, support::deer_predictions(), Duration::ZERO);
    let server = serve_stub(local.clone()).await.unwrap();
    let gateway = HttpGateway::new(&server.config()).unwrap();

    let response = gateway.classify(&photo).await.unwrap();
    assert_eq!(response.predictions, Some(support::deer_predictions()));
    assert_eq!(local.classification_calls(), 1);

    let response = gateway.classify(&ImageBlob::new(b"unknown".to_vec())).await.unwrap();
    assert_eq!(response, ClassificationResponse::default());
}

#[tokio::test]
async fn test_classification_rejects_non_image_upload() {
    let local = LocalServices::new();
    let server = serve_stub(local.clone()).await.unwrap();
    let gateway = HttpGateway::new(&server.config()).unwrap();

    // Known extensions map to image MIME types; anything else still goes out
    // as image/jpeg, so the stub accepts it.
    let notes = ImageBlob::new(b"plain text".to_vec()).with_file_name("notes.txt");
    assert_eq!(notes.content_type(), "image/jpeg");
    assert!(gateway.classify(&notes).await.is_ok());

    let client = reqwest::Client::new();
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"plain text".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = client
        .post(&server.config().endpoints.classification_url)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(local.classification_calls(), 1);
}

async fn submit_with_format(format: IngestionFormat) -> (LocalServices, IncidentDraft) {
    support::init_tracing();
    let local = LocalServices::new();
    let server = serve_stub(local.clone()).await.unwrap();
    let mut config: PipelineConfig = server.config();
    config.ingestion.format = format;
    let gateway = std::sync::Arc::new(HttpGateway::new(&config).unwrap());

    let draft = submittable_draft();
    let submitter = ReportSubmitter::new(gateway, config.submission_timeout());
    let receipt = submitter.submit(&draft).await.unwrap();
    assert_eq!(receipt.report_id, draft.report_id());
    (local, draft)
}

#[tokio::test]
async fn test_ingestion_all_wire_formats() {
    for format in [
        IngestionFormat::JsonReference,
        IngestionFormat::JsonInline,
        IngestionFormat::Multipart,
    ] {
        let (local, draft) = submit_with_format(format).await;
        let reports = local.submitted_reports();
        assert_eq!(reports.len(), 1, "format {}", format);

        let report = &reports[0];
        assert_eq!(report.report_id, draft.report_id());
        assert_eq!(report.image_ref, support::deer_photo().image_ref());
        assert_eq!(report.image_file_name.as_deref(), Some("IMG_0042.jpg"));
        assert_eq!(report.animal_type.as_deref(), Some("deer"));
        assert_eq!(report.category, IncidentCategory::Roadkill);
        assert_eq!(report.location, support::nyc());
        assert_eq!(
            report.image_base64.is_some(),
            format == IngestionFormat::JsonInline,
            "format {}",
            format
        );
    }
}

#[tokio::test]
async fn test_ingestion_failure_is_surfaced() {
    let local = LocalServices::new();
    local.set_ingestion_failure(Some(LocalFailure::Status(500)));
    let server = serve_stub(local.clone()).await.unwrap();
    let config = server.config();
    let gateway = std::sync::Arc::new(HttpGateway::new(&config).unwrap());

    let submitter = ReportSubmitter::new(gateway, config.submission_timeout());
    let err = submitter.submit(&submittable_draft()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.context().status, Some(500));
    assert!(local.submitted_reports().is_empty());
}
