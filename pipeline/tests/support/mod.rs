//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Mutex, Once};

use ecoguard_pipeline::api::RiskPointDto;
use ecoguard_pipeline::models::{GeoPoint, ImageBlob, Prediction};

static TRACING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Install a `tracing` subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Run `f` with the given environment variables set (`Some`) or removed
/// (`None`), restoring the previous values afterwards, even on panic.
///
/// Calls are serialized: the environment is process-global and tests run
/// in parallel.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _restore = EnvRestore::apply(changes);
    f()
}

struct EnvRestore {
    previous: BTreeMap<String, Option<String>>,
}

impl EnvRestore {
    fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let mut previous = BTreeMap::new();
        for (key, value) in changes {
            previous
                .entry(key.to_string())
                .or_insert_with(|| std::env::var(key).ok());
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        Self { previous }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in std::mem::take(&mut self.previous) {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn nyc() -> GeoPoint {
    GeoPoint::new(40.71, -74.00).expect("valid fixture coordinate")
}

pub fn deer_photo() -> ImageBlob {
    ImageBlob::new(b"\xff\xd8\xff\xe0 deer on the shoulder".to_vec()).with_file_name("IMG_0042.jpg")
}

pub fn deer_predictions() -> Vec<Prediction> {
    vec![Prediction::new("deer", 0.87), Prediction::new("elk", 0.05)]
}

pub fn risk_point(lat: f64, lng: f64, risk_score: f64, reason: &str) -> RiskPointDto {
    RiskPointDto {
        lat,
        lng,
        risk_score,
        reason: reason.to_string(),
    }
}

/// Three points around Manhattan with mixed severities.
pub fn manhattan_risk_points() -> Vec<RiskPointDto> {
    vec![
        risk_point(40.71, -74.00, 0.72, "Deer migration"),
        risk_point(40.73, -73.99, 0.35, "Roadside grazing"),
        risk_point(40.75, -73.98, 0.60, "Wetland crossing"),
    ]
}
