//! Risk overlay fetcher.
//!
//! Owns the risk point set currently shown on the map. A successful fetch
//! replaces the whole set; a failed fetch leaves it untouched and only logs.
//! The risk service is expected to be offline at times, so nothing here ever
//! returns an error to the map.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::map_renderer::Viewport;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{GeoPoint, RiskPoint};
use crate::remote::RiskService;

/// What a call to [`RiskOverlay::fetch`] did to the rendered set.
#[derive(Debug)]
pub enum OverlayRefresh {
    /// The set was replaced with this many points.
    Replaced { points: usize },
    /// The fetch failed; the previous set is still shown.
    Retained { error: PipelineError },
    /// A fetch was already running; this center will be fetched after it.
    Coalesced,
    /// The overlay was torn down before the response arrived.
    Cancelled,
}

#[derive(Debug, Default)]
struct FetchSlot {
    in_flight: bool,
    pending: Option<GeoPoint>,
}

impl FetchSlot {
    /// Claim the request slot, or park `center` behind the running request.
    fn claim(&mut self, center: GeoPoint) -> bool {
        if self.in_flight {
            self.pending = Some(center);
            false
        } else {
            self.in_flight = true;
            true
        }
    }

    /// A request finished. Returns the parked center and keeps the slot
    /// claimed for it, or frees the slot when nothing is parked.
    fn settle(&mut self) -> Option<GeoPoint> {
        let next = self.pending.take();
        if next.is_none() {
            self.in_flight = false;
        }
        next
    }

    fn release(&mut self) {
        self.in_flight = false;
        self.pending = None;
    }
}

struct OverlayInner {
    service: Arc<dyn RiskService>,
    timeout: Duration,
    points: RwLock<Arc<Vec<RiskPoint>>>,
    slot: Mutex<FetchSlot>,
    fetching: watch::Sender<bool>,
    cancel: CancellationToken,
}

/// Frees the slot if a request is cancelled or its future dropped early.
struct FlightGuard<'a> {
    inner: &'a OverlayInner,
    armed: bool,
}

impl<'a> FlightGuard<'a> {
    fn new(inner: &'a OverlayInner) -> Self {
        Self { inner, armed: true }
    }

    /// Disarm and settle the slot. `Some(next)` hands the slot over to a
    /// request for `next`.
    fn settle(mut self) -> Option<GeoPoint> {
        self.armed = false;
        let mut slot = self.inner.slot.lock();
        let next = slot.settle();
        if next.is_none() {
            self.inner.fetching.send_replace(false);
        }
        next
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.slot.lock().release();
            self.inner.fetching.send_replace(false);
        }
    }
}

pub struct RiskOverlay {
    inner: Arc<OverlayInner>,
}

impl RiskOverlay {
    pub fn new(service: Arc<dyn RiskService>, timeout: Duration) -> Self {
        let (fetching, _) = watch::channel(false);
        Self {
            inner: Arc::new(OverlayInner {
                service,
                timeout,
                points: RwLock::new(Arc::new(Vec::new())),
                slot: Mutex::new(FetchSlot::default()),
                fetching,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Snapshot of the rendered set.
    pub fn points(&self) -> Arc<Vec<RiskPoint>> {
        Arc::clone(&self.inner.points.read())
    }

    pub fn is_fetching(&self) -> bool {
        self.inner.slot.lock().in_flight
    }

    /// Wait until no request is running or queued.
    pub async fn idle(&self) {
        let mut fetching = self.inner.fetching.subscribe();
        let _ = fetching.wait_for(|busy| !*busy).await;
    }

    /// Fetch risk points around `center`.
    ///
    /// At most one request runs at a time. A call made while one is running
    /// returns [`OverlayRefresh::Coalesced`] immediately and its center is
    /// fetched once the running request finishes; only the latest such
    /// center is kept. The caller that started a request gets back the
    /// outcome of that request only; parked centers are fetched by a
    /// background follow-up, observable through [`RiskOverlay::idle`].
    pub async fn fetch(&self, center: GeoPoint) -> OverlayRefresh {
        let inner = &self.inner;
        {
            let mut slot = inner.slot.lock();
            if !slot.claim(center) {
                debug!(lat = center.lat(), lng = center.lng(), "risk fetch in flight, coalescing");
                return OverlayRefresh::Coalesced;
            }
            inner.fetching.send_replace(true);
        }
        let guard = FlightGuard::new(inner);

        let outcome = inner.fetch_once(center).await;
        if matches!(outcome, OverlayRefresh::Cancelled) {
            return outcome;
        }

        if let Some(next) = guard.settle() {
            debug!(lat = next.lat(), lng = next.lng(), "fetching coalesced center");
            tokio::spawn(Arc::clone(inner).drain(next));
        }
        outcome
    }

    /// Re-trigger hook for viewport changes.
    pub async fn on_viewport_changed(&self, viewport: &Viewport) -> OverlayRefresh {
        self.fetch(viewport.center).await
    }

    /// Run [`RiskOverlay::fetch`] in the background, as the map does on mount.
    pub fn spawn_fetch(self: &Arc<Self>, center: GeoPoint) -> JoinHandle<OverlayRefresh> {
        let overlay = Arc::clone(self);
        tokio::spawn(async move { overlay.fetch(center).await })
    }

    /// Stop accepting responses and discard the rendered set.
    pub fn teardown(&self) {
        self.inner.cancel.cancel();
        *self.inner.points.write() = Arc::new(Vec::new());
    }
}

impl OverlayInner {
    /// Fetch parked centers until none is left. Runs holding the slot.
    async fn drain(self: Arc<Self>, mut center: GeoPoint) {
        loop {
            let guard = FlightGuard::new(&self);
            if matches!(self.fetch_once(center).await, OverlayRefresh::Cancelled) {
                return;
            }
            match guard.settle() {
                Some(next) => center = next,
                None => return,
            }
        }
    }

    async fn fetch_once(&self, center: GeoPoint) -> OverlayRefresh {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return OverlayRefresh::Cancelled,
            result = self.request(center) => result,
        };

        if self.cancel.is_cancelled() {
            return OverlayRefresh::Cancelled;
        }

        match result {
            Ok(points) => {
                let count = points.len();
                *self.points.write() = Arc::new(points);
                info!(points = count, lat = center.lat(), lng = center.lng(), "risk overlay updated");
                OverlayRefresh::Replaced { points: count }
            }
            Err(error) => {
                warn!(
                    error = %error,
                    kept = self.points.read().len(),
                    "failed to load risk map, keeping previous overlay"
                );
                OverlayRefresh::Retained { error }
            }
        }
    }

    async fn request(&self, center: GeoPoint) -> PipelineResult<Vec<RiskPoint>> {
        let raw = tokio::time::timeout(self.timeout, self.service.fetch_risk_points(center.into()))
            .await
            .map_err(|_| {
                PipelineError::timeout("fetch_risk_points", self.timeout.as_millis() as u64)
            })??;

        let total = raw.len();
        let points: Vec<RiskPoint> = raw
            .into_iter()
            .filter_map(|dto| match RiskPoint::try_from(dto) {
                Ok(point) => Some(point),
                Err(err) => {
                    debug!(error = %err, "skipping out-of-range risk point");
                    None
                }
            })
            .collect();
        if points.len() < total {
            warn!(dropped = total - points.len(), "risk service returned out-of-range points");
        }
        Ok(points)
    }
}

impl Drop for RiskOverlay {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RiskPointDto;
    use crate::remote::{LocalFailure, LocalServices};

    fn dto(lat: f64, score: f64) -> RiskPointDto {
        RiskPointDto {
            lat,
            lng: -74.0,
            risk_score: score,
            reason: "High Wildlife Activity".to_string(),
        }
    }

    fn center() -> GeoPoint {
        GeoPoint::new(40.7128, -74.006).unwrap()
    }

    fn overlay(local: &LocalServices) -> Arc<RiskOverlay> {
        Arc::new(RiskOverlay::new(Arc::new(local.clone()), Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_first_load_failure_leaves_empty_set() {
        let local = LocalServices::new();
        local.set_risk_failure(Some(LocalFailure::Transport));
        let overlay = overlay(&local);

        let outcome = overlay.fetch(center()).await;
        assert!(matches!(outcome, OverlayRefresh::Retained { .. }));
        assert!(overlay.points().is_empty());
    }

    #[tokio::test]
    async fn test_success_replaces_wholesale() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3), dto(40.71, 0.8)]);
        let overlay = overlay(&local);
        overlay.fetch(center()).await;
        assert_eq!(overlay.points().len(), 2);

        local.set_risk_points(vec![dto(40.72, 0.5)]);
        let outcome = overlay.fetch(center()).await;
        assert!(matches!(outcome, OverlayRefresh::Replaced { points: 1 }));
        assert_eq!(overlay.points().len(), 1);
        assert_eq!(overlay.points()[0].lat(), 40.72);
    }

    #[tokio::test]
    async fn test_out_of_range_points_are_skipped() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3), dto(40.71, 1.4), dto(123.0, 0.5)]);
        let overlay = overlay(&local);
        overlay.fetch(center()).await;
        assert_eq!(overlay.points().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_retains_previous_points() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3)]);
        let overlay = Arc::new(RiskOverlay::new(
            Arc::new(local.clone()),
            Duration::from_millis(50),
        ));
        overlay.fetch(center()).await;

        local.set_risk_delay(Duration::from_secs(5));
        let outcome = overlay.fetch(center()).await;
        match outcome {
            OverlayRefresh::Retained { error } => assert!(error.is_retryable()),
            other => panic!("expected retained, got {:?}", other),
        }
        assert_eq!(overlay.points().len(), 1);
    }

    #[tokio::test]
    async fn test_viewport_changes_coalesce_into_one_follow_up() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3)]);
        local.set_risk_delay(Duration::from_millis(100));
        let overlay = overlay(&local);

        let first = overlay.spawn_fetch(center());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(overlay.is_fetching());

        let second = GeoPoint::new(41.0, -73.0).unwrap();
        let third = GeoPoint::new(42.0, -72.0).unwrap();
        assert!(matches!(overlay.fetch(second).await, OverlayRefresh::Coalesced));
        assert!(matches!(overlay.fetch(third).await, OverlayRefresh::Coalesced));

        let outcome = first.await.unwrap();
        assert!(matches!(outcome, OverlayRefresh::Replaced { .. }));
        // The starting caller returns with its own request; the parked
        // center is still being fetched.
        assert!(overlay.is_fetching());

        overlay.idle().await;
        let queries = local.risk_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].lat, 42.0);
        assert_eq!(local.max_concurrent_risk_calls(), 1);
        assert!(!overlay.is_fetching());
    }

    #[tokio::test]
    async fn test_teardown_discards_late_response() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3)]);
        local.set_risk_delay(Duration::from_millis(100));
        let overlay = overlay(&local);

        let pending = overlay.spawn_fetch(center());
        tokio::time::sleep(Duration::from_millis(20)).await;
        overlay.teardown();

        assert!(matches!(pending.await.unwrap(), OverlayRefresh::Cancelled));
        assert!(overlay.points().is_empty());
    }

    #[test]
    fn test_slot_frees_only_when_nothing_is_parked() {
        let mut slot = FetchSlot::default();
        let a = GeoPoint::new(40.0, -74.0).unwrap();
        let b = GeoPoint::new(41.0, -73.0).unwrap();

        assert!(slot.claim(a));
        assert!(!slot.claim(b));
        assert_eq!(slot.settle(), Some(b));
        assert!(slot.in_flight);

        assert!(!slot.claim(a));
        assert_eq!(slot.settle(), Some(a));
        assert_eq!(slot.settle(), None);
        assert!(!slot.in_flight);

        // A center arriving right after the slot is freed starts its own request.
        assert!(slot.claim(b));
        assert_eq!(slot.pending, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesced_center_is_always_fetched() {
        for i in 0..200 {
            let local = LocalServices::new();
            local.set_risk_points(vec![dto(40.70, 0.3)]);
            let overlay = overlay(&local);

            let a = GeoPoint::new(40.0, -74.0).unwrap();
            let b = GeoPoint::new(41.0 + f64::from(i) / 1000.0, -73.0).unwrap();
            let first = overlay.spawn_fetch(a);
            let second = overlay.spawn_fetch(b);
            let outcomes = [(a, first.await.unwrap()), (b, second.await.unwrap())];

            tokio::time::timeout(Duration::from_secs(2), overlay.idle())
                .await
                .expect("overlay never went idle");

            let queries = local.risk_queries();
            for (center, outcome) in outcomes {
                if matches!(outcome, OverlayRefresh::Coalesced) {
                    assert!(
                        queries.iter().any(|q| q.lat == center.lat()),
                        "iteration {}: coalesced center {:?} was never requested",
                        i,
                        center
                    );
                }
            }
            assert_eq!(local.max_concurrent_risk_calls(), 1);
            assert!(!overlay.is_fetching());
        }
    }

    #[tokio::test]
    async fn test_teardown_stops_follow_up_fetch() {
        let local = LocalServices::new();
        local.set_risk_points(vec![dto(40.70, 0.3)]);
        local.set_risk_delay(Duration::from_millis(60));
        let overlay = overlay(&local);

        let first = overlay.spawn_fetch(center());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let parked = GeoPoint::new(41.0, -73.0).unwrap();
        assert!(matches!(overlay.fetch(parked).await, OverlayRefresh::Coalesced));
        first.await.unwrap();

        overlay.teardown();
        tokio::time::timeout(Duration::from_secs(1), overlay.idle())
            .await
            .expect("follow-up fetch kept running after teardown");
        assert!(overlay.points().is_empty());
    }
}
