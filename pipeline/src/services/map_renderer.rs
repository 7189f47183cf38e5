//! Map scene computation for the risk overlay.
//!
//! Rendering is a pure function of the risk point set, the viewport and the
//! user position: the same inputs always produce the same scene. The UI layer
//! draws the scene; nothing here touches the network.

use qtty::Meters;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f64::consts::PI;

use crate::models::{GeoPoint, RiskPoint};

/// Scores strictly above this value are drawn as high severity; the
/// threshold itself is low.
pub const HIGH_RISK_THRESHOLD: f64 = 0.6;

/// Radius of every risk zone, independent of the score.
pub const RISK_ZONE_RADIUS: Meters = Meters::new(300.0);

pub const DEFAULT_ZOOM: u8 = 13;
pub const MAX_ZOOM: u8 = 19;
pub const DEFAULT_CENTER_LAT: f64 = 40.7128;
pub const DEFAULT_CENTER_LNG: f64 = -74.0060;

pub const TILE_SIZE: u32 = 256;
pub const TILE_URL_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";
const TILE_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];

pub const USER_MARKER_POPUP: &str = "You are here";

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MERCATOR_MAX_LAT_DEG: f64 = 85.051_128_78;

// =========================================================
// Severity
// =========================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Low,
}

impl Severity {
    /// Two-bucket assignment with a strict comparison against
    /// [`HIGH_RISK_THRESHOLD`].
    pub fn for_score(risk_score: f64) -> Self {
        if risk_score > HIGH_RISK_THRESHOLD {
            Severity::High
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Low => "low",
        }
    }

    pub fn style(&self) -> ZoneStyle {
        match self {
            Severity::High => ZoneStyle {
                color: "#ef4444".to_string(),
                fill_color: "#ef4444".to_string(),
                fill_opacity: 0.4,
            },
            Severity::Low => ZoneStyle {
                color: "#f59e0b".to_string(),
                fill_color: "#f59e0b".to_string(),
                fill_opacity: 0.2,
            },
        }
    }

    pub fn legend_label(&self) -> &'static str {
        match self {
            Severity::High => "High Risk",
            Severity::Low => "Medium Risk",
        }
    }
}

// =========================================================
// Projection
// =========================================================

/// Position in Web Mercator world pixels at a given zoom (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

fn world_size_px(zoom: u8) -> f64 {
    TILE_SIZE as f64 * f64::from(1u32 << zoom.min(MAX_ZOOM))
}

/// Project a coordinate to world pixels at `zoom`. Latitudes beyond the
/// Mercator limit are clamped.
pub fn project(point: GeoPoint, zoom: u8) -> PixelPoint {
    let size = world_size_px(zoom);
    let lat = point
        .lat()
        .clamp(-MERCATOR_MAX_LAT_DEG, MERCATOR_MAX_LAT_DEG)
        .to_radians();
    let x = (point.lng() + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    PixelPoint { x, y }
}

/// Inverse of [`project`]; pixels outside the world are clamped to it.
pub fn unproject(pixel: PixelPoint, zoom: u8) -> GeoPoint {
    let size = world_size_px(zoom);
    let x = pixel.x.clamp(0.0, size);
    let y = pixel.y.clamp(0.0, size);
    let lng = x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let lat = n.sinh().atan().to_degrees();
    GeoPoint::clamped(lat, lng)
}

/// Tile containing `point` at `zoom`.
pub fn tile_of(point: GeoPoint, zoom: u8) -> TileCoord {
    let zoom = zoom.min(MAX_ZOOM);
    let n = 1u32 << zoom;
    let pixel = project(point, zoom);
    let to_tile = |v: f64| ((v / TILE_SIZE as f64).floor().max(0.0) as u32).min(n - 1);
    TileCoord {
        x: to_tile(pixel.x),
        y: to_tile(pixel.y),
        z: zoom,
    }
}

/// Ground resolution at `lat` and `zoom`.
pub fn meters_per_pixel(lat: f64, zoom: u8) -> f64 {
    let circumference = 2.0 * PI * EARTH_RADIUS_M;
    circumference * lat.to_radians().cos() / world_size_px(zoom)
}

// =========================================================
// Viewport
// =========================================================

/// Geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.south..=self.north).contains(&point.lat())
            && (self.west..=self.east).contains(&point.lng())
    }
}

/// The region of the map currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: GeoPoint,
    pub zoom: u8,
    pub width_px: u32,
    pub height_px: u32,
}

impl Viewport {
    pub fn new(center: GeoPoint, zoom: u8, width_px: u32, height_px: u32) -> Self {
        Self {
            center,
            zoom: zoom.min(MAX_ZOOM),
            width_px,
            height_px,
        }
    }

    /// Map centered on the default location at the default zoom.
    pub fn default_with_size(width_px: u32, height_px: u32) -> Self {
        let center = GeoPoint::clamped(DEFAULT_CENTER_LAT, DEFAULT_CENTER_LNG);
        Self::new(center, DEFAULT_ZOOM, width_px, height_px)
    }

    /// Screen position of `point`, relative to the viewport's top-left corner.
    pub fn to_screen(&self, point: GeoPoint) -> PixelPoint {
        let origin = self.origin();
        let pixel = project(point, self.zoom);
        PixelPoint {
            x: pixel.x - origin.x,
            y: pixel.y - origin.y,
        }
    }

    /// Geographic extent of the viewport.
    pub fn bounds(&self) -> GeoBounds {
        let origin = self.origin();
        let north_west = unproject(origin, self.zoom);
        let south_east = unproject(
            PixelPoint {
                x: origin.x + self.width_px as f64,
                y: origin.y + self.height_px as f64,
            },
            self.zoom,
        );
        GeoBounds {
            south: south_east.lat(),
            west: north_west.lng(),
            north: north_west.lat(),
            east: south_east.lng(),
        }
    }

    /// Tiles needed to cover the viewport, row by row.
    pub fn tiles(&self) -> Vec<TileCoord> {
        let origin = self.origin();
        let n = 1u32 << self.zoom.min(MAX_ZOOM);
        let tile = TILE_SIZE as f64;
        let first_x = (origin.x / tile).floor().max(0.0) as u32;
        let first_y = (origin.y / tile).floor().max(0.0) as u32;
        let last_x = (((origin.x + self.width_px as f64) / tile).ceil() as u32).min(n);
        let last_y = (((origin.y + self.height_px as f64) / tile).ceil() as u32).min(n);

        let mut tiles = Vec::new();
        for y in first_y..last_y {
            for x in first_x..last_x {
                tiles.push(TileCoord { x, y, z: self.zoom });
            }
        }
        tiles
    }

    fn origin(&self) -> PixelPoint {
        let center = project(self.center, self.zoom);
        PixelPoint {
            x: center.x - self.width_px as f64 / 2.0,
            y: center.y - self.height_px as f64 / 2.0,
        }
    }
}

// =========================================================
// Scene
// =========================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStyle {
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub url_template: String,
    pub attribution: String,
}

impl TileLayer {
    /// Concrete tile URL, rotating across the provider's subdomains.
    pub fn url_for(&self, tile: TileCoord) -> String {
        let subdomain = TILE_SUBDOMAINS[((tile.x + tile.y) % TILE_SUBDOMAINS.len() as u32) as usize];
        self.url_template
            .replace("{s}", subdomain)
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

impl Default for TileLayer {
    fn default() -> Self {
        Self {
            url_template: TILE_URL_TEMPLATE.to_string(),
            attribution: TILE_ATTRIBUTION.to_string(),
        }
    }
}

/// One drawn circle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskZone {
    pub center: GeoPoint,
    pub radius: Meters,
    pub radius_px: f64,
    pub screen: PixelPoint,
    pub severity: Severity,
    pub style: ZoneStyle,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: GeoPoint,
    pub screen: PixelPoint,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub severity: Severity,
    pub label: String,
    pub color: String,
}

/// Everything the map widget needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapScene {
    pub viewport: Viewport,
    pub tile_layer: TileLayer,
    pub tiles: Vec<TileCoord>,
    pub zones: Vec<RiskZone>,
    pub user_marker: Marker,
    pub legend: Vec<LegendEntry>,
}

impl MapScene {
    /// Zones and marker as a GeoJSON FeatureCollection of points.
    pub fn to_geojson(&self) -> Value {
        let mut features: Vec<Value> = self
            .zones
            .iter()
            .map(|zone| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [zone.center.lng(), zone.center.lat()],
                    },
                    "properties": {
                        "kind": "risk_zone",
                        "severity": zone.severity.as_str(),
                        "radiusMeters": zone.radius.value(),
                        "color": zone.style.color,
                        "popup": zone.popup,
                    },
                })
            })
            .collect();

        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [self.user_marker.position.lng(), self.user_marker.position.lat()],
            },
            "properties": {
                "kind": "user_marker",
                "popup": self.user_marker.popup,
            },
        }));

        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

/// Popup body for one zone, e.g. `"Risk: 72%\nDeer migration"`.
///
/// The percentage rounds half away from zero.
pub fn popup_text(point: &RiskPoint) -> String {
    format!(
        "Risk: {}%\n{}",
        (point.risk_score() * 100.0).round() as i64,
        point.reason()
    )
}

/// Computes map scenes from risk points.
#[derive(Debug, Clone)]
pub struct MapRenderer {
    zone_radius: Meters,
    tile_layer: TileLayer,
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self {
            zone_radius: RISK_ZONE_RADIUS,
            tile_layer: TileLayer::default(),
        }
    }
}

impl MapRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone_radius(mut self, radius: Meters) -> Self {
        self.zone_radius = radius;
        self
    }

    pub fn with_tile_layer(mut self, tile_layer: TileLayer) -> Self {
        self.tile_layer = tile_layer;
        self
    }

    /// Build the scene. Every point becomes its own zone, in input order;
    /// coincident points are not merged.
    pub fn render(&self, points: &[RiskPoint], viewport: &Viewport, user: GeoPoint) -> MapScene {
        let zones = points
            .iter()
            .map(|point| {
                let severity = Severity::for_score(point.risk_score());
                RiskZone {
                    center: point.location(),
                    radius: self.zone_radius,
                    radius_px: self.zone_radius.value()
                        / meters_per_pixel(point.lat(), viewport.zoom),
                    screen: viewport.to_screen(point.location()),
                    severity,
                    style: severity.style(),
                    popup: popup_text(point),
                }
            })
            .collect();

        let legend = [Severity::High, Severity::Low]
            .into_iter()
            .map(|severity| LegendEntry {
                severity,
                label: severity.legend_label().to_string(),
                color: severity.style().color,
            })
            .collect();

        MapScene {
            viewport: *viewport,
            tile_layer: self.tile_layer.clone(),
            tiles: viewport.tiles(),
            zones,
            user_marker: Marker {
                position: user,
                screen: viewport.to_screen(user),
                popup: USER_MARKER_POPUP.to_string(),
            },
            legend,
        }
    }
}
