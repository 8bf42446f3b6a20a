//! Great-circle distance and simple bounding boxes in miles.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in miles
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Approximate miles per degree of latitude
const MILES_PER_DEGREE_LAT: f64 = 69.0;

/// A WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl Coordinates {
    /// Build a point
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both parts finite and inside WGS84 range
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine distance to another point in miles
    #[must_use]
    pub fn distance_miles(&self, other: &Self) -> f64 {
        haversine_miles(*self, *other)
    }
}

/// Haversine distance between two points in miles.
#[must_use]
pub fn haversine_miles(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Axis-aligned box used to prefilter candidates before the haversine check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge
    pub min_lat: f64,
    /// Northern edge
    pub max_lat: f64,
    /// Western edge
    pub min_lon: f64,
    /// Eastern edge
    pub max_lon: f64,
}

impl BoundingBox {
    /// Box enclosing a circle of `radius_miles` around `center`.
    #[must_use]
    pub fn around(center: Coordinates, radius_miles: f64) -> Self {
        let dlat = radius_miles / MILES_PER_DEGREE_LAT;
        // longitude degrees shrink with latitude; never divide by ~0 near the poles
        let miles_per_lon = (MILES_PER_DEGREE_LAT * center.lat.to_radians().cos()).max(1.0);
        let dlon = radius_miles / miles_per_lon;
        Self {
            min_lat: center.lat - dlat,
            max_lat: center.lat + dlat,
            min_lon: center.lon - dlon,
            max_lon: center.lon + dlon,
        }
    }

    /// Point lies inside or on the edge
    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }
}

/// True when `point` is within `radius_miles` of `center` (inclusive).
#[must_use]
pub fn within_radius(center: Coordinates, point: Coordinates, radius_miles: f64) -> bool {
    BoundingBox::around(center, radius_miles).contains(point)
        && haversine_miles(center, point) <= radius_miles
}

/// Grid-cell zone identifier for listings without a ZIP, e.g. `grid:35.60:-82.55`.
#[must_use]
pub fn grid_zone_id(point: Coordinates, cell_degrees: f64) -> String {
    let snap = |v: f64| (v / cell_degrees).floor() * cell_degrees;
    format!("grid:{:.2}:{:.2}", snap(point.lat), snap(point.lon))
}
