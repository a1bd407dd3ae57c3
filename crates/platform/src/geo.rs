//! Geographic primitives shared by the sampler, planner and publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A `(latitude, longitude)` pair in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build from a GeoJSON-ordered `[lon, lat]` pair.
    #[must_use]
    pub const fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self { latitude: pair[1], longitude: pair[0] }
    }

    /// Great-circle distance in metres.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

/// A single location sample taken from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,

    /// Ground speed in metres per second.
    pub speed: Option<f64>,

    /// Heading in degrees clockwise from true north.
    pub heading: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Position {
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::Coordinate;

    #[test]
    fn lon_lat_is_transposed() {
        let coord = Coordinate::from_lon_lat([174.7633, -36.8485]);
        assert!(coord.latitude.eq(&-36.8485));
        assert!(coord.longitude.eq(&174.7633));
    }

    #[test]
    fn distance_between_points() {
        // Britomart to Sky Tower, roughly 700m
        let britomart = Coordinate::new(-36.8443, 174.7676);
        let sky_tower = Coordinate::new(-36.8485, 174.7622);
        let distance = britomart.distance_to(&sky_tower);
        assert!((600.0..800.0).contains(&distance), "got {distance}");
    }

    #[test]
    fn distance_to_self_is_zero() {
        let point = Coordinate::new(-36.8485, 174.7633);
        assert!(point.distance_to(&point).abs() < f64::EPSILON);
    }
}
