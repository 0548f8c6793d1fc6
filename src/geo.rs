//! Great-circle geometry between the observer and tracked objects.
//!
//! All functions are pure and defined for any finite input. Callers filter
//! out missing or NaN coordinates before they get here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean Earth radius in nautical miles
pub const EARTH_RADIUS_NM: f64 = 3440.065;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Unit in which distances and radii are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    NauticalMiles,
    Kilometers,
}

impl DistanceUnit {
    pub fn earth_radius(self) -> f64 {
        match self {
            DistanceUnit::NauticalMiles => EARTH_RADIUS_NM,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }

    /// Short label used when printing distances
    pub fn abbreviation(self) -> &'static str {
        match self {
            DistanceUnit::NauticalMiles => "NM",
            DistanceUnit::Kilometers => "km",
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Haversine distance between two WGS84 points, in `unit`
pub fn distance(unit: DistanceUnit, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    unit.earth_radius() * c
}

/// Initial bearing from point 1 to point 2, normalized to [0, 360)
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();

    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if degrees >= 360.0 { 0.0 } else { degrees }
}

/// Point reached by travelling `dist` (in `unit`) from a start point along
/// an initial bearing. Returns (latitude, longitude) with longitude wrapped
/// to [-180, 180).
pub fn destination(
    unit: DistanceUnit,
    lat: f64,
    lon: f64,
    bearing_deg: f64,
    dist: f64,
) -> (f64, f64) {
    let delta = dist / unit.earth_radius();
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon2 = (lambda2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
    (phi2.to_degrees(), lon2)
}

/// One of the sixteen points of the compass rose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompassPoint {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl CompassPoint {
    const ROSE: [CompassPoint; 16] = [
        CompassPoint::N,
        CompassPoint::NNE,
        CompassPoint::NE,
        CompassPoint::ENE,
        CompassPoint::E,
        CompassPoint::ESE,
        CompassPoint::SE,
        CompassPoint::SSE,
        CompassPoint::S,
        CompassPoint::SSW,
        CompassPoint::SW,
        CompassPoint::WSW,
        CompassPoint::W,
        CompassPoint::WNW,
        CompassPoint::NW,
        CompassPoint::NNW,
    ];

    /// Nearest 22.5 degree sector for a bearing in degrees
    pub fn from_bearing(bearing_deg: f64) -> Self {
        let sector = (bearing_deg / 22.5).round() as i64;
        Self::ROSE[sector.rem_euclid(16) as usize]
    }

    pub fn label(self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NNE => "NNE",
            CompassPoint::NE => "NE",
            CompassPoint::ENE => "ENE",
            CompassPoint::E => "E",
            CompassPoint::ESE => "ESE",
            CompassPoint::SE => "SE",
            CompassPoint::SSE => "SSE",
            CompassPoint::S => "S",
            CompassPoint::SSW => "SSW",
            CompassPoint::SW => "SW",
            CompassPoint::WSW => "WSW",
            CompassPoint::W => "W",
            CompassPoint::WNW => "WNW",
            CompassPoint::NW => "NW",
            CompassPoint::NNW => "NNW",
        }
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Latitude/longitude box, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Smallest box containing the circle of `radius` around the point.
    ///
    /// Latitudes are clamped to the poles. The longitude span is not wrapped
    /// across the antimeridian; providers accept out-of-range bounds there.
    pub fn around(unit: DistanceUnit, lat: f64, lon: f64, radius: f64) -> Self {
        let (north, _) = destination(unit, lat, lon, 0.0, radius);
        let (south, _) = destination(unit, lat, lon, 180.0, radius);

        // Widest longitude reached by the circle; a pole inside it covers every longitude
        let delta = radius / unit.earth_radius();
        let cos_lat = lat.to_radians().cos();
        let lon_span_deg = if delta.sin() >= cos_lat {
            180.0
        } else {
            (delta.sin() / cos_lat).asin().to_degrees()
        };

        Self {
            lat_min: south.max(-90.0),
            lon_min: lon - lon_span_deg,
            lat_max: north.min(90.0),
            lon_max: lon + lon_span_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEATTLE: (f64, f64) = (47.6062, -122.3321);
    const PORTLAND: (f64, f64) = (45.5152, -122.6784);

    #[test]
    fn test_distance_zero_for_same_point() {
        for unit in [DistanceUnit::NauticalMiles, DistanceUnit::Kilometers] {
            let d = distance(unit, SEATTLE.0, SEATTLE.1, SEATTLE.0, SEATTLE.1);
            assert_eq!(d, 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (SEATTLE, PORTLAND),
            ((0.0, 0.0), (10.0, 10.0)),
            ((-33.8688, 151.2093), (51.5074, -0.1278)),
            ((89.9, 0.0), (-89.9, 180.0)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let ab = distance(DistanceUnit::Kilometers, lat1, lon1, lat2, lon2);
            let ba = distance(DistanceUnit::Kilometers, lat2, lon2, lat1, lon1);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn test_seattle_portland_distance() {
        // Roughly 234 km / 126 NM apart
        let km = distance(
            DistanceUnit::Kilometers,
            SEATTLE.0,
            SEATTLE.1,
            PORTLAND.0,
            PORTLAND.1,
        );
        let nm = distance(
            DistanceUnit::NauticalMiles,
            SEATTLE.0,
            SEATTLE.1,
            PORTLAND.0,
            PORTLAND.1,
        );
        assert!((km - 234.0).abs() < 2.0, "got {km}");
        assert!((nm - 126.3).abs() < 1.5, "got {nm}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!((bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        let b = bearing(SEATTLE.0, SEATTLE.1, PORTLAND.0, PORTLAND.1);
        assert!((0.0..360.0).contains(&b));
        // Portland is just west of due south
        assert!((180.0..190.0).contains(&b), "got {b}");
    }

    #[test]
    fn test_reverse_bearing_differs_by_half_turn() {
        let pairs = [
            ((47.6062, -122.3321), (47.65, -122.30)),
            ((10.0, 10.0), (10.1, 10.2)),
            ((-20.0, 30.0), (-20.05, 29.9)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let forward = bearing(lat1, lon1, lat2, lon2);
            let back = bearing(lat2, lon2, lat1, lon1);
            let diff = (forward - back).rem_euclid(360.0);
            assert!((diff - 180.0).abs() < 0.5, "diff {diff}");
        }
    }

    #[test]
    fn test_compass_point_sectors() {
        assert_eq!(CompassPoint::from_bearing(0.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_bearing(11.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_bearing(11.25), CompassPoint::NNE);
        assert_eq!(CompassPoint::from_bearing(45.0), CompassPoint::NE);
        assert_eq!(CompassPoint::from_bearing(90.0), CompassPoint::E);
        assert_eq!(CompassPoint::from_bearing(202.5), CompassPoint::SSW);
        assert_eq!(CompassPoint::from_bearing(337.5), CompassPoint::NNW);
        // 350 rounds to sector 16, which wraps to north
        assert_eq!(CompassPoint::from_bearing(350.0), CompassPoint::N);
    }

    #[test]
    fn test_compass_point_serializes_as_label() {
        let json = serde_json::to_string(&CompassPoint::WNW).unwrap();
        assert_eq!(json, "\"WNW\"");
        assert_eq!(CompassPoint::SSE.to_string(), "SSE");
    }

    #[test]
    fn test_destination_round_trips_distance_and_bearing() {
        let (lat, lon) = destination(DistanceUnit::NauticalMiles, SEATTLE.0, SEATTLE.1, 60.0, 12.0);
        let d = distance(DistanceUnit::NauticalMiles, SEATTLE.0, SEATTLE.1, lat, lon);
        let b = bearing(SEATTLE.0, SEATTLE.1, lat, lon);
        assert!((d - 12.0).abs() < 1e-6, "got {d}");
        assert!((b - 60.0).abs() < 1e-3, "got {b}");
    }

    #[test]
    fn test_bounding_box_contains_circle() {
        let bbox = BoundingBox::around(DistanceUnit::NauticalMiles, SEATTLE.0, SEATTLE.1, 10.0);
        let inside = |lat: f64, lon: f64| {
            (bbox.lat_min..=bbox.lat_max).contains(&lat)
                && (bbox.lon_min..=bbox.lon_max).contains(&lon)
        };
        assert!(inside(SEATTLE.0, SEATTLE.1));
        for bearing_deg in [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0] {
            let (lat, lon) = destination(
                DistanceUnit::NauticalMiles,
                SEATTLE.0,
                SEATTLE.1,
                bearing_deg,
                9.99,
            );
            assert!(inside(lat, lon), "bearing {bearing_deg} escaped box");
        }
        // Longitude span widens with latitude
        assert!(bbox.lon_max - bbox.lon_min > bbox.lat_max - bbox.lat_min);
    }
}
