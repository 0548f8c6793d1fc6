//! Shared fixtures for tracker integration tests
//!
//! Reports are placed at exact distances from the observer with
//! `geo::destination`, so assertions can use the distances directly.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use overhead::domain::TrackerDomain;
use overhead::geo::{self, DistanceUnit};
use overhead::history_repo::MemoryHistoryStore;
use overhead::locations::ObserverLocation;
use overhead::position::{ObjectDetails, PositionReport};
use overhead::proximity_tracker::{ProximityTracker, TrackerConfig};
use overhead::session_repo::MemorySessionStore;

pub const SEATTLE: (f64, f64) = (47.6062, -122.3321);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
}

pub fn location(name: &str, radius: f64) -> ObserverLocation {
    ObserverLocation::new(name, SEATTLE.0, SEATTLE.1, radius, t0()).unwrap()
}

/// Aircraft report `distance_nm` from Seattle along `bearing`
pub fn aircraft(identifier: &str, distance_nm: f64, bearing: f64) -> PositionReport {
    report(
        TrackerDomain::Aircraft,
        identifier,
        distance_nm,
        bearing,
        Some(3000),
    )
}

pub fn report(
    domain: TrackerDomain,
    identifier: &str,
    distance: f64,
    bearing: f64,
    altitude: Option<i32>,
) -> PositionReport {
    let unit = domain.distance_unit();
    let (latitude, longitude) = geo::destination(unit, SEATTLE.0, SEATTLE.1, bearing, distance);
    let (altitude_ft, altitude_m) = match unit {
        DistanceUnit::NauticalMiles => (
            altitude,
            altitude.map(|ft| (ft as f64 / 3.28084).round() as i32),
        ),
        DistanceUnit::Kilometers => (
            altitude.map(|m| (m as f64 * 3.28084).round() as i32),
            altitude,
        ),
    };
    PositionReport {
        identifier: identifier.to_string(),
        callsign: Some(identifier.to_uppercase()),
        latitude,
        longitude,
        altitude_m,
        altitude_ft,
        heading: Some(270),
        horizontal_speed_mps: Some(120.0),
        ground_speed_knots: Some(233),
        vertical_speed_mps: Some(0.0),
        on_ground: false,
        timestamp: Some(t0()),
        details: ObjectDetails::empty_for(domain),
    }
}

pub fn memory_tracker(location: ObserverLocation) -> ProximityTracker {
    ProximityTracker::new(
        TrackerConfig::for_domain(TrackerDomain::Aircraft),
        location,
        Box::new(MemoryHistoryStore::new()),
        Box::new(MemorySessionStore::new()),
    )
}
