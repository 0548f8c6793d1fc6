use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::domain::AltitudeUnit;
use crate::geo::{self, CompassPoint, DistanceUnit};
use crate::history_repo::HistoryEntry;
use crate::locations::ObserverLocation;
use crate::position::{ObjectDetails, PositionReport};

/// One entry of a record's recent-position ring buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: Option<i32>,
    pub altitude_m: Option<i32>,
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Distance and bearing of one report as seen from the observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Observation {
    pub distance: f64,
    pub bearing: f64,
    pub direction: CompassPoint,
}

impl Observation {
    pub fn of(report: &PositionReport, observer: &ObserverLocation, unit: DistanceUnit) -> Self {
        let distance = geo::distance(
            unit,
            observer.latitude,
            observer.longitude,
            report.latitude,
            report.longitude,
        );
        let bearing = geo::bearing(
            observer.latitude,
            observer.longitude,
            report.latitude,
            report.longitude,
        );
        Self {
            distance,
            bearing,
            direction: CompassPoint::from_bearing(bearing),
        }
    }
}

/// Live state for one object across consecutive polls.
///
/// `closest_*` only moves when an observation is strictly closer, so the
/// first observation at a given distance wins ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingRecord {
    pub identifier: String,
    pub callsign: Option<String>,
    pub details: ObjectDetails,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,

    /// Recent positions, oldest first
    pub positions: VecDeque<TrackedPosition>,

    pub latitude: f64,
    pub longitude: f64,
    pub on_ground: bool,
    pub heading: Option<i32>,
    pub ground_speed_knots: Option<i32>,
    pub horizontal_speed_mps: Option<f64>,
    pub vertical_speed_mps: Option<f64>,

    pub current_distance: f64,
    pub current_bearing: f64,
    pub current_direction: CompassPoint,
    pub current_altitude_ft: Option<i32>,
    pub current_altitude_m: Option<i32>,

    pub closest_distance: f64,
    pub closest_bearing: f64,
    pub closest_direction: CompassPoint,
    pub closest_altitude_ft: Option<i32>,
    pub closest_altitude_m: Option<i32>,
    pub closest_time: DateTime<Utc>,
}

impl TrackingRecord {
    pub(crate) fn new(
        report: &PositionReport,
        observation: Observation,
        trail_capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            identifier: report.identifier.clone(),
            callsign: report.callsign.clone(),
            details: report.details.clone(),
            first_seen: now,
            last_seen: now,
            positions: VecDeque::with_capacity(trail_capacity),
            latitude: report.latitude,
            longitude: report.longitude,
            on_ground: report.on_ground,
            heading: report.heading,
            ground_speed_knots: report.ground_speed_knots,
            horizontal_speed_mps: report.horizontal_speed_mps,
            vertical_speed_mps: report.vertical_speed_mps,
            current_distance: observation.distance,
            current_bearing: observation.bearing,
            current_direction: observation.direction,
            current_altitude_ft: report.altitude_ft,
            current_altitude_m: report.altitude_m,
            closest_distance: observation.distance,
            closest_bearing: observation.bearing,
            closest_direction: observation.direction,
            closest_altitude_ft: report.altitude_ft,
            closest_altitude_m: report.altitude_m,
            closest_time: now,
        };
        record.push_position(report, observation.distance, trail_capacity, now);
        record
    }

    /// Apply a newer report for the same object
    pub(crate) fn update(
        &mut self,
        report: &PositionReport,
        observation: Observation,
        trail_capacity: usize,
        now: DateTime<Utc>,
    ) {
        self.push_position(report, observation.distance, trail_capacity, now);

        if observation.distance < self.closest_distance {
            self.closest_distance = observation.distance;
            self.closest_bearing = observation.bearing;
            self.closest_direction = observation.direction;
            self.closest_altitude_ft = report.altitude_ft;
            self.closest_altitude_m = report.altitude_m;
            self.closest_time = now;
        }

        if report.callsign.is_some() {
            self.callsign = report.callsign.clone();
        }
        self.details = report.details.clone();
        self.latitude = report.latitude;
        self.longitude = report.longitude;
        self.on_ground = report.on_ground;
        self.heading = report.heading;
        self.ground_speed_knots = report.ground_speed_knots;
        self.horizontal_speed_mps = report.horizontal_speed_mps;
        self.vertical_speed_mps = report.vertical_speed_mps;
        self.current_distance = observation.distance;
        self.current_bearing = observation.bearing;
        self.current_direction = observation.direction;
        self.current_altitude_ft = report.altitude_ft;
        self.current_altitude_m = report.altitude_m;
        self.last_seen = now;
    }

    fn push_position(
        &mut self,
        report: &PositionReport,
        distance: f64,
        trail_capacity: usize,
        now: DateTime<Utc>,
    ) {
        while self.positions.len() >= trail_capacity.max(1) {
            self.positions.pop_front();
        }
        self.positions.push_back(TrackedPosition {
            latitude: report.latitude,
            longitude: report.longitude,
            altitude_ft: report.altitude_ft,
            altitude_m: report.altitude_m,
            distance,
            timestamp: now,
        });
    }

    pub fn current_altitude(&self, unit: AltitudeUnit) -> Option<i32> {
        match unit {
            AltitudeUnit::Feet => self.current_altitude_ft,
            AltitudeUnit::Meters => self.current_altitude_m,
        }
    }

    /// Archive form of this record: no ring buffer, `last_seen` stamped to `now`
    pub fn to_history_entry(&self, location_name: &str, now: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            identifier: self.identifier.clone(),
            callsign: self.callsign.clone(),
            location_name: location_name.to_string(),
            first_seen: self.first_seen,
            last_seen: now,
            duration_seconds: (now - self.first_seen).num_seconds(),
            closest_distance: self.closest_distance,
            closest_bearing: self.closest_bearing,
            closest_direction: self.closest_direction,
            closest_altitude_ft: self.closest_altitude_ft,
            closest_altitude_m: self.closest_altitude_m,
            closest_time: self.closest_time,
            details: self.details.clone(),
        }
    }
}
