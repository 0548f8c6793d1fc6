use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AltitudeUnit, TrackerDomain};

/// Meters to feet
pub const FEET_PER_METER: f64 = 3.28084;

/// Meters per second to knots
pub const KNOTS_PER_MPS: f64 = 1.94384;

/// Provider-specific classification of a tracked object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ObjectDetails {
    #[serde(rename_all = "camelCase")]
    Aircraft {
        origin_country: Option<String>,
        squawk: Option<String>,
        /// ADS-B emitter category as reported by OpenSky
        category: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Balloon {
        payload_type: Option<String>,
        manufacturer: Option<String>,
        frequency: Option<f64>,
        uploader_callsign: Option<String>,
        burst_timer: Option<i64>,
    },
}

impl ObjectDetails {
    pub fn empty_for(domain: TrackerDomain) -> Self {
        match domain {
            TrackerDomain::Aircraft => ObjectDetails::Aircraft {
                origin_country: None,
                squawk: None,
                category: None,
            },
            TrackerDomain::Balloon => ObjectDetails::Balloon {
                payload_type: None,
                manufacturer: None,
                frequency: None,
                uploader_callsign: None,
                burst_timer: None,
            },
        }
    }
}

/// One provider observation of one object, normalized across providers.
///
/// Missing numeric fields stay `None`; an unknown altitude is not sea level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    /// ICAO24 hex address or payload callsign
    pub identifier: String,
    /// Flight callsign or payload display name
    pub callsign: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<i32>,
    pub altitude_ft: Option<i32>,
    /// Ground track in degrees
    pub heading: Option<i32>,
    pub horizontal_speed_mps: Option<f64>,
    pub ground_speed_knots: Option<i32>,
    pub vertical_speed_mps: Option<f64>,
    pub on_ground: bool,
    /// When the provider last heard from the object
    pub timestamp: Option<DateTime<Utc>>,
    pub details: ObjectDetails,
}

impl PositionReport {
    /// Altitude in the unit a domain reports statistics in
    pub fn altitude_in(&self, unit: AltitudeUnit) -> Option<i32> {
        match unit {
            AltitudeUnit::Feet => self.altitude_ft,
            AltitudeUnit::Meters => self.altitude_m,
        }
    }
}

/// Which reports are worth handing to the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportFilter {
    pub exclude_on_ground: bool,
    /// Upper altitude bound; reports with unknown altitude always pass
    pub max_altitude: Option<i32>,
    pub altitude_unit: AltitudeUnit,
}

impl ReportFilter {
    pub fn for_domain(domain: TrackerDomain, max_altitude: Option<i32>) -> Self {
        Self {
            exclude_on_ground: domain.excludes_on_ground(),
            max_altitude,
            altitude_unit: domain.altitude_unit(),
        }
    }

    pub fn accepts(&self, report: &PositionReport) -> bool {
        if self.exclude_on_ground && report.on_ground {
            return false;
        }
        match (self.max_altitude, report.altitude_in(self.altitude_unit)) {
            (Some(max), Some(alt)) => alt <= max,
            _ => true,
        }
    }

    pub fn apply(&self, reports: Vec<PositionReport>) -> Vec<PositionReport> {
        reports.into_iter().filter(|r| self.accepts(r)).collect()
    }
}

/// Round a meter altitude and derive feet from the unrounded value
pub(crate) fn altitude_pair(meters: Option<f64>) -> (Option<i32>, Option<i32>) {
    match meters {
        Some(m) if m.is_finite() => (
            Some(m.round() as i32),
            Some((m * FEET_PER_METER).round() as i32),
        ),
        _ => (None, None),
    }
}
