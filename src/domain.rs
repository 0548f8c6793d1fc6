use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::geo::DistanceUnit;

/// Floor applied to any configured refresh interval
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// What kind of traffic a tracker instance follows.
///
/// Aircraft come from OpenSky state vectors and are measured in nautical
/// miles; amateur balloons come from SondeHub and are measured in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrackerDomain {
    Aircraft,
    Balloon,
}

/// Unit used for altitude statistics and the max-altitude filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    Feet,
    Meters,
}

impl AltitudeUnit {
    pub fn abbreviation(self) -> &'static str {
        match self {
            AltitudeUnit::Feet => "ft",
            AltitudeUnit::Meters => "m",
        }
    }
}

impl TrackerDomain {
    pub fn distance_unit(self) -> DistanceUnit {
        match self {
            TrackerDomain::Aircraft => DistanceUnit::NauticalMiles,
            TrackerDomain::Balloon => DistanceUnit::Kilometers,
        }
    }

    pub fn altitude_unit(self) -> AltitudeUnit {
        match self {
            TrackerDomain::Aircraft => AltitudeUnit::Feet,
            TrackerDomain::Balloon => AltitudeUnit::Meters,
        }
    }

    /// Detection radius used when a location does not carry one
    pub fn default_radius(self) -> f64 {
        match self {
            TrackerDomain::Aircraft => 5.0,
            TrackerDomain::Balloon => 200.0,
        }
    }

    /// Fetch radius = detection radius * this ratio.
    ///
    /// Aircraft move fast enough that an object outside the display radius
    /// now may be overhead by the next poll, so the fetch covers twice the
    /// radius. Balloons drift slowly and SondeHub already filters by
    /// distance server-side.
    pub fn default_fetch_ratio(self) -> f64 {
        match self {
            TrackerDomain::Aircraft => 2.0,
            TrackerDomain::Balloon => 1.0,
        }
    }

    /// Ring-buffer length for trail rendering
    pub fn trail_capacity(self) -> usize {
        match self {
            TrackerDomain::Aircraft => 20,
            TrackerDomain::Balloon => 30,
        }
    }

    /// Minimum spacing between provider calls
    pub fn min_request_interval(self) -> Duration {
        match self {
            TrackerDomain::Aircraft => Duration::from_secs(10),
            TrackerDomain::Balloon => Duration::from_secs(15),
        }
    }

    pub fn default_refresh_interval(self) -> Duration {
        match self {
            TrackerDomain::Aircraft => Duration::from_secs(90),
            TrackerDomain::Balloon => Duration::from_secs(120),
        }
    }

    pub fn default_max_altitude(self) -> i32 {
        match self {
            TrackerDomain::Aircraft => 10_000,
            TrackerDomain::Balloon => 40_000,
        }
    }

    /// Upper bound for the one-shot backfill scan, which covers three times
    /// the detection radius
    pub fn backfill_radius_cap(self) -> f64 {
        match self {
            TrackerDomain::Aircraft => 50.0,
            TrackerDomain::Balloon => 600.0,
        }
    }

    /// Aircraft on the ground are never interesting overhead traffic
    pub fn excludes_on_ground(self) -> bool {
        matches!(self, TrackerDomain::Aircraft)
    }

    /// Plural noun for log lines
    pub fn object_noun(self) -> &'static str {
        match self {
            TrackerDomain::Aircraft => "aircraft",
            TrackerDomain::Balloon => "balloons",
        }
    }
}

impl fmt::Display for TrackerDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerDomain::Aircraft => write!(f, "aircraft"),
            TrackerDomain::Balloon => write!(f, "balloon"),
        }
    }
}
