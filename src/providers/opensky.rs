//! OpenSky Network state-vector client.
//!
//! Anonymous access, no API key. OpenSky asks anonymous users to stay at or
//! above a 10 second spacing between requests.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::TelemetryProvider;
use super::rate_limit::RateLimiter;
use crate::domain::TrackerDomain;
use crate::geo::{self, BoundingBox, DistanceUnit};
use crate::locations::ObserverLocation;
use crate::position::{KNOTS_PER_MPS, ObjectDetails, PositionReport, altitude_pair};

pub const DEFAULT_BASE_URL: &str = "https://opensky-network.org/api";

// State vector field positions
const ICAO24: usize = 0;
const CALLSIGN: usize = 1;
const ORIGIN_COUNTRY: usize = 2;
const TIME_POSITION: usize = 3;
const LAST_CONTACT: usize = 4;
const LONGITUDE: usize = 5;
const LATITUDE: usize = 6;
const BARO_ALTITUDE: usize = 7;
const ON_GROUND: usize = 8;
const VELOCITY: usize = 9;
const TRUE_TRACK: usize = 10;
const VERTICAL_RATE: usize = 11;
const SQUAWK: usize = 14;
const CATEGORY: usize = 17;

#[derive(Debug, Deserialize)]
pub struct StatesResponse {
    pub time: Option<i64>,
    pub states: Option<Vec<Value>>,
}

#[derive(Clone)]
pub struct OpenSkyClient {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl OpenSkyClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            rate_limiter: RateLimiter::new(
                "opensky",
                TrackerDomain::Aircraft.min_request_interval(),
            ),
        }
    }

    /// All state vectors inside a bounding box
    pub async fn states_in_box(&self, bbox: &BoundingBox) -> Result<Vec<PositionReport>> {
        self.rate_limiter.wait().await;

        let url = format!("{}/states/all", self.base_url);
        let params = [
            ("lamin", bbox.lat_min),
            ("lomin", bbox.lon_min),
            ("lamax", bbox.lat_max),
            ("lomax", bbox.lon_max),
        ];

        debug!(?bbox, "Fetching OpenSky states");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send OpenSky request: {}", e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("OpenSky rejected request with 429 - anonymous credit limit reached");
        }
        if !status.is_success() {
            return Err(anyhow!("OpenSky request failed with status: {}", status));
        }

        let body: StatesResponse = response
            .json()
            .await
            .context("Failed to parse OpenSky response")?;

        Ok(parse_states(&body))
    }

    /// State vectors within `radius_nm` of a point (box query, then exact distance cut)
    pub async fn states_around_point(
        &self,
        latitude: f64,
        longitude: f64,
        radius_nm: f64,
    ) -> Result<Vec<PositionReport>> {
        let bbox = BoundingBox::around(DistanceUnit::NauticalMiles, latitude, longitude, radius_nm);
        let reports = self.states_in_box(&bbox).await?;
        Ok(within_radius(reports, latitude, longitude, radius_nm))
    }
}

#[async_trait]
impl TelemetryProvider for OpenSkyClient {
    fn name(&self) -> &'static str {
        "opensky"
    }

    async fn fetch(
        &self,
        location: &ObserverLocation,
        fetch_radius: f64,
    ) -> Result<Vec<PositionReport>> {
        self.states_around_point(location.latitude, location.longitude, fetch_radius)
            .await
    }
}

fn within_radius(
    reports: Vec<PositionReport>,
    latitude: f64,
    longitude: f64,
    radius_nm: f64,
) -> Vec<PositionReport> {
    reports
        .into_iter()
        .filter(|r| {
            geo::distance(
                DistanceUnit::NauticalMiles,
                latitude,
                longitude,
                r.latitude,
                r.longitude,
            ) <= radius_nm
        })
        .collect()
}

/// Normalize an OpenSky response. Rows without a usable position or
/// identifier are skipped; the rest of the batch is kept.
pub fn parse_states(body: &StatesResponse) -> Vec<PositionReport> {
    let Some(states) = &body.states else {
        return Vec::new();
    };

    let mut reports = Vec::with_capacity(states.len());
    for state in states {
        match parse_state(state) {
            Some(report) => reports.push(report),
            None => debug!(?state, "Skipping OpenSky state without usable position"),
        }
    }
    reports
}

fn parse_state(state: &Value) -> Option<PositionReport> {
    let row = state.as_array()?;
    let field = |i: usize| row.get(i).filter(|v| !v.is_null());
    let number = |i: usize| field(i).and_then(Value::as_f64).filter(|v| v.is_finite());
    let text = |i: usize| {
        field(i)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let identifier = text(ICAO24)?.to_lowercase();
    let latitude = number(LATITUDE)?;
    let longitude = number(LONGITUDE)?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    let (altitude_m, altitude_ft) = altitude_pair(number(BARO_ALTITUDE));
    let velocity = number(VELOCITY);
    let timestamp = number(LAST_CONTACT)
        .or_else(|| number(TIME_POSITION))
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0));

    Some(PositionReport {
        identifier,
        callsign: text(CALLSIGN),
        latitude,
        longitude,
        altitude_m,
        altitude_ft,
        heading: number(TRUE_TRACK).map(|h| h.round() as i32),
        horizontal_speed_mps: velocity,
        ground_speed_knots: velocity.map(|v| (v * KNOTS_PER_MPS).round() as i32),
        vertical_speed_mps: number(VERTICAL_RATE),
        on_ground: field(ON_GROUND).and_then(Value::as_bool).unwrap_or(false),
        timestamp,
        details: ObjectDetails::Aircraft {
            origin_country: text(ORIGIN_COUNTRY),
            squawk: text(SQUAWK),
            category: field(CATEGORY).and_then(Value::as_i64),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(states: Value) -> StatesResponse {
        serde_json::from_value(json!({ "time": 1736942400, "states": states })).unwrap()
    }

    #[test]
    fn test_parse_full_state_vector() {
        let body = response(json!([[
            "a1b2c3", "ASA123  ", "United States", 1736942399, 1736942400,
            -122.30, 47.62, 1000.0, false, 100.0, 181.6, -2.5,
            null, 1050.0, "1200", false, 0, 3
        ]]));

        let reports = parse_states(&body);
        assert_eq!(reports.len(), 1);
        let r = &reports[0];
        assert_eq!(r.identifier, "a1b2c3");
        assert_eq!(r.callsign.as_deref(), Some("ASA123"));
        assert_eq!(r.altitude_ft, Some(3281));
        assert_eq!(r.altitude_m, Some(1000));
        assert_eq!(r.ground_speed_knots, Some(194));
        assert_eq!(r.heading, Some(182));
        assert!(!r.on_ground);
        assert_eq!(r.timestamp.unwrap().timestamp(), 1736942400);
        assert_eq!(
            r.details,
            ObjectDetails::Aircraft {
                origin_country: Some("United States".to_string()),
                squawk: Some("1200".to_string()),
                category: Some(3),
            }
        );
    }

    #[test]
    fn test_missing_numbers_stay_none() {
        let body = response(json!([[
            "abc123", "", "Canada", null, 1736942400,
            -122.30, 47.62, null, false, null, null, null
        ]]));

        let reports = parse_states(&body);
        assert_eq!(reports.len(), 1);
        let r = &reports[0];
        assert_eq!(r.callsign, None);
        assert_eq!(r.altitude_ft, None);
        assert_eq!(r.ground_speed_knots, None);
        assert_eq!(r.heading, None);
    }

    #[test]
    fn test_rows_without_position_are_skipped() {
        let body = response(json!([
            ["aaa111", "A", "X", null, 1, null, 47.0, 100.0, false, 50.0, 10.0, 0.0],
            ["bbb222", "B", "X", null, 1, -122.0, null, 100.0, false, 50.0, 10.0, 0.0],
            ["   ", "C", "X", null, 1, -122.0, 47.0, 100.0, false, 50.0, 10.0, 0.0],
            "not an array",
            ["ccc333", "D", "X", null, 1, -122.0, 47.0, 100.0, true, 0.0, 0.0, 0.0]
        ]));

        let reports = parse_states(&body);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].identifier, "ccc333");
        assert!(reports[0].on_ground);
    }

    #[test]
    fn test_null_states_is_empty() {
        let body = response(Value::Null);
        assert!(parse_states(&body).is_empty());
    }

    #[test]
    fn test_within_radius_drops_box_corners() {
        let body = response(json!([
            ["near01", "N", "X", null, 1, -122.33, 47.62, 1000.0, false, 50.0, 0.0, 0.0],
            ["far001", "F", "X", null, 1, -122.10, 47.80, 1000.0, false, 50.0, 0.0, 0.0]
        ]));
        let kept = within_radius(parse_states(&body), 47.6062, -122.3321, 10.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].identifier, "near01");
    }
}
