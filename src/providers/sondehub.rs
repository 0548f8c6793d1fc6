//! SondeHub Amateur client for high-altitude balloon payloads.
//!
//! Responses are dictionaries keyed by payload callsign whose values are
//! either one telemetry object or an array of recent points. Numbers may
//! arrive as JSON numbers or as numeric strings.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::TelemetryProvider;
use super::rate_limit::RateLimiter;
use crate::domain::TrackerDomain;
use crate::locations::ObserverLocation;
use crate::position::{KNOTS_PER_MPS, ObjectDetails, PositionReport, altitude_pair};

pub const DEFAULT_BASE_URL: &str = "https://api.v2.sondehub.org";

/// How far back the nearby-payload query looks
pub const DEFAULT_LOOKBACK: Duration = Duration::hours(24);

/// How far back a single payload's telemetry history reaches
pub const DEFAULT_TELEMETRY_LOOKBACK: Duration = Duration::hours(6);

/// One point of a payload's flight path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPoint {
    pub datetime: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<i32>,
    pub horizontal_speed_mps: Option<f64>,
    pub vertical_speed_mps: Option<f64>,
    pub heading: Option<i32>,
}

#[derive(Clone)]
pub struct SondeHubClient {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl SondeHubClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            rate_limiter: RateLimiter::new(
                "sondehub",
                TrackerDomain::Balloon.min_request_interval(),
            ),
        }
    }

    /// Latest telemetry of every payload within `radius_km` heard in the lookback window
    pub async fn payloads_nearby(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
        lookback: Duration,
    ) -> Result<Vec<PositionReport>> {
        let url = format!("{}/amateur", self.base_url);
        let params = [
            ("lat", latitude.to_string()),
            ("lon", longitude.to_string()),
            ("distance", ((radius_km * 1000.0).round() as i64).to_string()),
            ("last", lookback.num_seconds().to_string()),
        ];

        let body = self.get_json(&url, &params).await?;
        Ok(parse_payloads(&body))
    }

    /// Flight path of one payload, oldest point first
    pub async fn payload_telemetry(
        &self,
        payload_callsign: &str,
        lookback: Duration,
    ) -> Result<Vec<TelemetryPoint>> {
        let url = self.telemetry_url(payload_callsign);
        let params = [("last", lookback.num_seconds().to_string())];

        let body = self.get_json(&url, &params).await?;
        Ok(parse_telemetry_history(&body))
    }

    fn telemetry_url(&self, payload_callsign: &str) -> String {
        format!(
            "{}/amateur/telemetry/{}",
            self.base_url,
            url_component(payload_callsign)
        )
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value> {
        self.rate_limiter.wait().await;

        debug!(url = %url, "Fetching SondeHub telemetry");
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send SondeHub request: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("SondeHub request failed with status: {}", status));
        }

        response
            .json()
            .await
            .context("Failed to parse SondeHub response")
    }
}

#[async_trait]
impl TelemetryProvider for SondeHubClient {
    fn name(&self) -> &'static str {
        "sondehub"
    }

    async fn fetch(
        &self,
        location: &ObserverLocation,
        fetch_radius: f64,
    ) -> Result<Vec<PositionReport>> {
        self.payloads_nearby(
            location.latitude,
            location.longitude,
            fetch_radius,
            DEFAULT_LOOKBACK,
        )
        .await
    }
}

/// Public map link for a payload
pub fn tracker_url(payload_callsign: &str) -> Option<String> {
    if payload_callsign.trim().is_empty() {
        return None;
    }
    Some(format!(
        "https://amateur.sondehub.org/#!mt=roadmap&mz=9&qm=6_hours&q={}",
        url_component(payload_callsign)
    ))
}

fn url_component(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Normalize a nearby-payloads response. Entries without a numeric
/// position are skipped.
pub fn parse_payloads(body: &Value) -> Vec<PositionReport> {
    let Some(entries) = body.as_object() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|(key, entry)| {
            let report = parse_entry(key, entry);
            if report.is_none() {
                debug!(payload = %key, "Skipping SondeHub entry without usable position");
            }
            report
        })
        .collect()
}

fn parse_entry(key: &str, entry: &Value) -> Option<PositionReport> {
    let latest = match entry {
        Value::Array(points) => points.last()?,
        other => other,
    };
    let latest = latest.as_object()?;

    let latitude = number(latest, "lat")?;
    let longitude = number(latest, "lon")?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    let identifier = text(latest, "payload_callsign").unwrap_or_else(|| key.to_string());
    if identifier.trim().is_empty() {
        return None;
    }

    let (altitude_m, altitude_ft) = altitude_pair(number(latest, "alt"));
    let horizontal_speed = number(latest, "vel_h");

    Some(PositionReport {
        callsign: Some(identifier.clone()),
        identifier,
        latitude,
        longitude,
        altitude_m,
        altitude_ft,
        heading: number(latest, "heading").map(|h| h.round() as i32),
        horizontal_speed_mps: horizontal_speed,
        ground_speed_knots: horizontal_speed.map(|v| (v * KNOTS_PER_MPS).round() as i32),
        vertical_speed_mps: number(latest, "vel_v"),
        on_ground: false,
        timestamp: timestamp(latest, "datetime").or_else(|| timestamp(latest, "time_received")),
        details: ObjectDetails::Balloon {
            payload_type: text(latest, "type"),
            manufacturer: text(latest, "manufacturer"),
            frequency: number(latest, "frequency"),
            uploader_callsign: text(latest, "uploader_callsign"),
            burst_timer: number(latest, "burst_timer").map(|t| t as i64),
        },
    })
}

/// Flatten a telemetry-history response, which is either an array of
/// points or `{ callsign: { timestamp: point } }`, into time order
pub fn parse_telemetry_history(body: &Value) -> Vec<TelemetryPoint> {
    let mut points: Vec<TelemetryPoint> = match body {
        Value::Array(entries) => entries.iter().filter_map(parse_point).collect(),
        Value::Object(by_payload) => by_payload
            .values()
            .filter_map(Value::as_object)
            .flat_map(|by_time| by_time.values())
            .filter_map(parse_point)
            .collect(),
        _ => Vec::new(),
    };

    points.sort_by_key(|p| p.datetime);
    points
}

fn parse_point(entry: &Value) -> Option<TelemetryPoint> {
    let entry = entry.as_object()?;
    let (altitude_m, _) = altitude_pair(number(entry, "alt"));
    Some(TelemetryPoint {
        datetime: timestamp(entry, "datetime"),
        latitude: number(entry, "lat")?,
        longitude: number(entry, "lon")?,
        altitude_m,
        horizontal_speed_mps: number(entry, "vel_h"),
        vertical_speed_mps: number(entry, "vel_v"),
        heading: number(entry, "heading").map(|h| h.round() as i32),
    })
}

fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match object.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(object: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = object.get(key)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
