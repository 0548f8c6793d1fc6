use anyhow::{Result, bail};
use chrono::Duration;

use overhead::providers::SondeHubClient;
use overhead::providers::http_client;
use overhead::providers::sondehub::{self, DEFAULT_TELEMETRY_LOOKBACK};

/// Print a balloon payload's recent flight path
pub async fn handle_payload_history(callsign: &str, hours: Option<i64>, json: bool) -> Result<()> {
    let client = SondeHubClient::new(http_client()?, sondehub::DEFAULT_BASE_URL);
    let lookback = telemetry_lookback(hours)?;
    let points = client.payload_telemetry(callsign, lookback).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    println!("{} points for {}", points.len(), callsign);
    for point in &points {
        let when = point
            .datetime
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let altitude = point
            .altitude_m
            .map(|a| format!("{} m", a))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:>9.4} {:>10.4}  {:>8}",
            when, point.latitude, point.longitude, altitude
        );
    }
    if let Some(url) = sondehub::tracker_url(callsign) {
        println!("Map: {}", url);
    }
    Ok(())
}

fn telemetry_lookback(hours: Option<i64>) -> Result<Duration> {
    let Some(hours) = hours else {
        return Ok(DEFAULT_TELEMETRY_LOOKBACK);
    };
    if hours <= 0 {
        bail!("--hours must be positive, got {}", hours);
    }
    match Duration::try_hours(hours) {
        Some(lookback) => Ok(lookback),
        None => bail!("--hours {} is out of range", hours),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_lookback() {
        assert_eq!(telemetry_lookback(None).unwrap(), DEFAULT_TELEMETRY_LOOKBACK);
        assert_eq!(telemetry_lookback(Some(12)).unwrap(), Duration::hours(12));
        assert!(telemetry_lookback(Some(0)).is_err());
        assert!(telemetry_lookback(Some(-3)).is_err());
        assert!(telemetry_lookback(Some(i64::MAX)).is_err());
    }
}
