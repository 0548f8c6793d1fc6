//! Presentation statistics derived from live and archived encounters

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::AltitudeUnit;
use crate::history_repo::HistoryEntry;
use crate::proximity_tracker::TrackingRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub active_count: usize,
    /// Archived encounters that ended on the observer's current calendar day
    pub today_count: usize,
    pub total_count: usize,
    pub closest_today: Option<f64>,
    pub avg_altitude: Option<i32>,
    pub max_altitude: Option<i32>,
    pub altitude_unit: AltitudeUnit,
}

/// Compute stats with "today" evaluated in `tz`.
///
/// A missing altitude counts as zero toward the average, but if no active
/// object reports an altitude the average is `None` rather than zero.
pub fn compute<Tz: TimeZone>(
    active: &[TrackingRecord],
    history: &[HistoryEntry],
    altitude_unit: AltitudeUnit,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Stats {
    let today = now.with_timezone(tz).date_naive();
    let todays: Vec<&HistoryEntry> = history
        .iter()
        .filter(|e| e.last_seen.with_timezone(tz).date_naive() == today)
        .collect();

    let closest_today = todays
        .iter()
        .map(|e| e.closest_distance)
        .min_by(|a, b| a.total_cmp(b));

    let altitudes: Vec<Option<i32>> = active
        .iter()
        .map(|r| r.current_altitude(altitude_unit))
        .collect();
    let any_altitude = altitudes.iter().any(Option::is_some);

    let avg_altitude = if any_altitude {
        let sum: i64 = altitudes.iter().map(|a| a.unwrap_or(0) as i64).sum();
        Some((sum as f64 / altitudes.len() as f64).round() as i32)
    } else {
        None
    };
    let max_altitude = altitudes.iter().flatten().copied().max();

    Stats {
        active_count: active.len(),
        today_count: todays.len(),
        total_count: history.len(),
        closest_today,
        avg_altitude,
        max_altitude,
        altitude_unit,
    }
}
