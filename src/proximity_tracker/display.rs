use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TrackingRecord;
use crate::geo::DistanceUnit;
use crate::history_repo::HistoryEntry;
use crate::locations::ObserverLocation;
use crate::stats::Stats;

/// Point on an object's recent path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// History list row; still-active objects are marked and carry their live distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub is_active: bool,
    pub current_distance: Option<f64>,
}

impl HistoryRow {
    pub(crate) fn active(record: &TrackingRecord, location_name: &str) -> Self {
        Self {
            entry: record.to_history_entry(location_name, record.last_seen),
            is_active: true,
            current_distance: Some(record.current_distance),
        }
    }

    pub(crate) fn archived(entry: HistoryEntry) -> Self {
        Self {
            entry,
            is_active: false,
            current_distance: None,
        }
    }
}

/// Everything a renderer needs after one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayBundle {
    pub location: ObserverLocation,
    pub distance_unit: DistanceUnit,
    /// In-radius objects, closest first
    pub active: Vec<TrackingRecord>,
    pub history: Vec<HistoryRow>,
    pub trails: BTreeMap<String, Vec<TrailPoint>>,
    pub stats: Stats,
    pub generated_at: DateTime<Utc>,
}

impl DisplayBundle {
    /// Closest in-radius object, if any
    pub fn closest(&self) -> Option<&TrackingRecord> {
        self.active.first()
    }
}

pub(crate) fn trail(record: &TrackingRecord) -> Vec<TrailPoint> {
    record
        .positions
        .iter()
        .map(|p| TrailPoint {
            latitude: p.latitude,
            longitude: p.longitude,
            timestamp: p.timestamp,
        })
        .collect()
}
