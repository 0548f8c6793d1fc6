use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::geo::CompassPoint;
use crate::json_file;
use crate::position::ObjectDetails;

/// Entries whose `last_seen` is older than this are invisible and get pruned
pub const RETENTION: Duration = Duration::days(7);

/// Appends for the same object and location closer together than this are one encounter
pub const MERGE_WINDOW: Duration = Duration::hours(1);

/// One complete encounter with an object, from appearance to disappearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub identifier: String,
    pub callsign: Option<String>,
    /// Name of the observer location that saw the encounter
    pub location_name: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub duration_seconds: i64,
    pub closest_distance: f64,
    pub closest_bearing: f64,
    pub closest_direction: CompassPoint,
    pub closest_altitude_ft: Option<i32>,
    pub closest_altitude_m: Option<i32>,
    pub closest_time: DateTime<Utc>,
    pub details: ObjectDetails,
}

impl HistoryEntry {
    fn same_encounter(&self, other: &HistoryEntry) -> bool {
        self.identifier == other.identifier
            && self.location_name == other.location_name
            && (self.last_seen - other.last_seen).abs() < MERGE_WINDOW
    }

    /// Fold a later finalization of the same encounter into this entry
    fn merge(&mut self, newer: HistoryEntry) {
        self.first_seen = self.first_seen.min(newer.first_seen);
        self.last_seen = self.last_seen.max(newer.last_seen);

        if newer.closest_distance < self.closest_distance {
            self.closest_distance = newer.closest_distance;
            self.closest_bearing = newer.closest_bearing;
            self.closest_direction = newer.closest_direction;
            self.closest_altitude_ft = newer.closest_altitude_ft;
            self.closest_altitude_m = newer.closest_altitude_m;
            self.closest_time = newer.closest_time;
        }

        if newer.callsign.is_some() {
            self.callsign = newer.callsign;
        }
        self.details = newer.details;
        self.duration_seconds = (self.last_seen - self.first_seen).num_seconds();
    }

    fn is_retained(&self, now: DateTime<Utc>) -> bool {
        self.last_seen > now - RETENTION
    }
}

/// Long-term, per-location archive of finalized encounters
pub trait HistoryStore: Send {
    /// Archive an encounter for `location_name`, merging continuations
    fn append(&mut self, location_name: &str, entry: HistoryEntry, now: DateTime<Utc>)
    -> Result<()>;

    /// Retained entries, newest first, optionally for one location
    fn query(&self, location_name: Option<&str>, now: DateTime<Utc>) -> Result<Vec<HistoryEntry>>;

    /// Remove entries for one location or for all; returns how many were removed
    fn clear(&mut self, location_name: Option<&str>) -> Result<usize>;

    /// Everything stored, for export
    fn all(&self) -> Result<Vec<HistoryEntry>>;

    /// Overwrite the archive, for import
    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()>;
}

fn append_entry(
    entries: &mut Vec<HistoryEntry>,
    location_name: &str,
    mut entry: HistoryEntry,
    now: DateTime<Utc>,
) {
    entry.location_name = location_name.to_string();
    entries.retain(|e| e.is_retained(now));

    match entries.iter_mut().find(|e| e.same_encounter(&entry)) {
        Some(existing) => {
            debug!(
                identifier = %entry.identifier,
                location = %location_name,
                "Merging continuation into existing history entry"
            );
            existing.merge(entry);
        }
        None => {
            debug!(
                identifier = %entry.identifier,
                location = %location_name,
                closest = entry.closest_distance,
                "Archiving encounter"
            );
            entries.push(entry);
        }
    }
}

fn select(
    entries: &[HistoryEntry],
    location_name: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let mut selected: Vec<HistoryEntry> = entries
        .iter()
        .filter(|e| e.is_retained(now))
        .filter(|e| location_name.is_none_or(|name| e.location_name == name))
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    selected
}

fn remove_matching(entries: &mut Vec<HistoryEntry>, location_name: Option<&str>) -> usize {
    let before = entries.len();
    match location_name {
        Some(name) => entries.retain(|e| e.location_name != name),
        None => entries.clear(),
    }
    let removed = before - entries.len();
    info!(
        location = location_name.unwrap_or("all"),
        removed, "Cleared history"
    );
    removed
}

/// History kept in memory only; used by tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: Vec<HistoryEntry>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(
        &mut self,
        location_name: &str,
        entry: HistoryEntry,
        now: DateTime<Utc>,
    ) -> Result<()> {
        append_entry(&mut self.entries, location_name, entry, now);
        Ok(())
    }

    fn query(&self, location_name: Option<&str>, now: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        Ok(select(&self.entries, location_name, now))
    }

    fn clear(&mut self, location_name: Option<&str>) -> Result<usize> {
        Ok(remove_matching(&mut self.entries, location_name))
    }

    fn all(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.entries.clone())
    }

    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()> {
        self.entries = entries;
        Ok(())
    }
}

/// History persisted as one JSON array, rewritten atomically on each change
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<Vec<HistoryEntry>> {
        Ok(json_file::load(&self.path)?.unwrap_or_default())
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(
        &mut self,
        location_name: &str,
        entry: HistoryEntry,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut entries = self.load()?;
        append_entry(&mut entries, location_name, entry, now);
        json_file::save(&self.path, &entries)
    }

    fn query(&self, location_name: Option<&str>, now: DateTime<Utc>) -> Result<Vec<HistoryEntry>> {
        Ok(select(&self.load()?, location_name, now))
    }

    fn clear(&mut self, location_name: Option<&str>) -> Result<usize> {
        let mut entries = self.load()?;
        let removed = remove_matching(&mut entries, location_name);
        json_file::save(&self.path, &entries)?;
        Ok(removed)
    }

    fn all(&self) -> Result<Vec<HistoryEntry>> {
        self.load()
    }

    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()> {
        json_file::save(&self.path, &entries)
    }
}
