//! Proximity tracking and closest-approach engine.
//!
//! Each poll hands the tracker the full set of objects the provider can
//! currently see. Objects are upserted into the active map, anything that
//! disappeared from the feed is finalized (and archived if it came within
//! the detection radius), and the session is saved so a restart under the
//! same location picks up where it left off.

mod display;
mod tracking_record;
pub(crate) mod utils;

pub use display::{DisplayBundle, HistoryRow, TrailPoint};
pub use tracking_record::{TrackedPosition, TrackingRecord};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::domain::{AltitudeUnit, TrackerDomain};
use crate::geo::DistanceUnit;
use crate::history_repo::{HistoryEntry, HistoryStore};
use crate::locations::{ObserverLocation, validate_radius};
use crate::position::PositionReport;
use crate::session_repo::{SessionState, SessionStore};
use crate::stats;
use tracking_record::Observation;

/// Rows shown in the history list
pub const HISTORY_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    pub distance_unit: DistanceUnit,
    pub altitude_unit: AltitudeUnit,
    pub trail_capacity: usize,
    pub history_window: usize,
}

impl TrackerConfig {
    pub fn for_domain(domain: TrackerDomain) -> Self {
        Self {
            distance_unit: domain.distance_unit(),
            altitude_unit: domain.altitude_unit(),
            trail_capacity: domain.trail_capacity(),
            history_window: HISTORY_WINDOW,
        }
    }
}

/// Which archived encounters `clear_history` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    CurrentLocation,
    AllLocations,
}

pub struct ProximityTracker {
    config: TrackerConfig,
    location: ObserverLocation,
    active: HashMap<String, TrackingRecord>,
    history: Box<dyn HistoryStore>,
    session: Box<dyn SessionStore>,
}

impl ProximityTracker {
    /// Build a tracker for `location`, restoring the saved session if it
    /// belongs to the same location
    pub fn new(
        config: TrackerConfig,
        location: ObserverLocation,
        history: Box<dyn HistoryStore>,
        session: Box<dyn SessionStore>,
    ) -> Self {
        let mut tracker = Self {
            config,
            location: location.clone(),
            active: HashMap::new(),
            history,
            session,
        };
        let prior = tracker.load_session();
        tracker.initialize(location, prior);
        tracker
    }

    /// Set the current location and adopt `prior`'s active map only if it
    /// was built against a location with the same name
    pub fn initialize(&mut self, location: ObserverLocation, prior: Option<SessionState>) {
        self.active = match prior {
            Some(session) if session.location.name == location.name => {
                info!(
                    location = %location.name,
                    restored = session.active.len(),
                    "Restored tracking session"
                );
                session.active
            }
            Some(session) => {
                info!(
                    session_location = %session.location.name,
                    location = %location.name,
                    "Discarding session saved for a different location"
                );
                HashMap::new()
            }
            None => HashMap::new(),
        };
        self.location = location;
        utils::update_tracker_metrics(&self.active, self.location.radius);
    }

    /// Move to another observer location. Active objects of the old
    /// location are dropped without being archived.
    pub fn switch_location(&mut self, location: ObserverLocation, now: DateTime<Utc>) {
        info!(
            from = %self.location.name,
            to = %location.name,
            "Switching observer location"
        );
        let prior = self.load_session();
        self.initialize(location, prior);
        self.persist_session(now);
    }

    /// Feed one complete poll. Every identifier missing from `reports` is
    /// finalized, so a failed fetch must never be passed in as an empty list.
    pub fn process_snapshot(
        &mut self,
        reports: &[PositionReport],
        now: DateTime<Utc>,
    ) -> Result<DisplayBundle> {
        // Duplicate identifiers in one batch: last write wins
        let mut latest: HashMap<&str, &PositionReport> = HashMap::with_capacity(reports.len());
        for report in reports {
            latest.insert(report.identifier.as_str(), report);
        }

        for report in latest.values() {
            self.track(report, now);
        }
        metrics::counter!("proximity_tracker.snapshots_processed_total").increment(1);
        metrics::counter!("proximity_tracker.reports_tracked_total")
            .increment(latest.len() as u64);

        let current: HashSet<String> = latest.keys().map(|id| id.to_string()).collect();
        let departed = self.reconcile(&current, now);
        self.persist_session(now);
        let departed = departed?;

        debug!(
            location = %self.location.name,
            reports = latest.len(),
            active = self.active.len(),
            departed = departed.len(),
            "Processed snapshot"
        );

        utils::update_tracker_metrics(&self.active, self.location.radius);
        self.display_data(now)
    }

    fn track(&mut self, report: &PositionReport, now: DateTime<Utc>) {
        let observation = Observation::of(report, &self.location, self.config.distance_unit);
        let capacity = self.config.trail_capacity;

        match self.active.get_mut(&report.identifier) {
            Some(record) => record.update(report, observation, capacity, now),
            None => {
                debug!(
                    identifier = %report.identifier,
                    callsign = ?report.callsign,
                    distance = observation.distance,
                    direction = %observation.direction,
                    "Started tracking object"
                );
                self.active.insert(
                    report.identifier.clone(),
                    TrackingRecord::new(report, observation, capacity, now),
                );
            }
        }
    }

    /// Finalize every active object whose identifier is not in `current`.
    /// Returns the departed identifiers in sorted order. Objects that could
    /// not be archived stay active and are retried on the next reconcile;
    /// the first such error is returned after every departure was tried.
    pub fn reconcile(
        &mut self,
        current: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut departed: Vec<String> = self
            .active
            .keys()
            .filter(|id| !current.contains(*id))
            .cloned()
            .collect();
        departed.sort();

        let mut first_error = None;
        for identifier in &departed {
            if let Err(e) = self.finalize(identifier, now) {
                warn!(identifier = %identifier, error = %e, "Keeping object until it can be archived");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(departed),
        }
    }

    /// Stop tracking `identifier`. The encounter is archived only if its
    /// closest approach came within the detection radius; the archived
    /// entry is returned. If archiving fails the object stays active.
    pub fn finalize(
        &mut self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<HistoryEntry>> {
        let Some(record) = self.active.get(identifier) else {
            return Ok(None);
        };

        if record.closest_distance > self.location.radius {
            debug!(
                identifier,
                closest = record.closest_distance,
                radius = self.location.radius,
                "Dropping object that never entered the detection radius"
            );
            self.active.remove(identifier);
            metrics::counter!("proximity_tracker.finalized_total", "outcome" => "discarded")
                .increment(1);
            return Ok(None);
        }

        let entry = record.to_history_entry(&self.location.name, now);
        self.history
            .append(&self.location.name, entry.clone(), now)
            .with_context(|| format!("Failed to archive encounter with {}", identifier))?;
        self.active.remove(identifier);

        debug!(
            identifier,
            callsign = ?entry.callsign,
            closest = entry.closest_distance,
            direction = %entry.closest_direction,
            duration_secs = entry.duration_seconds,
            "Archived encounter"
        );
        metrics::counter!("proximity_tracker.finalized_total", "outcome" => "archived")
            .increment(1);
        Ok(Some(entry))
    }

    /// Display data with "today" evaluated in the local time zone
    pub fn display_data(&self, now: DateTime<Utc>) -> Result<DisplayBundle> {
        self.display_data_in(now, &Local)
    }

    pub fn display_data_in<Tz: TimeZone>(
        &self,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<DisplayBundle> {
        let radius = self.location.radius;

        let mut active: Vec<TrackingRecord> = self
            .active
            .values()
            .filter(|r| r.current_distance <= radius)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            a.current_distance
                .total_cmp(&b.current_distance)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });

        let archived: Vec<HistoryEntry> = self
            .history
            .query(Some(&self.location.name), now)?
            .into_iter()
            .filter(|e| e.closest_distance <= radius)
            .collect();

        let history: Vec<HistoryRow> = active
            .iter()
            .map(|r| HistoryRow::active(r, &self.location.name))
            .chain(archived.iter().cloned().map(HistoryRow::archived))
            .take(self.config.history_window)
            .collect();

        let trails: BTreeMap<String, Vec<TrailPoint>> = self
            .active
            .values()
            .map(|r| (r.identifier.clone(), display::trail(r)))
            .collect();

        let stats = stats::compute(&active, &archived, self.config.altitude_unit, now, tz);

        Ok(DisplayBundle {
            location: self.location.clone(),
            distance_unit: self.config.distance_unit,
            active,
            history,
            trails,
            stats,
            generated_at: now,
        })
    }

    /// Change the detection radius. Archived history is untouched; only
    /// what passes the radius filter from now on changes.
    pub fn set_radius(&mut self, radius: f64, now: DateTime<Utc>) -> Result<()> {
        validate_radius(radius)?;
        info!(
            location = %self.location.name,
            from = self.location.radius,
            to = radius,
            "Detection radius changed"
        );
        self.location.radius = radius;
        self.persist_session(now);
        utils::update_tracker_metrics(&self.active, radius);
        Ok(())
    }

    /// Remove archived encounters in `scope` and reset the active map.
    /// Returns how many archived entries were removed.
    pub fn clear_history(&mut self, scope: ClearScope, now: DateTime<Utc>) -> Result<usize> {
        let location_name = match scope {
            ClearScope::CurrentLocation => Some(self.location.name.as_str()),
            ClearScope::AllLocations => None,
        };
        let removed = self.history.clear(location_name)?;
        if removed == 0 && self.active.is_empty() {
            info!(location = %self.location.name, "Nothing to clear");
        }

        self.active.clear();
        self.persist_session(now);
        utils::update_tracker_metrics(&self.active, self.location.radius);
        Ok(removed)
    }

    pub fn location(&self) -> &ObserverLocation {
        &self.location
    }

    /// Every tracked object, including those outside the detection radius
    pub fn tracked(&self) -> &HashMap<String, TrackingRecord> {
        &self.active
    }

    pub fn history_store(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    fn load_session(&self) -> Option<SessionState> {
        match self.session.load() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable tracking session");
                None
            }
        }
    }

    fn persist_session(&mut self, now: DateTime<Utc>) {
        let state = SessionState {
            location: self.location.clone(),
            active: self.active.clone(),
            saved_at: now,
        };
        if let Err(e) = self.session.save(&state) {
            warn!(error = %e, "Failed to save tracking session");
        }
    }
}
