use metrics::gauge;
use std::collections::HashMap;

use super::TrackingRecord;

/// Refresh tracker gauges; called after every mutation of the active map
pub(crate) fn update_tracker_metrics(active: &HashMap<String, TrackingRecord>, radius: f64) {
    let in_radius = active
        .values()
        .filter(|r| r.current_distance <= radius)
        .count();

    gauge!("proximity_tracker.active_objects").set(active.len() as f64);
    gauge!("proximity_tracker.in_radius_objects").set(in_radius as f64);
}
