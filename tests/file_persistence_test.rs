//! Tracker restarts against file-backed stores

mod common;

use chrono::{Duration, Utc};
use common::{aircraft, location, report, t0};
use overhead::domain::TrackerDomain;
use overhead::history_repo::{FileHistoryStore, HistoryStore};
use overhead::proximity_tracker::{ClearScope, ProximityTracker, TrackerConfig};
use overhead::session_repo::{FileSessionStore, SessionStore};
use overhead::settings::StoragePaths;

fn file_tracker(paths: &StoragePaths, name: &str, domain: TrackerDomain) -> ProximityTracker {
    let radius = domain.default_radius();
    ProximityTracker::new(
        TrackerConfig::for_domain(domain),
        location(name, radius),
        Box::new(FileHistoryStore::new(paths.history.clone())),
        Box::new(FileSessionStore::new(paths.session.clone())),
    )
}

#[test]
fn test_session_survives_restart_for_same_location() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::new(dir.path(), TrackerDomain::Aircraft);

    let mut first = file_tracker(&paths, "Home", TrackerDomain::Aircraft);
    first.process_snapshot(&[aircraft("abc123", 2.0, 0.0)], t0()).unwrap();
    drop(first);

    let mut restarted = file_tracker(&paths, "Home", TrackerDomain::Aircraft);
    assert!(restarted.tracked().contains_key("abc123"));

    // The restored record keeps its original first_seen
    let gone = t0() + Duration::minutes(5);
    restarted.process_snapshot(&[], gone).unwrap();
    let history = FileHistoryStore::new(paths.history.clone())
        .query(Some("Home"), gone)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].first_seen, t0());
}

#[test]
fn test_restart_under_other_location_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::new(dir.path(), TrackerDomain::Aircraft);

    let mut home = file_tracker(&paths, "Home", TrackerDomain::Aircraft);
    home.process_snapshot(&[aircraft("abc123", 2.0, 0.0)], t0()).unwrap();
    drop(home);

    let cabin = file_tracker(&paths, "Cabin", TrackerDomain::Aircraft);
    assert!(cabin.tracked().is_empty());
}

#[test]
fn test_corrupt_session_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::new(dir.path(), TrackerDomain::Aircraft);
    std::fs::create_dir_all(paths.session.parent().unwrap()).unwrap();
    std::fs::write(&paths.session, "{\"location\": 42").unwrap();

    let mut tracker = file_tracker(&paths, "Home", TrackerDomain::Aircraft);
    assert!(tracker.tracked().is_empty());

    // The next poll overwrites the corrupt file with a valid session
    tracker.process_snapshot(&[aircraft("abc123", 2.0, 0.0)], t0()).unwrap();
    let saved = FileSessionStore::new(paths.session.clone()).load().unwrap().unwrap();
    assert_eq!(saved.location.name, "Home");
    assert!(saved.active.contains_key("abc123"));
}

#[test]
fn test_clear_all_locations_empties_history_and_session() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::new(dir.path(), TrackerDomain::Aircraft);

    let history = FileHistoryStore::new(paths.history.clone());
    let mut cabin = file_tracker(&paths, "Cabin", TrackerDomain::Aircraft);
    cabin.process_snapshot(&[aircraft("cab001", 1.0, 0.0)], t0()).unwrap();
    cabin.process_snapshot(&[], t0() + Duration::minutes(3)).unwrap();
    drop(cabin);

    let mut home = file_tracker(&paths, "Home", TrackerDomain::Aircraft);
    home.process_snapshot(&[aircraft("hom001", 1.0, 0.0)], t0()).unwrap();
    home.process_snapshot(&[aircraft("hom002", 1.0, 0.0)], t0()).unwrap();

    let removed = home.clear_history(ClearScope::AllLocations, t0()).unwrap();
    assert_eq!(removed, 2);
    assert!(home.tracked().is_empty());
    assert!(history.all().unwrap().is_empty());

    let session = FileSessionStore::new(paths.session.clone()).load().unwrap().unwrap();
    assert!(session.active.is_empty());
}

#[test]
fn test_balloon_domain_uses_kilometers() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StoragePaths::new(dir.path(), TrackerDomain::Balloon);

    let mut tracker = file_tracker(&paths, "Launch", TrackerDomain::Balloon);
    let bundle = tracker
        .process_snapshot(
            &[
                report(TrackerDomain::Balloon, "HORUS", 150.0, 90.0, Some(20_000)),
                report(TrackerDomain::Balloon, "FAR", 250.0, 90.0, Some(30_000)),
            ],
            t0(),
        )
        .unwrap();

    assert_eq!(bundle.active.len(), 1);
    assert!((bundle.active[0].current_distance - 150.0).abs() < 1e-6);
    assert_eq!(bundle.trails["HORUS"].len(), 1);

    let stats = tracker.display_data_in(t0(), &Utc).unwrap().stats;
    assert_eq!(stats.avg_altitude, Some(20_000));
    assert!(paths.session.ends_with("balloon/session.json"));
}
