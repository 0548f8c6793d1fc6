use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::json_file;
use crate::locations::ObserverLocation;
use crate::proximity_tracker::TrackingRecord;

/// Snapshot of the live tracker, saved after every poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Location the active map was built against
    pub location: ObserverLocation,
    pub active: HashMap<String, TrackingRecord>,
    pub saved_at: DateTime<Utc>,
}

/// Short-lived storage for the active map
pub trait SessionStore: Send {
    fn load(&self) -> Result<Option<SessionState>>;
    fn save(&mut self, state: &SessionState) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Option<SessionState>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a session, as if a previous run had saved it
    pub fn with_state(state: SessionState) -> Self {
        Self { state: Some(state) }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &SessionState) -> Result<()> {
        self.state = Some(state.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}

/// Session kept in a JSON file in the data directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionState>> {
        json_file::load(&self.path)
    }

    fn save(&mut self, state: &SessionState) -> Result<()> {
        json_file::save(&self.path, state)
    }

    fn clear(&mut self) -> Result<()> {
        json_file::remove(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState {
            location: ObserverLocation::new("Home", 47.6062, -122.3321, 5.0, Utc::now()).unwrap(),
            active: HashMap::new(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_file_session_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSessionStore::new(dir.path().join("session.json"));
        assert!(store.load().unwrap().is_none());

        let saved = state();
        store.save(&saved).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(FileSessionStore::new(path).load().is_err());
    }
}
