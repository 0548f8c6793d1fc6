//! JSON backup of saved locations, settings and history

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::history_repo::{HistoryEntry, HistoryStore};
use crate::locations::ObserverLocation;
use crate::locations_repo::LocationsRepository;
use crate::settings::Settings;

/// Every section is optional on import; absent sections are left alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ObserverLocation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<DateTime<Utc>>,
}

/// Which sections an import replaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub locations: Option<usize>,
    pub settings: bool,
    pub history: Option<usize>,
}

pub fn export(
    locations: &LocationsRepository,
    settings: &Settings,
    history: &dyn HistoryStore,
    now: DateTime<Utc>,
) -> Result<ExportDocument> {
    Ok(ExportDocument {
        locations: Some(locations.list()?),
        settings: Some(settings.clone()),
        history: Some(history.query(None, now)?),
        exported: Some(now),
    })
}

/// Replace each section present in `document`
pub fn import(
    document: ExportDocument,
    locations: &LocationsRepository,
    settings_path: &Path,
    history: &mut dyn HistoryStore,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    if let Some(imported) = document.locations {
        locations.replace_all(&imported)?;
        summary.locations = Some(imported.len());
    }
    if let Some(imported) = document.settings {
        imported.save(settings_path)?;
        summary.settings = true;
    }
    if let Some(imported) = document.history {
        summary.history = Some(imported.len());
        history.replace_all(imported)?;
    }

    info!(?summary, "Imported backup");
    Ok(summary)
}

pub fn read_document(path: &Path) -> Result<ExportDocument> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history_repo::{FileHistoryStore, MemoryHistoryStore};
    use crate::history_repo::tests::entry;

    #[test]
    fn test_export_then_import_into_empty_data_dir() {
        let source = tempfile::tempdir().unwrap();
        let now = Utc::now();

        let locations = LocationsRepository::new(source.path().join("locations.json"));
        locations
            .upsert(ObserverLocation::new("Home", 47.6062, -122.3321, 5.0, now).unwrap())
            .unwrap();
        let mut history = MemoryHistoryStore::new();
        history.append("Home", entry("abc", now, 2.0), now).unwrap();
        let settings = Settings {
            active_location: Some("Home".to_string()),
            ..Settings::default()
        };

        let document = export(&locations, &settings, &history, now).unwrap();
        let json = serde_json::to_string(&document).unwrap();

        let target = tempfile::tempdir().unwrap();
        let doc_path = target.path().join("backup.json");
        std::fs::write(&doc_path, json).unwrap();

        let target_locations = LocationsRepository::new(target.path().join("locations.json"));
        let settings_path = target.path().join("overhead.toml");
        let mut target_history = FileHistoryStore::new(target.path().join("history.json"));
        let summary = import(
            read_document(&doc_path).unwrap(),
            &target_locations,
            &settings_path,
            &mut target_history,
        )
        .unwrap();

        assert_eq!(summary.locations, Some(1));
        assert!(summary.settings);
        assert_eq!(summary.history, Some(1));
        assert_eq!(target_locations.get("Home").unwrap().unwrap().radius, 5.0);
        assert_eq!(
            Settings::load(&settings_path).unwrap().active_location.as_deref(),
            Some("Home")
        );
        assert_eq!(target_history.query(Some("Home"), now).unwrap().len(), 1);
    }

    #[test]
    fn test_import_leaves_absent_sections_alone() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let locations = LocationsRepository::new(dir.path().join("locations.json"));
        locations
            .upsert(ObserverLocation::new("Home", 47.6062, -122.3321, 5.0, now).unwrap())
            .unwrap();
        let mut history = MemoryHistoryStore::new();

        let document: ExportDocument = serde_json::from_str(r#"{ "history": [] }"#).unwrap();
        let summary = import(
            document,
            &locations,
            &dir.path().join("overhead.toml"),
            &mut history,
        )
        .unwrap();

        assert_eq!(summary.locations, None);
        assert!(!summary.settings);
        assert_eq!(summary.history, Some(0));
        assert_eq!(locations.list().unwrap().len(), 1);
        assert!(!dir.path().join("overhead.toml").exists());
    }
}
