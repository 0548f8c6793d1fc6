pub mod backfill;
pub mod export;
pub mod history;
pub mod locations;
pub mod payload_history;
pub mod watch;

pub use backfill::handle_backfill;
pub use export::{handle_export, handle_import};
pub use history::{handle_history_clear, handle_history_show};
pub use locations::{
    handle_locations_add, handle_locations_list, handle_locations_remove, handle_locations_use,
};
pub use payload_history::handle_payload_history;
pub use watch::handle_watch;

use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::debug;

use overhead::domain::TrackerDomain;
use overhead::history_repo::FileHistoryStore;
use overhead::locations::ObserverLocation;
use overhead::locations_repo::LocationsRepository;
use overhead::proximity_tracker::{ProximityTracker, TrackerConfig};
use overhead::session_repo::FileSessionStore;
use overhead::settings::{Settings, StoragePaths, settings_path};

/// Settings and file locations shared by every subcommand
pub struct AppContext {
    pub settings_path: PathBuf,
    pub settings: Settings,
    pub paths: StoragePaths,
}

impl AppContext {
    /// Load settings from the resolved path; `domain` overrides the configured domain
    pub fn load(domain: Option<TrackerDomain>) -> Result<Self> {
        let settings_path = settings_path();
        let mut settings = Settings::load(&settings_path)?;
        if let Some(domain) = domain {
            settings.domain = domain;
        }
        let paths = settings.storage_paths();
        debug!(?settings_path, ?paths, domain = %settings.domain, "Loaded settings");

        Ok(Self {
            settings_path,
            settings,
            paths,
        })
    }

    pub fn domain(&self) -> TrackerDomain {
        self.settings.domain
    }

    pub fn locations(&self) -> LocationsRepository {
        LocationsRepository::new(self.paths.locations.clone())
    }

    pub fn history(&self) -> FileHistoryStore {
        FileHistoryStore::new(self.paths.history.clone())
    }

    pub fn session(&self) -> FileSessionStore {
        FileSessionStore::new(self.paths.session.clone())
    }

    /// The named location, else the active one from settings, else the only saved one
    pub fn resolve_location(&self, name: Option<&str>) -> Result<ObserverLocation> {
        let locations = self.locations();
        let wanted = name.or(self.settings.active_location.as_deref());

        if let Some(wanted) = wanted {
            return match locations.get(wanted)? {
                Some(location) => Ok(location),
                None => bail!("No saved location named '{}'", wanted),
            };
        }

        let mut saved = locations.list()?;
        match saved.len() {
            0 => bail!("No saved locations; add one with `overhead locations add`"),
            1 => Ok(saved.remove(0)),
            _ => bail!("Several saved locations; pick one with `overhead locations use <name>`"),
        }
    }

    pub fn tracker(&self, location: ObserverLocation) -> ProximityTracker {
        ProximityTracker::new(
            TrackerConfig::for_domain(self.domain()),
            location,
            Box::new(self.history()),
            Box::new(self.session()),
        )
    }
}
