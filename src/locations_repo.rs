use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::json_file;
use crate::locations::ObserverLocation;

/// Saved observer locations, persisted as a JSON array
#[derive(Debug, Clone)]
pub struct LocationsRepository {
    path: PathBuf,
}

impl LocationsRepository {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn list(&self) -> Result<Vec<ObserverLocation>> {
        Ok(json_file::load(&self.path)?.unwrap_or_default())
    }

    pub fn get(&self, name: &str) -> Result<Option<ObserverLocation>> {
        Ok(self.list()?.into_iter().find(|l| l.name == name))
    }

    /// Insert a location, replacing any existing location with the same name
    pub fn upsert(&self, location: ObserverLocation) -> Result<ObserverLocation> {
        let mut locations = self.list()?;
        match locations.iter_mut().find(|l| l.name == location.name) {
            Some(existing) => {
                debug!(name = %location.name, "Replacing saved location");
                *existing = location.clone();
            }
            None => {
                info!(name = %location.name, "Saving new location");
                locations.push(location.clone());
            }
        }
        json_file::save(&self.path, &locations)?;
        Ok(location)
    }

    /// Returns whether a location was removed
    pub fn remove(&self, name: &str) -> Result<bool> {
        let mut locations = self.list()?;
        let before = locations.len();
        locations.retain(|l| l.name != name);
        if locations.len() == before {
            return Ok(false);
        }
        json_file::save(&self.path, &locations)?;
        Ok(true)
    }

    pub fn update_radius(&self, name: &str, radius: f64) -> Result<ObserverLocation> {
        let mut locations = self.list()?;
        let Some(location) = locations.iter_mut().find(|l| l.name == name) else {
            bail!("No saved location named '{}'", name);
        };
        *location = location.with_radius(radius)?;
        let updated = location.clone();
        json_file::save(&self.path, &locations)?;
        Ok(updated)
    }

    /// Replace the whole list (used by import)
    pub fn replace_all(&self, locations: &[ObserverLocation]) -> Result<()> {
        json_file::save(&self.path, &locations)
    }
}
