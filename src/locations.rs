use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed ground point from which proximity is measured.
///
/// `name` is the join key between session state, history and the saved
/// locations list, so two locations with the same name are the same
/// location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserverLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Detection radius in the tracker domain's distance unit
    pub radius: f64,
    pub created_at: DateTime<Utc>,
}

impl ObserverLocation {
    /// Validated constructor; this is the only gate between user input and the tracker
    pub fn new(
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        radius: f64,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            bail!("Location name must not be empty");
        }
        validate_coords(latitude, longitude)?;
        validate_radius(radius)?;

        Ok(Self {
            name,
            latitude,
            longitude,
            radius,
            created_at,
        })
    }

    /// Copy of this location with a new detection radius
    pub fn with_radius(&self, radius: f64) -> Result<Self> {
        validate_radius(radius)?;
        Ok(Self {
            radius,
            ..self.clone()
        })
    }

    /// Human-readable coordinates, e.g. `47.6062N, 122.3321W`
    pub fn format_coords(&self) -> String {
        format_coords(self.latitude, self.longitude)
    }
}

pub fn validate_coords(latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !longitude.is_finite() {
        bail!("Invalid coordinates");
    }
    if !(-90.0..=90.0).contains(&latitude) {
        bail!("Latitude must be -90 to 90, got {}", latitude);
    }
    if !(-180.0..=180.0).contains(&longitude) {
        bail!("Longitude must be -180 to 180, got {}", longitude);
    }
    Ok(())
}

pub fn validate_radius(radius: f64) -> Result<()> {
    if !radius.is_finite() || radius <= 0.0 {
        bail!("Detection radius must be a positive number, got {}", radius);
    }
    Ok(())
}

/// Parse and validate user-typed coordinates
pub fn parse_coords(latitude: &str, longitude: &str) -> Result<(f64, f64)> {
    let (Ok(lat), Ok(lon)) = (
        latitude.trim().parse::<f64>(),
        longitude.trim().parse::<f64>(),
    ) else {
        bail!("Invalid coordinates: '{}', '{}'", latitude, longitude);
    };
    validate_coords(lat, lon)?;
    Ok((lat, lon))
}

pub fn format_coords(latitude: f64, longitude: f64) -> String {
    let lat_dir = if latitude >= 0.0 { 'N' } else { 'S' };
    let lon_dir = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.4}{}, {:.4}{}",
        latitude.abs(),
        lat_dir,
        longitude.abs(),
        lon_dir
    )
}
