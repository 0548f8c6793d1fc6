use anyhow::{Result, bail};
use chrono::Utc;
use tracing::info;

use overhead::locations::{ObserverLocation, parse_coords};

use super::AppContext;

pub fn handle_locations_list(ctx: &AppContext) -> Result<()> {
    let locations = ctx.locations().list()?;
    if locations.is_empty() {
        println!("No saved locations");
        return Ok(());
    }

    let unit = ctx.domain().distance_unit();
    let active = ctx.settings.active_location.as_deref();
    for location in locations {
        let marker = if Some(location.name.as_str()) == active {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<20} {:<24} radius {} {}",
            marker,
            location.name,
            location.format_coords(),
            location.radius,
            unit
        );
    }
    Ok(())
}

/// Save a location (replacing one with the same name)
pub fn handle_locations_add(
    ctx: &AppContext,
    name: &str,
    latitude: &str,
    longitude: &str,
    radius: Option<f64>,
) -> Result<()> {
    let (lat, lon) = parse_coords(latitude, longitude)?;
    let radius = radius.unwrap_or_else(|| ctx.domain().default_radius());
    let location = ObserverLocation::new(name, lat, lon, radius, Utc::now())?;

    let saved = ctx.locations().upsert(location)?;
    println!(
        "Saved {} at {} (radius {} {})",
        saved.name,
        saved.format_coords(),
        saved.radius,
        ctx.domain().distance_unit()
    );
    Ok(())
}

pub fn handle_locations_remove(ctx: &AppContext, name: &str) -> Result<()> {
    if !ctx.locations().remove(name)? {
        bail!("No saved location named '{}'", name);
    }

    if ctx.settings.active_location.as_deref() == Some(name) {
        let mut settings = ctx.settings.clone();
        settings.active_location = None;
        settings.save(&ctx.settings_path)?;
        info!(name, "Removed location was active; no location is active now");
    }
    println!("Removed {}", name);
    Ok(())
}

/// Make a saved location the active one, optionally changing its radius
pub fn handle_locations_use(ctx: &AppContext, name: &str, radius: Option<f64>) -> Result<()> {
    let repo = ctx.locations();
    let location = match radius {
        Some(radius) => repo.update_radius(name, radius)?,
        None => match repo.get(name)? {
            Some(location) => location,
            None => bail!("No saved location named '{}'", name),
        },
    };

    let mut settings = ctx.settings.clone();
    settings.active_location = Some(location.name.clone());
    settings.save(&ctx.settings_path)?;
    println!(
        "Active location: {} (radius {} {})",
        location.name,
        location.radius,
        ctx.domain().distance_unit()
    );
    Ok(())
}
