use anyhow::Result;
use chrono::{Local, Utc};

use overhead::domain::AltitudeUnit;
use overhead::history_repo::HistoryStore;
use overhead::proximity_tracker::ClearScope;
use overhead::session_repo::SessionStore;

use super::AppContext;

/// Print archived encounters, newest first
pub fn handle_history_show(
    ctx: &AppContext,
    location: Option<&str>,
    all_locations: bool,
    json: bool,
) -> Result<()> {
    let location_name = if all_locations {
        None
    } else {
        Some(ctx.resolve_location(location)?.name)
    };
    let entries = ctx.history().query(location_name.as_deref(), Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No encounters in the last 7 days");
        return Ok(());
    }

    let unit = ctx.domain().distance_unit();
    let altitude_unit = ctx.domain().altitude_unit();
    for entry in entries {
        let name = entry.callsign.as_deref().unwrap_or(&entry.identifier);
        let altitude = match altitude_unit {
            AltitudeUnit::Feet => entry.closest_altitude_ft,
            AltitudeUnit::Meters => entry.closest_altitude_m,
        };
        println!(
            "{}  {:<10} closest {:.1} {} {:<3} {:>8}  {} min  [{}]",
            entry.last_seen.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            name,
            entry.closest_distance,
            unit,
            entry.closest_direction,
            altitude
                .map(|a| format!("{} {}", a, altitude_unit.abbreviation()))
                .unwrap_or_else(|| "-".to_string()),
            entry.duration_seconds / 60,
            entry.location_name
        );
    }
    Ok(())
}

/// Clear archived encounters and the live session for one location or all
pub fn handle_history_clear(
    ctx: &AppContext,
    location: Option<&str>,
    all_locations: bool,
) -> Result<()> {
    let scope = if all_locations {
        ClearScope::AllLocations
    } else {
        ClearScope::CurrentLocation
    };

    let (removed, name) = match ctx.resolve_location(location) {
        Ok(location) => {
            let name = location.name.clone();
            (ctx.tracker(location).clear_history(scope, Utc::now())?, name)
        }
        // Clearing everything does not need a location to be configured
        Err(_) if all_locations => {
            let removed = ctx.history().clear(None)?;
            ctx.session().clear()?;
            (removed, String::new())
        }
        Err(e) => return Err(e),
    };

    match scope {
        ClearScope::AllLocations => println!("Removed {} encounters for all locations", removed),
        ClearScope::CurrentLocation => println!("Removed {} encounters for {}", removed, name),
    }
    Ok(())
}
