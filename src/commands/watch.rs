use anyhow::Result;
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use overhead::domain::TrackerDomain;
use overhead::poller::{Poller, PollerConfig};
use overhead::providers::{http_client, provider_for};
use overhead::proximity_tracker::DisplayBundle;

use super::AppContext;

/// Poll continuously and print a summary after every update
pub async fn handle_watch(ctx: &AppContext, location: Option<&str>, json: bool) -> Result<()> {
    let location = ctx.resolve_location(location)?;
    let domain = ctx.domain();
    let config = PollerConfig::from_settings(&ctx.settings)?;

    info!(
        location = %location.name,
        coords = %location.format_coords(),
        radius = location.radius,
        unit = %domain.distance_unit(),
        "Watching for {}",
        domain.object_noun()
    );

    let tracker = ctx.tracker(location);
    let provider = provider_for(domain, http_client()?);
    let cancel = CancellationToken::new();
    let (poller, handle) = Poller::new(tracker, provider, config, cancel.clone());
    let mut display = handle.subscribe();
    let poller_task = tokio::spawn(poller.run());

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal (Ctrl+C), stopping"),
            Err(e) => warn!(error = %e, "Unable to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let bundle = display.borrow_and_update().clone();
                if let Some(bundle) = bundle {
                    if json {
                        println!("{}", serde_json::to_string(&bundle)?);
                    } else {
                        println!("{}", render_summary(&bundle, domain));
                    }
                }
            }
        }
    }

    poller_task.await?;
    Ok(())
}

pub(crate) fn render_summary(bundle: &DisplayBundle, domain: TrackerDomain) -> String {
    let unit = bundle.distance_unit.abbreviation();
    let stats = &bundle.stats;
    let altitude_unit = stats.altitude_unit.abbreviation();
    let mut lines = vec![format!(
        "[{}] {} - {} in range, {} today, {} total",
        bundle.generated_at.with_timezone(&Local).format("%H:%M:%S"),
        bundle.location.name,
        stats.active_count,
        stats.today_count,
        stats.total_count
    )];

    for record in &bundle.active {
        let name = record.callsign.as_deref().unwrap_or(&record.identifier);
        let altitude = record
            .current_altitude(stats.altitude_unit)
            .map(|a| format!("{} {}", a, altitude_unit))
            .unwrap_or_else(|| "alt unknown".to_string());
        lines.push(format!(
            "  {:<10} {:>6.1} {} {:<3}  {}  closest {:.1} {}",
            name,
            record.current_distance,
            unit,
            record.current_direction,
            altitude,
            record.closest_distance,
            unit
        ));
    }

    if let Some(closest) = stats.closest_today {
        lines.push(format!("  closest today: {:.1} {}", closest, unit));
    }
    if let Some(avg) = stats.avg_altitude {
        lines.push(format!("  average {} altitude: {} {}", domain, avg, altitude_unit));
    }
    lines.join("\n")
}

