use anyhow::Result;
use chrono::Utc;
use tracing::info;

use overhead::poller::{backfill, backfill_radius};
use overhead::position::ReportFilter;
use overhead::providers::{http_client, provider_for};

use super::AppContext;
use super::watch::render_summary;

/// One-shot wider scan that picks up objects heard within the last hour
pub async fn handle_backfill(ctx: &AppContext, location: Option<&str>) -> Result<()> {
    let location = ctx.resolve_location(location)?;
    let domain = ctx.domain();
    info!(
        location = %location.name,
        radius = backfill_radius(domain, location.radius),
        "Scanning wider area"
    );

    let mut tracker = ctx.tracker(location);
    let provider = provider_for(domain, http_client()?);
    let filter = ReportFilter::for_domain(domain, Some(ctx.settings.max_altitude()));

    let (recent, bundle) =
        backfill(&mut tracker, provider.as_ref(), domain, &filter, Utc::now()).await?;

    println!(
        "Found {} recent {}, {} currently in range",
        recent,
        domain.object_noun(),
        bundle.stats.active_count
    );
    println!("{}", render_summary(&bundle, domain));
    Ok(())
}
