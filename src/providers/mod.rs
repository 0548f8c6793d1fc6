pub mod opensky;
mod rate_limit;
pub mod sondehub;

pub use opensky::OpenSkyClient;
pub use rate_limit::RateLimiter;
pub use sondehub::SondeHubClient;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::TrackerDomain;
use crate::locations::ObserverLocation;
use crate::position::PositionReport;

/// A source of position reports around an observer.
///
/// `Err` means the poll failed and must not be treated as an empty sky;
/// `Ok(vec![])` means the provider answered with zero objects.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        location: &ObserverLocation,
        fetch_radius: f64,
    ) -> Result<Vec<PositionReport>>;
}

/// The provider that serves a tracker domain, talking to its public endpoint
pub fn provider_for(domain: TrackerDomain, client: reqwest::Client) -> Arc<dyn TelemetryProvider> {
    match domain {
        TrackerDomain::Aircraft => Arc::new(OpenSkyClient::new(client, opensky::DEFAULT_BASE_URL)),
        TrackerDomain::Balloon => {
            Arc::new(SondeHubClient::new(client, sondehub::DEFAULT_BASE_URL))
        }
    }
}

/// Shared HTTP client with a request timeout
pub fn http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("overhead/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    Ok(client)
}
