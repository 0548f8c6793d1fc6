//! Serial poll loop driving a [`ProximityTracker`].
//!
//! One poll runs at a time: fetch, filter, process, publish, then sleep for
//! the refresh interval. Commands are handled while a fetch is in flight;
//! a response for a location the tracker has since left is thrown away.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::TrackerDomain;
use crate::locations::ObserverLocation;
use crate::position::{PositionReport, ReportFilter};
use crate::providers::TelemetryProvider;
use crate::proximity_tracker::{ClearScope, DisplayBundle, ProximityTracker};
use crate::settings::{NightWindow, Settings};

/// Backfill keeps only reports the provider heard within this window
pub const BACKFILL_LOOKBACK: ChronoDuration = ChronoDuration::hours(1);

#[derive(Debug, Clone, PartialEq)]
pub enum PollCommand {
    SwitchLocation(ObserverLocation),
    SetRadius(f64),
    ClearHistory(ClearScope),
    SetVisible(bool),
    RefreshNow,
}

/// What happened to one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Processed { reports: usize, in_radius: usize },
    /// Fetch failed; the tracker was not touched
    FetchFailed,
    /// The location changed while the fetch was in flight
    Stale,
    /// Tracker rejected the snapshot (persistence failure)
    ProcessFailed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollerConfig {
    pub refresh_interval: Duration,
    pub fetch_radius_ratio: f64,
    pub filter: ReportFilter,
    pub night_window: Option<NightWindow>,
}

impl PollerConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            refresh_interval: settings.refresh_interval(),
            fetch_radius_ratio: settings.fetch_radius_ratio(),
            filter: ReportFilter::for_domain(settings.domain, Some(settings.max_altitude())),
            night_window: settings.night_window()?,
        })
    }
}

/// Control surface of a running poller
#[derive(Clone)]
pub struct PollerHandle {
    commands: mpsc::Sender<PollCommand>,
    display: watch::Receiver<Option<DisplayBundle>>,
}

impl PollerHandle {
    pub async fn send(&self, command: PollCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Poller has stopped"))
    }

    pub async fn switch_location(&self, location: ObserverLocation) -> Result<()> {
        self.send(PollCommand::SwitchLocation(location)).await
    }

    pub async fn set_radius(&self, radius: f64) -> Result<()> {
        self.send(PollCommand::SetRadius(radius)).await
    }

    pub async fn clear_history(&self, scope: ClearScope) -> Result<()> {
        self.send(PollCommand::ClearHistory(scope)).await
    }

    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        self.send(PollCommand::SetVisible(visible)).await
    }

    pub async fn refresh_now(&self) -> Result<()> {
        self.send(PollCommand::RefreshNow).await
    }

    /// Latest display bundle; `None` until the first poll completes
    pub fn subscribe(&self) -> watch::Receiver<Option<DisplayBundle>> {
        self.display.clone()
    }
}

pub struct Poller {
    tracker: ProximityTracker,
    provider: Arc<dyn TelemetryProvider>,
    config: PollerConfig,
    commands: mpsc::Receiver<PollCommand>,
    display: watch::Sender<Option<DisplayBundle>>,
    visible: bool,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        tracker: ProximityTracker,
        provider: Arc<dyn TelemetryProvider>,
        config: PollerConfig,
        cancel: CancellationToken,
    ) -> (Self, PollerHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (display_tx, display_rx) = watch::channel(None);
        let poller = Self {
            tracker,
            provider,
            config,
            commands: command_rx,
            display: display_tx,
            visible: true,
            cancel,
        };
        let handle = PollerHandle {
            commands: command_tx,
            display: display_rx,
        };
        (poller, handle)
    }

    pub fn tracker(&self) -> &ProximityTracker {
        &self.tracker
    }

    /// Run until cancelled or every handle is dropped
    pub async fn run(mut self) -> ProximityTracker {
        let cancel = self.cancel.clone();
        info!(
            provider = self.provider.name(),
            location = %self.tracker.location().name,
            interval_secs = self.config.refresh_interval.as_secs(),
            "Poller started"
        );

        'outer: loop {
            if cancel.is_cancelled() {
                break;
            }

            if !self.visible {
                debug!("Polling paused while not visible");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    command = self.commands.recv() => match command {
                        Some(command) => {
                            self.handle_command(command);
                            continue;
                        }
                        None => break,
                    },
                }
            }

            if self.in_night_pause(Local::now().time()) {
                debug!("Skipping poll during night pause");
            } else if self.poll_once().await == PollOutcome::Cancelled {
                break;
            }

            let sleep = tokio::time::sleep(self.config.refresh_interval);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'outer,
                    _ = &mut sleep => break,
                    command = self.commands.recv() => match command {
                        Some(command) => {
                            if self.handle_command(command) {
                                break;
                            }
                        }
                        None => break 'outer,
                    },
                }
            }
        }

        info!(location = %self.tracker.location().name, "Poller stopped");
        self.tracker
    }

    /// Fetch and process one snapshot
    pub async fn poll_once(&mut self) -> PollOutcome {
        let cancel = self.cancel.clone();
        let provider = Arc::clone(&self.provider);
        let location = self.tracker.location().clone();
        let fetch_radius = location.radius * self.config.fetch_radius_ratio;

        let fetch = provider.fetch(&location, fetch_radius);
        tokio::pin!(fetch);
        let result = loop {
            tokio::select! {
                result = &mut fetch => break result,
                Some(command) = self.commands.recv() => {
                    self.handle_command(command);
                }
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
            }
        };

        self.apply_fetch(&location.name, result, Utc::now())
    }

    fn apply_fetch(
        &mut self,
        fetched_for: &str,
        result: Result<Vec<PositionReport>>,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        let reports = match result {
            Ok(reports) => reports,
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Fetch failed, keeping tracked objects until the next poll"
                );
                metrics::counter!("poller.fetch_failures_total").increment(1);
                return PollOutcome::FetchFailed;
            }
        };

        if self.tracker.location().name != fetched_for {
            info!(
                fetched_for,
                current = %self.tracker.location().name,
                "Discarding response for previous location"
            );
            metrics::counter!("poller.stale_responses_total").increment(1);
            return PollOutcome::Stale;
        }

        let fetched = reports.len();
        let reports = self.config.filter.apply(reports);
        debug!(fetched, kept = reports.len(), "Filtered reports");

        match self.tracker.process_snapshot(&reports, now) {
            Ok(bundle) => {
                let outcome = PollOutcome::Processed {
                    reports: reports.len(),
                    in_radius: bundle.active.len(),
                };
                self.display.send_replace(Some(bundle));
                outcome
            }
            Err(e) => {
                error!(error = %e, "Failed to process snapshot");
                PollOutcome::ProcessFailed
            }
        }
    }

    /// Apply a command; returns whether the next poll should run right away
    fn handle_command(&mut self, command: PollCommand) -> bool {
        let now = Utc::now();
        debug!(?command, "Handling poller command");
        match command {
            PollCommand::SwitchLocation(location) => {
                self.tracker.switch_location(location, now);
                self.publish(now);
                true
            }
            PollCommand::SetRadius(radius) => {
                match self.tracker.set_radius(radius, now) {
                    Ok(()) => self.publish(now),
                    Err(e) => warn!(error = %e, "Rejected radius change"),
                }
                false
            }
            PollCommand::ClearHistory(scope) => {
                match self.tracker.clear_history(scope, now) {
                    Ok(_) => self.publish(now),
                    Err(e) => error!(error = %e, "Failed to clear history"),
                }
                false
            }
            PollCommand::SetVisible(visible) => {
                let resumed = visible && !self.visible;
                let paused = !visible && self.visible;
                self.visible = visible;
                resumed || paused
            }
            PollCommand::RefreshNow => true,
        }
    }

    fn publish(&self, now: DateTime<Utc>) {
        match self.tracker.display_data(now) {
            Ok(bundle) => {
                self.display.send_replace(Some(bundle));
            }
            Err(e) => error!(error = %e, "Failed to build display data"),
        }
    }

    fn in_night_pause(&self, local_time: NaiveTime) -> bool {
        self.config
            .night_window
            .is_some_and(|window| window.contains(local_time))
    }
}

/// Radius for the one-shot wider scan
pub fn backfill_radius(domain: TrackerDomain, detection_radius: f64) -> f64 {
    (detection_radius * 3.0).min(domain.backfill_radius_cap())
}

/// Scan a wider area once and feed objects heard within the last hour
/// through the tracker
pub async fn backfill(
    tracker: &mut ProximityTracker,
    provider: &dyn TelemetryProvider,
    domain: TrackerDomain,
    filter: &ReportFilter,
    now: DateTime<Utc>,
) -> Result<(usize, DisplayBundle)> {
    let location = tracker.location().clone();
    let radius = backfill_radius(domain, location.radius);
    info!(location = %location.name, radius, "Backfilling from wider scan");

    let reports = provider.fetch(&location, radius).await?;
    let cutoff = now - BACKFILL_LOOKBACK;
    let recent: Vec<PositionReport> = reports
        .into_iter()
        .filter(|r| r.timestamp.is_some_and(|t| t >= cutoff))
        .collect();
    let recent_count = recent.len();

    let bundle = tracker.process_snapshot(&filter.apply(recent), now)?;
    info!(
        recent = recent_count,
        in_radius = bundle.active.len(),
        "Backfill complete"
    );
    Ok((recent_count, bundle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{self, DistanceUnit};
    use crate::history_repo::MemoryHistoryStore;
    use crate::position::ObjectDetails;
    use crate::proximity_tracker::TrackerConfig;
    use crate::session_repo::MemorySessionStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const HOME: (f64, f64) = (47.6062, -122.3321);

    /// Provider returning scripted responses in order, then empty snapshots
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<Vec<PositionReport>>>>,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Vec<PositionReport>>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl TelemetryProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(
            &self,
            _location: &ObserverLocation,
            _fetch_radius: f64,
        ) -> Result<Vec<PositionReport>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(Vec::new())
            } else {
                responses.remove(0)
            }
        }
    }

    fn location(name: &str) -> ObserverLocation {
        ObserverLocation::new(name, HOME.0, HOME.1, 5.0, Utc::now()).unwrap()
    }

    fn report(id: &str, distance_nm: f64, altitude_ft: i32) -> PositionReport {
        let (lat, lon) =
            geo::destination(DistanceUnit::NauticalMiles, HOME.0, HOME.1, 0.0, distance_nm);
        PositionReport {
            identifier: id.to_string(),
            callsign: None,
            latitude: lat,
            longitude: lon,
            altitude_m: None,
            altitude_ft: Some(altitude_ft),
            heading: None,
            horizontal_speed_mps: None,
            ground_speed_knots: None,
            vertical_speed_mps: None,
            on_ground: false,
            timestamp: Some(Utc::now()),
            details: ObjectDetails::empty_for(TrackerDomain::Aircraft),
        }
    }

    fn config() -> PollerConfig {
        PollerConfig {
            refresh_interval: Duration::from_secs(90),
            fetch_radius_ratio: 2.0,
            filter: ReportFilter::for_domain(TrackerDomain::Aircraft, Some(10_000)),
            night_window: None,
        }
    }

    fn tracker(name: &str) -> ProximityTracker {
        ProximityTracker::new(
            TrackerConfig::for_domain(TrackerDomain::Aircraft),
            location(name),
            Box::new(MemoryHistoryStore::new()),
            Box::new(MemorySessionStore::new()),
        )
    }

    fn poller(provider: ScriptedProvider) -> (Poller, PollerHandle) {
        Poller::new(
            tracker("Home"),
            Arc::new(provider),
            config(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_active_objects() {
        let provider = ScriptedProvider::new(vec![
            Ok(vec![report("aaa", 2.0, 3000)]),
            Err(anyhow!("connection reset")),
        ]);
        let (mut poller, handle) = poller(provider);

        let first = poller.poll_once().await;
        assert_eq!(first, PollOutcome::Processed { reports: 1, in_radius: 1 });

        assert_eq!(poller.poll_once().await, PollOutcome::FetchFailed);
        assert!(poller.tracker().tracked().contains_key("aaa"));
        assert!(
            poller
                .tracker()
                .history_store()
                .query(None, Utc::now())
                .unwrap()
                .is_empty()
        );
        let published = handle.subscribe().borrow().clone().unwrap();
        assert_eq!(published.active.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_drops_high_and_grounded_reports() {
        let mut grounded = report("gnd", 1.0, 0);
        grounded.on_ground = true;
        let provider = ScriptedProvider::new(vec![Ok(vec![
            report("low", 1.0, 3000),
            report("high", 1.0, 35_000),
            grounded,
        ])]);
        let (mut poller, _handle) = poller(provider);

        let outcome = poller.poll_once().await;
        assert_eq!(outcome, PollOutcome::Processed { reports: 1, in_radius: 1 });
        assert!(poller.tracker().tracked().contains_key("low"));
    }

    #[tokio::test]
    async fn test_stale_response_after_location_switch_is_discarded() {
        let (mut poller, _handle) = poller(ScriptedProvider::new(vec![]));
        poller.handle_command(PollCommand::SwitchLocation(location("Cabin")));

        let outcome = poller.apply_fetch("Home", Ok(vec![report("aaa", 1.0, 3000)]), Utc::now());
        assert_eq!(outcome, PollOutcome::Stale);
        assert!(poller.tracker().tracked().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_during_in_flight_fetch_discards_response() {
        let provider = ScriptedProvider {
            responses: Mutex::new(vec![Ok(vec![report("aaa", 1.0, 3000)])]),
            delay: Duration::from_secs(5),
        };
        let (mut poller, handle) = poller(provider);

        handle.switch_location(location("Cabin")).await.unwrap();
        let outcome = poller.poll_once().await;

        assert_eq!(outcome, PollOutcome::Stale);
        assert_eq!(poller.tracker().location().name, "Cabin");
        assert!(poller.tracker().tracked().is_empty());
    }

    #[tokio::test]
    async fn test_radius_command_publishes_display() {
        let (mut poller, handle) = poller(ScriptedProvider::new(vec![]));
        assert!(!poller.handle_command(PollCommand::SetRadius(2.5)));
        assert_eq!(poller.tracker().location().radius, 2.5);

        let published = handle.subscribe().borrow().clone().unwrap();
        assert_eq!(published.location.radius, 2.5);

        assert!(!poller.handle_command(PollCommand::SetRadius(-1.0)));
        assert_eq!(poller.tracker().location().radius, 2.5);
    }

    #[tokio::test]
    async fn test_visibility_commands() {
        let (mut poller, _handle) = poller(ScriptedProvider::new(vec![]));
        assert!(!poller.handle_command(PollCommand::SetVisible(true)));
        assert!(poller.handle_command(PollCommand::SetVisible(false)));
        assert!(poller.handle_command(PollCommand::SetVisible(true)));
        assert!(poller.handle_command(PollCommand::RefreshNow));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let (poller, handle) = Poller::new(
            tracker("Home"),
            Arc::new(ScriptedProvider::new(vec![Ok(vec![report("aaa", 1.0, 3000)])])),
            config(),
            cancel.clone(),
        );
        let mut display = handle.subscribe();
        let task = tokio::spawn(poller.run());

        display.changed().await.unwrap();
        assert_eq!(display.borrow().as_ref().unwrap().active.len(), 1);

        cancel.cancel();
        let tracker = task.await.unwrap();
        assert!(tracker.tracked().contains_key("aaa"));
    }

    #[tokio::test]
    async fn test_backfill_keeps_recent_reports_only() {
        let mut old = report("old", 1.0, 3000);
        old.timestamp = Some(Utc::now() - ChronoDuration::hours(2));
        let mut untimed = report("untimed", 1.0, 3000);
        untimed.timestamp = None;
        let provider = ScriptedProvider::new(vec![Ok(vec![report("new", 1.0, 3000), old, untimed])]);

        let mut tracker = tracker("Home");
        let filter = ReportFilter::for_domain(TrackerDomain::Aircraft, Some(10_000));
        let (recent, bundle) = backfill(
            &mut tracker,
            &provider,
            TrackerDomain::Aircraft,
            &filter,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(recent, 1);
        assert_eq!(bundle.active.len(), 1);
        assert_eq!(bundle.active[0].identifier, "new");
    }

    #[test]
    fn test_backfill_radius_is_capped() {
        assert_eq!(backfill_radius(TrackerDomain::Aircraft, 5.0), 15.0);
        assert_eq!(backfill_radius(TrackerDomain::Aircraft, 30.0), 50.0);
        assert_eq!(backfill_radius(TrackerDomain::Balloon, 200.0), 600.0);
    }

    #[test]
    fn test_night_pause_window() {
        let (mut poller, _handle) = Poller::new(
            tracker("Home"),
            Arc::new(ScriptedProvider::new(vec![])),
            config(),
            CancellationToken::new(),
        );
        poller.config.night_window = Some(NightWindow {
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        });
        assert!(poller.in_night_pause(NaiveTime::from_hms_opt(2, 0, 0).unwrap()));
        assert!(!poller.in_night_pause(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
