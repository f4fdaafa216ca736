//! Startup sequence run once when the home screen mounts.
//!
//! The sequence puts a location on screen as fast as possible, then keeps
//! improving data quality in the background:
//!
//! 1. Prefetch the cached locations listing
//! 2. Acquire the quick location (bounded by the quick-location deadline)
//! 3. Pause briefly so background work does not compete with first paint
//! 4. Spawn location refinement and the data refresh concurrently
//!
//! Background completion is published as a `BackgroundReport` on the
//! channel returned by `StartupOrchestrator::new`. The background task is
//! bound to a `CancellationToken`; once cancelled it writes and publishes
//! nothing further.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::{LocationCache, QuickLocation};
use crate::models::{LocationStatus, UserLocationsCache};
use crate::refresh::{DataRefresher, RefreshOutcome};

/// Reports are rare (one per launch); a small buffer is plenty.
const CHANNEL_BUFFER_SIZE: usize = 4;

/// Number of operations run in the background phase
const BACKGROUND_OPERATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    NotStarted,
    LoadingCache,
    AcquiringQuickLocation,
    Debounce,
    BackgroundRefresh,
    Done,
}

/// What the UI gets back immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupOutcome {
    pub location: QuickLocation,
    pub cached_listing: Option<UserLocationsCache>,
}

/// Combined settlement of the background phase.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundReport {
    pub location_status: LocationStatus,
    pub refresh: RefreshOutcome,
    pub completed_at: DateTime<Utc>,
}

impl BackgroundReport {
    pub fn success_count(&self) -> usize {
        usize::from(self.location_status.is_success()) + usize::from(self.refresh.succeeded())
    }
}

pub struct StartupOrchestrator {
    locations: LocationCache,
    refresher: DataRefresher,
    debounce: Duration,
    phase: StartupPhase,
    outcome: Option<StartupOutcome>,
    cancel: CancellationToken,
    report_tx: mpsc::Sender<BackgroundReport>,
    background: Option<JoinHandle<()>>,
}

impl StartupOrchestrator {
    pub fn new(
        locations: LocationCache,
        refresher: DataRefresher,
        debounce: Duration,
    ) -> (Self, mpsc::Receiver<BackgroundReport>) {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let orchestrator = Self {
            locations,
            refresher,
            debounce,
            phase: StartupPhase::NotStarted,
            outcome: None,
            cancel: CancellationToken::new(),
            report_tx: tx,
            background: None,
        };
        (orchestrator, rx)
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    /// Token that stops the background phase, e.g. when the screen unmounts
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        info!("Cancelling background startup work");
        self.cancel.cancel();
    }

    /// Run the startup sequence.
    ///
    /// Returns as soon as the quick location is known and the background
    /// phase has been spawned. A second call does not start anything and
    /// returns the first outcome.
    pub async fn run(&mut self) -> StartupOutcome {
        if let Some(ref outcome) = self.outcome {
            debug!("Startup sequence already ran");
            return outcome.clone();
        }

        info!("=== FAST STARTUP SEQUENCE BEGIN ===");

        self.phase = StartupPhase::LoadingCache;
        let cached_listing = self.locations.load_cached_data_first().await;

        self.phase = StartupPhase::AcquiringQuickLocation;
        let location = self.locations.get_quick_location().await;
        info!(
            lat = location.region.latitude,
            lng = location.region.longitude,
            source = ?location.source,
            "Quick location set"
        );

        self.phase = StartupPhase::Debounce;
        tokio::time::sleep(self.debounce).await;

        self.phase = StartupPhase::BackgroundRefresh;
        info!("Starting background operations");
        self.background = Some(self.spawn_background(location.status));

        self.phase = StartupPhase::Done;
        info!("=== FAST STARTUP SEQUENCE END ===");

        let outcome = StartupOutcome {
            location,
            cached_listing,
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn spawn_background(&self, status: LocationStatus) -> JoinHandle<()> {
        let locations = self.locations.clone();
        let refresher = self.refresher.clone();
        let tx = self.report_tx.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let work = async {
                let (location_status, refresh) = tokio::join!(
                    locations.improve_location_in_background(status),
                    refresher.refresh_in_background(),
                );
                BackgroundReport {
                    location_status,
                    refresh,
                    completed_at: Utc::now(),
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Background operations cancelled");
                }
                report = work => {
                    info!(
                        location_status = ?report.location_status,
                        refresh = ?report.refresh,
                        "Background operations completed: {}/{} successful",
                        report.success_count(),
                        BACKGROUND_OPERATIONS
                    );
                    if tx.send(report).await.is_err() {
                        debug!("Background report dropped - no listener");
                    }
                }
            }
        })
    }

    /// Wait for the background phase to settle. Returns immediately if it never started.
    pub async fn wait_for_background(&mut self) {
        if let Some(handle) = self.background.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Background startup task failed");
            }
        }
    }
}
