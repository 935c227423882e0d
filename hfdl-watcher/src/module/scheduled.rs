///! Acquisition & supervision loop
///!
///! BOOTSTRAP → FETCHING → SELECTING → RECONCILING → WATCHING → FETCHING ...
///!
///! - FETCHING runs the acquisition chain and replaces the registry view.
///! - SELECTING runs the engine over that view (unranked when only the
///!   bootstrap table is known).
///! - RECONCILING hands the plan to the supervisor; a fatal supervisor error
///!   ends in FAILED.
///! - WATCHING waits for the fetch timer, armed each time FETCHING is entered.
///!   A decoder exit short-circuits back to RECONCILING with the same plan,
///!   within the restart budget, and leaves the timer running.
///! - FAILED is terminal; the decoder is stopped on every way out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::acquisition::{Acquired, AcquisitionChain};
use super::decoder::{DecoderPlan, Reconcile, Supervisor, SupervisorError};
use super::selection::{run_experiments, select, select_unranked, Selection};
use crate::config::{SelectionConfig, WatcherConfig};
use crate::model::{SnapshotSource, StationRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Bootstrap,
    Fetching,
    Selecting,
    Reconciling,
    Watching,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("decoder exited {0} times within one watch interval, giving up")]
    RestartBudget(u32),

    #[error("watch loop already failed")]
    AlreadyFailed,
}

/// How a loop run ended, short of failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stop requested from outside
    Shutdown,
    /// Single-shot run finished
    Completed,
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    pub max_restarts: u32,
    /// Stop after the first reconcile (single-shot display)
    pub once: bool,
    /// Log the experimental strategies on every selection
    pub experiments: bool,
}

impl WatchOptions {
    pub fn from_config(config: &WatcherConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.watch.interval_secs),
            max_restarts: config.decoder.max_restarts,
            once: false,
            experiments: false,
        }
    }
}

pub struct WatchLoop<S: Supervisor> {
    chain: AcquisitionChain,
    registry: Arc<StationRegistry>,
    selection: SelectionConfig,
    supervisor: S,
    options: WatchOptions,
    state: WatchState,
    history: Vec<WatchState>,
}

impl<S: Supervisor> WatchLoop<S> {
    pub fn new(
        chain: AcquisitionChain,
        registry: Arc<StationRegistry>,
        selection: SelectionConfig,
        supervisor: S,
        options: WatchOptions,
    ) -> Self {
        Self {
            chain,
            registry,
            selection,
            supervisor,
            options,
            state: WatchState::Bootstrap,
            history: vec![WatchState::Bootstrap],
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Every state entered, in order
    pub fn history(&self) -> &[WatchState] {
        &self.history
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    fn transition(&mut self, next: WatchState) {
        debug!("Watch loop: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Drive the state machine until `shutdown` resolves, a single-shot run
    /// completes, or the loop fails. The decoder is stopped before returning.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<Outcome, WatchError>
    where
        F: Future<Output = ()> + Send,
    {
        if self.state == WatchState::Failed {
            return Err(WatchError::AlreadyFailed);
        }
        tokio::pin!(shutdown);

        let result = self.drive(shutdown).await;

        if let Err(e) = &result {
            error!("Watch loop failed: {}", e);
            self.transition(WatchState::Failed);
        }
        if let Err(e) = self.supervisor.stop().await {
            error!("Failed to stop decoder on the way out: {}", e);
        }
        result
    }

    async fn drive<F>(&mut self, mut shutdown: std::pin::Pin<&mut F>) -> Result<Outcome, WatchError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut next_fetch = Instant::now();
        let mut plan: Option<DecoderPlan> = None;
        let mut restarts: u32 = 0;

        loop {
            match self.state {
                WatchState::Bootstrap => {
                    info!(
                        "Watching ground stations every {}s",
                        self.options.interval.as_secs()
                    );
                    self.transition(WatchState::Fetching);
                }

                WatchState::Fetching => {
                    next_fetch = Instant::now() + self.options.interval;
                    let Acquired { snapshot, source } = tokio::select! {
                        got = self.chain.acquire() => got,
                        _ = shutdown.as_mut() => return Ok(Outcome::Shutdown),
                    };
                    self.registry.replace(snapshot, source).await;
                    self.transition(WatchState::Selecting);
                }

                WatchState::Selecting => {
                    let selection = self.select_round().await;
                    plan = Some(DecoderPlan::from_selection(&selection));
                    self.transition(WatchState::Reconciling);
                }

                WatchState::Reconciling => {
                    let Some(next) = plan.as_ref().filter(|p| !p.frequencies.is_empty()) else {
                        warn!("No frequencies to monitor, keeping the decoder as it is");
                        if self.options.once {
                            return Ok(Outcome::Completed);
                        }
                        self.transition(WatchState::Watching);
                        continue;
                    };
                    let reconciled = tokio::select! {
                        r = self.supervisor.ensure_running(next) => r?,
                        _ = shutdown.as_mut() => return Ok(Outcome::Shutdown),
                    };
                    match reconciled {
                        Reconcile::Unchanged => debug!("Decoder left running"),
                        Reconcile::Started => info!("Decoder started"),
                        Reconcile::Restarted => info!("Decoder restarted"),
                    }
                    if self.options.once {
                        return Ok(Outcome::Completed);
                    }
                    self.transition(WatchState::Watching);
                }

                WatchState::Watching => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(next_fetch) => {
                            if restarts > 0 {
                                debug!("Decoder alive at the fetch timer, restart budget reset");
                            }
                            restarts = 0;
                            self.transition(WatchState::Fetching);
                        }
                        exit = self.supervisor.wait_for_exit() => {
                            restarts += 1;
                            warn!(
                                "Decoder {} (restart {}/{})",
                                exit, restarts, self.options.max_restarts
                            );
                            if restarts > self.options.max_restarts {
                                return Err(WatchError::RestartBudget(restarts));
                            }
                            self.transition(WatchState::Reconciling);
                        }
                        _ = shutdown.as_mut() => {
                            info!("Shutdown requested");
                            return Ok(Outcome::Shutdown);
                        }
                    }
                }

                WatchState::Failed => return Err(WatchError::AlreadyFailed),
            }
        }
    }

    /// Select from the registry view the last fetch installed
    async fn select_round(&self) -> Selection {
        let snapshot = self.registry.snapshot().await;
        let source = self.registry.source().await.unwrap_or(SnapshotSource::Bootstrap);
        let selection = if source == SnapshotSource::Bootstrap {
            select_unranked(&snapshot, &self.selection)
        } else {
            select(&snapshot, &self.selection)
        };

        let diagnostics = &selection.diagnostics;
        for reference in &diagnostics.unresolved {
            warn!("Configured station {} is not in the {} data", reference, source);
        }
        for note in &diagnostics.notes {
            info!("Selection note: {}", note);
        }
        if !diagnostics.dropped.is_empty() {
            warn!(
                "Dropped {:?} Hz to fit {} S/s",
                diagnostics.dropped, selection.sample_rate
            );
        }
        debug!(
            "Seed windows: low {:?}, high {:?}",
            diagnostics.low_seed, diagnostics.high_seed
        );
        info!("Selected from {}: {}", source, selection);

        let stats = self.registry.observation_stats().await;
        debug!(
            "Live observations so far: {} squitters, {} frequency data",
            stats.squitters, stats.frequency_data
        );

        if self.options.experiments {
            for experiment in run_experiments(&snapshot, &self.selection) {
                let khz: Vec<u64> = experiment
                    .working_set
                    .iter()
                    .map(|f| hfdl_common::hz_to_khz(*f))
                    .collect();
                info!("[experimental] {}: {:?}", experiment.name, khz);
            }
        }
        selection
    }
}
