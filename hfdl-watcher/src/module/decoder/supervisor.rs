///! Decoder supervisor
///!
///! Owns at most one decoder process. `ensure_running` is the only way the
///! watch loop changes what runs; an identical frequency set is a no-op, a
///! different one is stop → settle → launch.

use async_trait::async_trait;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::command::{build_command, describe, DecoderPlan};
use super::listener::{ErrorCounter, SquitterListener, StderrWatchdog, Trip};
use crate::config::DecoderConfig;
use crate::model::StationRegistry;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to launch {program} after {attempts} attempts: {source}")]
    Launch {
        program: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to stop decoder: {0}")]
    Stop(#[source] io::Error),
}

/// What `ensure_running` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Unchanged,
    Started,
    Restarted,
}

/// How a decoder that was expected to keep running ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderExit {
    /// Exited on its own, with its exit code if it had one
    Exited(Option<i32>),
    /// Stopped because its stderr reported trouble
    Stopped(String),
}

impl std::fmt::Display for DecoderExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderExit::Exited(Some(code)) => write!(f, "exited with status {}", code),
            DecoderExit::Exited(None) => write!(f, "killed by signal"),
            DecoderExit::Stopped(reason) => write!(f, "stopped: {}", reason),
        }
    }
}

#[async_trait]
pub trait Supervisor: Send {
    /// Make the decoder run `plan`. Compares frequency sets unordered.
    async fn ensure_running(&mut self, plan: &DecoderPlan) -> Result<Reconcile, SupervisorError>;

    /// Resolves when the running decoder ends without being asked to; never
    /// resolves while nothing runs. Cancel safe.
    async fn wait_for_exit(&mut self) -> DecoderExit;

    /// Stop the decoder, if any. Idempotent.
    async fn stop(&mut self) -> Result<(), SupervisorError>;

    fn running_plan(&self) -> Option<&DecoderPlan>;
}

struct RunningDecoder {
    child: Child,
    plan: DecoderPlan,
    trip: mpsc::Receiver<Trip>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningDecoder {
    /// Stop reading the old process's output
    fn detach(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Supervises a real decoder subprocess
pub struct ProcessSupervisor {
    config: DecoderConfig,
    registry: Arc<StationRegistry>,
    running: Option<RunningDecoder>,
}

impl ProcessSupervisor {
    pub fn new(config: DecoderConfig, registry: Arc<StationRegistry>) -> Self {
        Self {
            config,
            registry,
            running: None,
        }
    }

    async fn settle(&self) {
        if self.config.settle_secs > 0 {
            info!("Giving the SDR {}s to settle", self.config.settle_secs);
            tokio::time::sleep(Duration::from_secs(self.config.settle_secs)).await;
        }
    }

    async fn launch(&mut self, plan: &DecoderPlan) -> Result<(), SupervisorError> {
        let attempts = self.config.launch_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.settle().await;
            debug!("$ {}", describe(plan, &self.config));
            match build_command(plan, &self.config).spawn() {
                Ok(child) => {
                    info!(
                        "Started {} (pid {:?}) on {:?} kHz @ {} S/s",
                        self.config.program,
                        child.id(),
                        plan.khz(),
                        plan.sample_rate
                    );
                    self.attach(child, plan.clone());
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Failed to start {} (attempt {}/{}): {}",
                        self.config.program, attempt, attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(SupervisorError::Launch {
            program: self.config.program.clone(),
            attempts,
            source: last_error.unwrap_or_else(|| io::Error::other("no launch attempted")),
        })
    }

    fn attach(&mut self, mut child: Child, plan: DecoderPlan) {
        let errors = ErrorCounter::default();
        let (trip_tx, trip_rx) = mpsc::channel(1);
        let mut tasks = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            let listener = SquitterListener::new(self.registry.clone(), errors.clone());
            tasks.push(tokio::spawn(async move {
                listener.run(stdout).await;
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let watchdog = StderrWatchdog::new(errors, trip_tx);
            tasks.push(tokio::spawn(watchdog.run(stderr)));
        }

        self.running = Some(RunningDecoder {
            child,
            plan,
            trip: trip_rx,
            tasks,
        });
    }

    fn grace(&self) -> Duration {
        Duration::from_secs(self.config.stop_grace_secs)
    }
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    async fn ensure_running(&mut self, plan: &DecoderPlan) -> Result<Reconcile, SupervisorError> {
        let current = self.running.as_ref().map(|r| r.plan.clone());
        let outcome = match current {
            Some(current) if current.same_set(plan) => {
                debug!("Decoder already running on {:?} kHz", plan.khz());
                return Ok(Reconcile::Unchanged);
            }
            Some(current) => {
                info!("Frequencies changed: {:?} -> {:?} kHz", current.khz(), plan.khz());
                self.stop().await?;
                Reconcile::Restarted
            }
            None => Reconcile::Started,
        };
        self.launch(plan).await?;
        Ok(outcome)
    }

    async fn wait_for_exit(&mut self) -> DecoderExit {
        let grace = self.grace();
        let Some(running) = self.running.as_mut() else {
            return std::future::pending().await;
        };

        enum Woke {
            Exited(io::Result<ExitStatus>),
            Tripped(Trip),
        }
        let woke = tokio::select! {
            status = running.child.wait() => Woke::Exited(status),
            Some(trip) = running.trip.recv() => Woke::Tripped(trip),
        };

        let exit = match woke {
            Woke::Exited(status) => DecoderExit::Exited(status.ok().and_then(|s| s.code())),
            Woke::Tripped(trip) => {
                if let Err(e) = terminate(&mut running.child, grace).await {
                    warn!("Failed to stop decoder after watchdog trip: {}", e);
                }
                DecoderExit::Stopped(trip.to_string())
            }
        };
        if let Some(running) = self.running.take() {
            running.detach();
        }
        warn!("Decoder {}", exit);
        exit
    }

    async fn stop(&mut self) -> Result<(), SupervisorError> {
        let grace = self.grace();
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        info!("Stopping {}", self.config.program);
        let result = terminate(&mut running.child, grace).await;
        running.detach();
        match result {
            Ok(status) => {
                debug!("Decoder stopped: {:?}", status);
                Ok(())
            }
            Err(e) => Err(SupervisorError::Stop(e)),
        }
    }

    fn running_plan(&self) -> Option<&DecoderPlan> {
        self.running.as_ref().map(|r| &r.plan)
    }
}

/// SIGTERM, then SIGKILL once `grace` runs out
async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    send_sigterm(child)?;
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("Decoder still running after {:?}, killing it", grace);
            child.kill().await?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}
