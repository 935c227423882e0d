use async_trait::async_trait;
use tracing::info;

use super::command::{describe, DecoderPlan};
use super::supervisor::{DecoderExit, Reconcile, Supervisor, SupervisorError};
use crate::config::DecoderConfig;

/// Display-only stand-in for a supervisor: reports what would run, never
/// starts anything.
pub struct DisplaySupervisor {
    config: DecoderConfig,
    current: Option<DecoderPlan>,
}

impl DisplaySupervisor {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config, current: None }
    }
}

#[async_trait]
impl Supervisor for DisplaySupervisor {
    async fn ensure_running(&mut self, plan: &DecoderPlan) -> Result<Reconcile, SupervisorError> {
        let outcome = match &self.current {
            Some(current) if current.same_set(plan) => Reconcile::Unchanged,
            Some(_) => Reconcile::Restarted,
            None => Reconcile::Started,
        };
        if outcome == Reconcile::Unchanged {
            info!("Frequencies unchanged: {:?} kHz", plan.khz());
        } else {
            info!("Best frequencies: {:?} kHz @ {} S/s", plan.khz(), plan.sample_rate);
            info!("$ {}", describe(plan, &self.config));
        }
        self.current = Some(plan.clone());
        Ok(outcome)
    }

    async fn wait_for_exit(&mut self) -> DecoderExit {
        std::future::pending().await
    }

    async fn stop(&mut self) -> Result<(), SupervisorError> {
        self.current = None;
        Ok(())
    }

    fn running_plan(&self) -> Option<&DecoderPlan> {
        self.current.as_ref()
    }
}
