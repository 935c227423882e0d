///! Acquisition chain
///!
///! Tiers, each tried only when every earlier one came up empty:
///! remote sources (directory, then backups) → live squitter observations →
///! on-disk cache → compiled-in allocation table. `acquire` therefore always
///! yields a snapshot.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bootstrap::bootstrap_snapshot;
use super::cache::SnapshotCache;
use super::remote::{sources_from_config, SourceError, StationSource};
use crate::config::AcquisitionConfig;
use crate::model::{SnapshotSource, StationRegistry, StationSnapshot};

/// A snapshot and the tier it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    pub snapshot: StationSnapshot,
    pub source: SnapshotSource,
}

pub struct AcquisitionChain {
    sources: Vec<Box<dyn StationSource>>,
    registry: Arc<StationRegistry>,
    cache: Option<SnapshotCache>,
    expiry: chrono::Duration,
}

impl AcquisitionChain {
    pub fn new(
        sources: Vec<Box<dyn StationSource>>,
        registry: Arc<StationRegistry>,
        cache: Option<SnapshotCache>,
        expiry: chrono::Duration,
    ) -> Self {
        Self {
            sources,
            registry,
            cache,
            expiry,
        }
    }

    pub fn from_config(config: &AcquisitionConfig, registry: Arc<StationRegistry>) -> Result<Self, SourceError> {
        let expiry = chrono::Duration::seconds(config.observation_expiry_secs as i64);
        Ok(Self::new(
            sources_from_config(config)?,
            registry,
            config.cache_path.as_ref().map(SnapshotCache::new),
            expiry,
        ))
    }

    pub async fn acquire(&self) -> Acquired {
        if let Some(snapshot) = self.fetch_remote().await {
            self.on_snapshot_acquired(&snapshot).await;
            return Acquired {
                snapshot,
                source: SnapshotSource::Remote,
            };
        }

        if let Some(snapshot) = self.registry.observed_snapshot(Utc::now(), self.expiry).await {
            info!(
                "Using squitter observations ({} stations, {} frequencies)",
                snapshot.len(),
                snapshot.frequency_count()
            );
            return Acquired {
                snapshot,
                source: SnapshotSource::Squitter,
            };
        }

        if let Some(snapshot) = self.load_cache().await {
            info!("Using cached station table ({} stations)", snapshot.len());
            return Acquired {
                snapshot,
                source: SnapshotSource::Cache,
            };
        }

        warn!("No station data available, falling back to allocated frequencies");
        Acquired {
            snapshot: bootstrap_snapshot(),
            source: SnapshotSource::Bootstrap,
        }
    }

    async fn fetch_remote(&self) -> Option<StationSnapshot> {
        for source in &self.sources {
            let origin = source.describe();
            let result = source.fetch().await.and_then(|table| {
                let snapshot = StationSnapshot::from_table(&table);
                if snapshot.has_no_frequencies() {
                    Err(SourceError::Empty(origin.clone()))
                } else {
                    Ok(snapshot)
                }
            });
            match result {
                Ok(snapshot) => {
                    info!(
                        "Station table from {}: {} stations, {} frequencies",
                        origin,
                        snapshot.len(),
                        snapshot.frequency_count()
                    );
                    return Some(snapshot);
                }
                Err(e) => warn!("Station source {} unavailable: {}", origin, e),
            }
        }
        None
    }

    async fn load_cache(&self) -> Option<StationSnapshot> {
        let cache = self.cache.as_ref()?;
        match cache.load().await {
            Ok(Some(table)) => {
                let snapshot = StationSnapshot::from_table(&table);
                if snapshot.has_no_frequencies() {
                    debug!("Cache {:?} holds no frequencies", cache.path());
                    None
                } else {
                    Some(snapshot)
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Ignoring unreadable cache {:?}: {:#}", cache.path(), e);
                None
            }
        }
    }

    /// Persist a fresh remote snapshot when caching is enabled. Failures are
    /// logged and otherwise ignored.
    async fn on_snapshot_acquired(&self, snapshot: &StationSnapshot) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(e) = cache.save(&snapshot.to_table()).await {
            warn!("Failed to update cache {:?}: {:#}", cache.path(), e);
        }
    }
}
