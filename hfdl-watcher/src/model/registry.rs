///! Station registry
///!
///! Single owned store of station data. The watch loop replaces the current
///! view wholesale after each acquisition and selects from it; the squitter
///! listener only ever appends observations, which the acquisition chain
///! offers as a fallback tier. Both go through the methods below, one writer at a
///! time behind the lock.

use chrono::{DateTime, Duration, Utc};
use hfdl_common::{ReportKind, StationId, StationReport};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::station::{SnapshotSource, Station, StationSnapshot};

/// A station as heard live by the decoder
#[derive(Debug, Clone)]
struct ObservedStation {
    station: Station,
    last_heard: DateTime<Utc>,
}

/// Counters for observations merged since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservationStats {
    pub squitters: u64,
    pub frequency_data: u64,
}

#[derive(Debug, Default)]
struct RegistryState {
    current: StationSnapshot,
    source: Option<SnapshotSource>,
    observed: BTreeMap<StationId, ObservedStation>,
    stats: ObservationStats,
}

/// Shared station registry
#[derive(Debug, Default)]
pub struct StationRegistry {
    state: RwLock<RegistryState>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current view with a freshly acquired snapshot.
    pub async fn replace(&self, snapshot: StationSnapshot, source: SnapshotSource) {
        let mut state = self.state.write().await;
        debug!("Registry replaced from {} ({} stations)", source, snapshot.len());
        state.current = snapshot;
        state.source = Some(source);
    }

    /// Merge one live report into the observations. Frequencies are only
    /// ever added, never removed; the fetched view is left alone until the
    /// next acquisition picks the observations up. Returns true when
    /// something new was learnt.
    pub async fn merge_report(&self, report: &StationReport, now: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;

        match report.kind {
            ReportKind::Squitter => state.stats.squitters += 1,
            ReportKind::FrequencyData => state.stats.frequency_data += 1,
        }

        let name = report.name.clone().unwrap_or_default();
        let observed = state
            .observed
            .entry(report.station_id)
            .or_insert_with(|| ObservedStation {
                station: Station::new(report.station_id, name.clone()),
                last_heard: now,
            });
        observed.last_heard = now;
        observed.station.last_updated = Some(now);
        if observed.station.name.is_empty() && !name.is_empty() {
            observed.station.name = name;
        }
        let before = observed.station.frequencies.len();
        observed.station.frequencies.extend(report.frequencies.iter().copied());
        let changed = observed.station.frequencies.len() != before;

        if changed {
            debug!(
                "Observed station #{} on {:?}",
                report.station_id, report.frequencies
            );
        }
        changed
    }

    /// Clone of the view installed by the last acquisition
    pub async fn snapshot(&self) -> StationSnapshot {
        self.state.read().await.current.clone()
    }

    pub async fn source(&self) -> Option<SnapshotSource> {
        self.state.read().await.source
    }

    /// Drop observations not heard within `expiry`, then return what is left,
    /// or `None` when nothing usable has been heard.
    pub async fn observed_snapshot(&self, now: DateTime<Utc>, expiry: Duration) -> Option<StationSnapshot> {
        let mut state = self.state.write().await;
        let horizon = now - expiry;
        state.observed.retain(|id, obs| {
            let keep = obs.last_heard >= horizon;
            if !keep {
                debug!("Pruning expired observation for station #{}", id);
            }
            keep
        });

        let snapshot: StationSnapshot = state
            .observed
            .values()
            .map(|obs| obs.station.clone())
            .collect();

        if snapshot.has_no_frequencies() {
            None
        } else {
            Some(snapshot)
        }
    }

    pub async fn observation_stats(&self) -> ObservationStats {
        self.state.read().await.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: StationId, freqs: &[u64]) -> StationReport {
        StationReport {
            kind: ReportKind::Squitter,
            station_id: id,
            name: Some(format!("Station {}", id)),
            frequencies: freqs.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_replace_is_wholesale() {
        let registry = StationRegistry::new();
        let first: StationSnapshot = [Station::new(1, "A").with_frequencies([1_000]), Station::new(2, "B")]
            .into_iter()
            .collect();
        registry.replace(first, SnapshotSource::Remote).await;

        let second: StationSnapshot = [Station::new(3, "C").with_frequencies([3_000])].into_iter().collect();
        registry.replace(second.clone(), SnapshotSource::Cache).await;

        assert_eq!(registry.snapshot().await, second);
        assert_eq!(registry.source().await, Some(SnapshotSource::Cache));
    }

    #[tokio::test]
    async fn test_squitters_only_add_observations() {
        let registry = StationRegistry::new();
        let fetched: StationSnapshot = [Station::new(1, "A").with_frequencies([1_000, 2_000])]
            .into_iter()
            .collect();
        registry.replace(fetched.clone(), SnapshotSource::Remote).await;

        let now = Utc::now();
        assert!(registry.merge_report(&report(1, &[3_000]), now).await);
        assert!(!registry.merge_report(&report(1, &[3_000]), now).await);
        assert!(registry.merge_report(&report(1, &[1_000]), now).await);
        assert!(registry.merge_report(&report(9, &[9_000]), now).await);

        // the fetched view only changes on the next replace
        assert_eq!(registry.snapshot().await, fetched);

        let observed = registry.observed_snapshot(now, Duration::hours(2)).await.unwrap();
        assert_eq!(observed.get(1).unwrap().frequencies.len(), 2);
        assert_eq!(observed.get(9).unwrap().name, "Station 9");
        assert_eq!(registry.observation_stats().await.squitters, 4);
    }

    #[tokio::test]
    async fn test_observed_snapshot_expires() {
        let registry = StationRegistry::new();
        let now = Utc::now();
        assert!(registry.observed_snapshot(now, Duration::hours(2)).await.is_none());

        registry.merge_report(&report(1, &[1_000]), now - Duration::hours(3)).await;
        registry.merge_report(&report(2, &[2_000, 2_500]), now).await;

        let observed = registry.observed_snapshot(now, Duration::hours(2)).await.unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed.frequency_count(), 2);
    }
}
