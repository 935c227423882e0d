///! Alternative packing strategies, shown by `scan --experiments` only.
///! None of these ever drive the decoder.

use hfdl_common::{Hz, StationId};
use std::collections::HashSet;

use super::ranking::rank_stations;
use crate::config::SelectionConfig;
use crate::model::{FrequencySet, StationSnapshot};

/// One alternative working set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub name: String,
    pub working_set: FrequencySet,
}

/// Pack `candidates` outward from `candidates[pivot]`: closest first, lower
/// frequency first on equal distance, skipping whatever would overflow.
fn pack_from_pivot(candidates: &[Hz], pivot: usize, limit: Hz) -> FrequencySet {
    let Some(&origin) = candidates.get(pivot) else {
        return FrequencySet::new();
    };
    let mut ordered = candidates.to_vec();
    ordered.sort_by_key(|f| (f.abs_diff(origin), *f));

    let mut pool = FrequencySet::new();
    for freq in ordered {
        let low = pool.first().copied().unwrap_or(freq).min(freq);
        let high = pool.last().copied().unwrap_or(freq).max(freq);
        if high - low <= limit {
            pool.insert(freq);
        }
    }
    pool
}

/// Every core frequency pooled together, ascending
fn core_frequencies(snapshot: &StationSnapshot, config: &SelectionConfig) -> Vec<Hz> {
    let ranking = rank_stations(snapshot, config, false);
    let mut freqs: Vec<Hz> = ranking
        .core
        .iter()
        .flat_map(|r| r.frequencies.iter().copied())
        .collect();
    freqs.sort_unstable();
    freqs
}

/// Core frequencies pooled, packed outward from the middle one
pub fn middle_out(snapshot: &StationSnapshot, config: &SelectionConfig) -> FrequencySet {
    let freqs = core_frequencies(snapshot, config);
    pack_from_pivot(&freqs, freqs.len() / 2, config.packing_limit())
}

/// Like `middle_out`, with every core frequency tried as the pivot in turn.
/// Only distinct pools are returned, in pivot order.
pub fn iterate_core(snapshot: &StationSnapshot, config: &SelectionConfig) -> Vec<FrequencySet> {
    let freqs = core_frequencies(snapshot, config);
    let limit = config.packing_limit();
    let mut pools: Vec<FrequencySet> = Vec::new();
    for pivot in 0..freqs.len() {
        let pool = pack_from_pivot(&freqs, pivot, limit);
        if !pools.contains(&pool) {
            pools.push(pool);
        }
    }
    pools
}

/// All selectable (frequency, station) pairs, ascending by frequency
fn candidates(snapshot: &StationSnapshot, config: &SelectionConfig) -> Vec<(Hz, StationId)> {
    let mut pairs: Vec<(Hz, StationId)> = snapshot
        .stations()
        .flat_map(|s| s.frequencies.iter().map(move |f| (*f, s.id)))
        .filter(|(f, _)| !config.is_ignored(*f))
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Slide a capacity-wide window across every candidate start frequency and
/// keep the one `score` rates highest; earliest window wins ties.
fn best_window(
    pairs: &[(Hz, StationId)],
    limit: Hz,
    score: impl Fn(&[(Hz, StationId)]) -> usize,
) -> FrequencySet {
    let mut best: Option<(usize, &[(Hz, StationId)])> = None;
    let mut end = 0;
    for start in 0..pairs.len() {
        end = end.max(start);
        while end < pairs.len() && pairs[end].0 - pairs[start].0 <= limit {
            end += 1;
        }
        let window = &pairs[start..end];
        let value = score(window);
        if best.is_none_or(|(top, _)| value > top) {
            best = Some((value, window));
        }
    }
    best.map(|(_, window)| window.iter().map(|(f, _)| *f).collect())
        .unwrap_or_default()
}

/// Capacity-sized window heard from the most distinct stations
pub fn station_count(snapshot: &StationSnapshot, config: &SelectionConfig) -> FrequencySet {
    let pairs = candidates(snapshot, config);
    best_window(&pairs, config.packing_limit(), |window| {
        window.iter().map(|(_, id)| *id).collect::<HashSet<_>>().len()
    })
}

/// Capacity-sized window holding the most distinct frequencies
pub fn band_density(snapshot: &StationSnapshot, config: &SelectionConfig) -> FrequencySet {
    let pairs = candidates(snapshot, config);
    best_window(&pairs, config.packing_limit(), |window| {
        window.iter().map(|(f, _)| *f).collect::<HashSet<_>>().len()
    })
}

pub fn run_experiments(snapshot: &StationSnapshot, config: &SelectionConfig) -> Vec<Experiment> {
    let mut experiments = vec![Experiment {
        name: "middle-out".to_string(),
        working_set: middle_out(snapshot, config),
    }];
    for (ix, pool) in iterate_core(snapshot, config).into_iter().enumerate() {
        experiments.push(Experiment {
            name: format!("iterate-core #{}", ix + 1),
            working_set: pool,
        });
    }
    experiments.push(Experiment {
        name: "station-count".to_string(),
        working_set: station_count(snapshot, config),
    });
    experiments.push(Experiment {
        name: "band-density".to_string(),
        working_set: band_density(snapshot, config),
    });
    experiments
}
