///! Station ranking: resolve configured core/fringe references against a
///! snapshot and partition every station into its rank class.

use hfdl_common::{Hz, StationId};
use std::collections::HashSet;

use super::RankClass;
use crate::config::{SelectionConfig, StationRef};
use crate::model::{Station, StationSnapshot};

/// A station with its rank and its selectable frequencies
#[derive(Debug, Clone)]
pub struct RankedStation<'a> {
    pub station: &'a Station,
    pub class: RankClass,
    /// Frequencies outside every ignore range, ascending
    pub frequencies: Vec<Hz>,
}

/// Stations partitioned by rank class, each list in priority order
#[derive(Debug, Clone, Default)]
pub struct Ranking<'a> {
    pub core: Vec<RankedStation<'a>>,
    pub fringe: Vec<RankedStation<'a>>,
    pub other: Vec<RankedStation<'a>>,
    /// Configured references that match no known station
    pub unresolved: Vec<StationRef>,
}

/// Find the station a reference points at: by id first, then by name.
pub fn resolve<'a>(snapshot: &'a StationSnapshot, reference: &StationRef) -> Option<&'a Station> {
    if let Some(station) = reference.as_id().and_then(|id| snapshot.get(id)) {
        return Some(station);
    }
    match reference {
        StationRef::Name(name) => snapshot.find_by_name(name),
        StationRef::Id(_) => None,
    }
}

fn selectable(station: &Station, config: &SelectionConfig) -> Vec<Hz> {
    station
        .frequencies
        .iter()
        .copied()
        .filter(|f| !config.is_ignored(*f))
        .collect()
}

fn rank_list<'a>(
    snapshot: &'a StationSnapshot,
    refs: &[StationRef],
    class: RankClass,
    config: &SelectionConfig,
    seen: &mut HashSet<StationId>,
    unresolved: &mut Vec<StationRef>,
) -> Vec<RankedStation<'a>> {
    let mut ranked = Vec::new();
    for reference in refs {
        let Some(station) = resolve(snapshot, reference) else {
            unresolved.push(reference.clone());
            continue;
        };
        // listed twice, or in both core and fringe: first mention wins
        if !seen.insert(station.id) {
            continue;
        }
        ranked.push(RankedStation {
            station,
            class,
            frequencies: selectable(station, config),
        });
    }
    ranked
}

/// Partition `snapshot` into core (configured order), fringe (configured
/// order) and, when `include_other` is set, every remaining station by id.
pub fn rank_stations<'a>(
    snapshot: &'a StationSnapshot,
    config: &SelectionConfig,
    include_other: bool,
) -> Ranking<'a> {
    let mut seen = HashSet::new();
    let mut unresolved = Vec::new();

    let core = rank_list(snapshot, &config.core_ids, RankClass::Core, config, &mut seen, &mut unresolved);
    let fringe = rank_list(snapshot, &config.fringe_ids, RankClass::Fringe, config, &mut seen, &mut unresolved);

    let other = if include_other {
        snapshot
            .stations()
            .filter(|s| !seen.contains(&s.id))
            .map(|station| RankedStation {
                station,
                class: RankClass::Other,
                frequencies: selectable(station, config),
            })
            .collect()
    } else {
        Vec::new()
    };

    Ranking { core, fringe, other, unresolved }
}
