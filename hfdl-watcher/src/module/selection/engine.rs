///! Frequency selection engine
///!
///! Greedy, deterministic packing of ranked station frequencies into one
///! window no wider than the receiver can sample:
///!
///! 1. Core stations seed two windows: one grown from the low edge, one from
///!    the high edge. Each sweep lets every core station try one candidate per
///!    window; a candidate that would overflow is dropped for that window.
///! 2. The window with more members wins (ties go to the low window), unless
///!    a preference is configured.
///! 3. Fringe stations, then every other station, fill in whatever still fits,
///!    always taking the candidate that grows the span the least.
///! 4. With discrete sample rates configured, packing never exceeds the
///!    largest rate, and the span is snapped to the smallest rate covering it.
///!    Trimming the latest additions only happens if none does.
///!
///! This is a heuristic, not an optimal packer.

use hfdl_common::{Hz, StationId};

use super::ranking::{rank_stations, RankedStation};
use super::window::{Member, SelectionWindow};
use super::{Diagnostics, RankClass, SeedDirection, Selection};
use crate::config::{SeedPreference, SelectionConfig};
use crate::model::StationSnapshot;

/// Where the next candidate of a station is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// distance to the window's low edge; an empty window takes the lowest
    Low,
    /// distance to the window's high edge; an empty window takes the highest
    High,
    /// growth of the span; an empty window takes the lowest
    Nearest,
}

/// Frequencies of one station not yet attempted against a window
#[derive(Debug, Clone)]
struct CandidateQueue {
    station: StationId,
    class: RankClass,
    remaining: Vec<Hz>,
}

impl CandidateQueue {
    fn from_ranked(ranked: &[RankedStation<'_>]) -> Vec<Self> {
        ranked
            .iter()
            .filter(|r| !r.frequencies.is_empty())
            .map(|r| CandidateQueue {
                station: r.station.id,
                class: r.class,
                remaining: r.frequencies.clone(),
            })
            .collect()
    }

    /// Index of the next candidate. `remaining` is ascending, so on equal
    /// distance the lower frequency wins.
    fn next_index(&self, window: &SelectionWindow, anchor: Anchor) -> Option<usize> {
        if self.remaining.is_empty() {
            return None;
        }
        let (low, high) = match (window.low(), window.high()) {
            (Some(low), Some(high)) => (low, high),
            _ => {
                return Some(match anchor {
                    Anchor::High => self.remaining.len() - 1,
                    Anchor::Low | Anchor::Nearest => 0,
                });
            }
        };
        let distance = |f: Hz| match anchor {
            Anchor::Low => f.abs_diff(low),
            Anchor::High => f.abs_diff(high),
            Anchor::Nearest => window.distance(f),
        };
        let mut best = 0;
        for (ix, freq) in self.remaining.iter().enumerate().skip(1) {
            if distance(*freq) < distance(self.remaining[best]) {
                best = ix;
            }
        }
        Some(best)
    }
}

/// Sweep the queues round-robin until every candidate has been attempted.
fn expand(window: &mut SelectionWindow, mut queues: Vec<CandidateQueue>, anchor: Anchor, limit: Hz) {
    loop {
        let mut attempted = false;
        for queue in queues.iter_mut() {
            queue.remaining.retain(|f| !window.contains(*f));
            let Some(ix) = queue.next_index(window, anchor) else {
                continue;
            };
            let frequency = queue.remaining.remove(ix);
            attempted = true;
            if window.fits(frequency, limit) {
                window.insert(Member {
                    frequency,
                    station: queue.station,
                    class: queue.class,
                });
            }
        }
        if !attempted {
            break;
        }
    }
}

fn seed(core: &[CandidateQueue], limit: Hz) -> (SelectionWindow, SelectionWindow) {
    let mut low = SelectionWindow::new();
    let mut high = SelectionWindow::new();
    expand(&mut low, core.to_vec(), Anchor::Low, limit);
    expand(&mut high, core.to_vec(), Anchor::High, limit);
    (low, high)
}

/// Run one selection round. Pure: never mutates its inputs and returns the
/// same result for the same inputs.
pub fn select(snapshot: &StationSnapshot, config: &SelectionConfig) -> Selection {
    run(snapshot, config, !config.skip_fill)
}

/// Selection with no ranking data: every station counts as `other` and fill
/// is always on. Used when only the bootstrap table is available.
pub fn select_unranked(snapshot: &StationSnapshot, config: &SelectionConfig) -> Selection {
    let unranked = SelectionConfig {
        core_ids: Vec::new(),
        fringe_ids: Vec::new(),
        skip_fill: false,
        prefer: SeedPreference::None,
        ..config.clone()
    };
    let mut selection = run(snapshot, &unranked, true);
    selection.diagnostics.notes.push("bootstrap: unranked selection".to_string());
    selection
}

fn run(snapshot: &StationSnapshot, config: &SelectionConfig, include_other: bool) -> Selection {
    let limit = config.packing_limit();
    let mut diagnostics = Diagnostics::default();

    if snapshot.is_empty() {
        diagnostics.notes.push("no data".to_string());
        return Selection::empty(config, diagnostics);
    }

    let ranking = rank_stations(snapshot, config, include_other);
    diagnostics.unresolved = ranking.unresolved.clone();

    let core = CandidateQueue::from_ranked(&ranking.core);
    let (low, high) = seed(&core, limit);
    diagnostics.low_seed = low.frequencies();
    diagnostics.high_seed = high.frequencies();

    let direction = match config.prefer {
        SeedPreference::Low => SeedDirection::Low,
        SeedPreference::High => SeedDirection::High,
        SeedPreference::None if high.len() > low.len() => SeedDirection::High,
        SeedPreference::None => SeedDirection::Low,
    };
    diagnostics.seed = direction;
    let mut window = match direction {
        SeedDirection::Low => low,
        SeedDirection::High => high,
    };

    expand(&mut window, CandidateQueue::from_ranked(&ranking.fringe), Anchor::Nearest, limit);
    if include_other {
        expand(&mut window, CandidateQueue::from_ranked(&ranking.other), Anchor::Nearest, limit);
    }

    let sample_rate = snap_capacity(&mut window, config, &mut diagnostics);

    diagnostics.core = window.count_class(RankClass::Core);
    diagnostics.fringe = window.count_class(RankClass::Fringe);
    diagnostics.other = window.count_class(RankClass::Other);
    if window.is_empty() {
        diagnostics.notes.push("no selectable frequencies".to_string());
    }

    let effective_capacity = if config.sample_rate_options.is_empty() {
        config.max_samples_hz
    } else {
        sample_rate
    };

    Selection {
        working_set: window.frequencies(),
        members: window.members().iter().map(|m| m.frequency).collect(),
        span: window.span(),
        sample_rate,
        effective_capacity,
        diagnostics,
    }
}

/// Pick the sample rate for the window. With discrete options, the smallest
/// one that covers the span; if none does, the largest one, dropping the
/// latest admissions until the span fits.
fn snap_capacity(window: &mut SelectionWindow, config: &SelectionConfig, diagnostics: &mut Diagnostics) -> u64 {
    let options = config.sorted_rate_options();
    let Some(&largest) = options.last() else {
        return config.required_rate(window.span());
    };

    if let Some(&rate) = options.iter().find(|r| config.usable_span(**r) >= window.span()) {
        return rate;
    }

    let limit = config.usable_span(largest);
    while window.span() > limit {
        match window.pop() {
            Some(member) => diagnostics.dropped.push(member.frequency),
            None => break,
        }
    }
    largest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IgnoreRange, StationRef};
    use crate::model::{FrequencySet, Station};

    fn config(core: &[u32], fringe: &[u32], max_samples_hz: u64) -> SelectionConfig {
        SelectionConfig {
            core_ids: core.iter().map(|id| StationRef::Id(*id)).collect(),
            fringe_ids: fringe.iter().map(|id| StationRef::Id(*id)).collect(),
            max_samples_hz,
            filter_factor: 1.0,
            ..SelectionConfig::default()
        }
    }

    fn snapshot(stations: &[(u32, &[u64])]) -> StationSnapshot {
        stations
            .iter()
            .map(|(id, freqs)| Station::new(*id, format!("GS{}", id)).with_frequencies(freqs.iter().copied()))
            .collect()
    }

    fn set(freqs: &[u64]) -> FrequencySet {
        freqs.iter().copied().collect()
    }

    #[test]
    fn test_empty_snapshot_reports_no_data() {
        let selection = select(&StationSnapshot::new(), &config(&[1], &[], 10_000));
        assert!(selection.working_set.is_empty());
        assert!(selection.diagnostics.notes.iter().any(|n| n == "no data"));
    }

    #[test]
    fn test_single_core_station_too_wide_for_two() {
        let snapshot = snapshot(&[(1, &[5_000, 6_000, 6_500])]);
        let selection = select(&snapshot, &config(&[1], &[], 400));

        assert_eq!(selection.diagnostics.low_seed, set(&[5_000]));
        assert_eq!(selection.diagnostics.high_seed, set(&[6_500]));
        assert_eq!(selection.diagnostics.seed, SeedDirection::Low);
        assert_eq!(selection.working_set, set(&[5_000]));
    }

    #[test]
    fn test_three_core_stations_within_capacity() {
        let snapshot = snapshot(&[(1, &[10_000]), (2, &[14_000]), (3, &[18_000])]);
        let selection = select(&snapshot, &config(&[1, 2, 3], &[], 10_000));
        assert_eq!(selection.working_set.len(), 3);
        assert_eq!(selection.diagnostics.core, 3);
        assert_eq!(selection.span, 8_000);
    }

    #[test]
    fn test_larger_seed_window_wins() {
        // low seed: 1_000 then nothing else fits; high seed: 9_000, 8_500, 8_000
        let snapshot = snapshot(&[(1, &[1_000, 8_000, 9_000]), (2, &[8_500])]);
        let selection = select(&snapshot, &config(&[1, 2], &[], 1_000));

        assert_eq!(selection.diagnostics.low_seed, set(&[1_000]));
        assert_eq!(selection.diagnostics.high_seed, set(&[8_000, 8_500, 9_000]));
        assert_eq!(selection.diagnostics.seed, SeedDirection::High);
        assert_eq!(selection.working_set, set(&[8_000, 8_500, 9_000]));
    }

    #[test]
    fn test_preference_overrides_size() {
        let snapshot = snapshot(&[(1, &[1_000, 8_000, 9_000]), (2, &[8_500])]);
        let mut config = config(&[1, 2], &[], 1_000);
        config.prefer = SeedPreference::Low;
        let selection = select(&snapshot, &config);
        assert_eq!(selection.diagnostics.seed, SeedDirection::Low);
        assert_eq!(selection.working_set, set(&[1_000]));
    }

    #[test]
    fn test_fringe_then_fill_expansion() {
        let snapshot = snapshot(&[
            (1, &[10_000]),
            (2, &[10_400, 20_000]),
            (3, &[9_700]),
            (5, &[10_900, 11_500]),
        ]);
        let selection = select(&snapshot, &config(&[1], &[2], 1_000));

        // 20_000 never fits; 10_900 would widen the span to 1_200 once 9_700 is in
        assert_eq!(selection.working_set, set(&[9_700, 10_000, 10_400]));
        assert_eq!(selection.diagnostics.core, 1);
        assert_eq!(selection.diagnostics.fringe, 1);
        assert_eq!(selection.diagnostics.other, 1);
        assert_eq!(selection.members, vec![10_000, 10_400, 9_700]);
    }

    #[test]
    fn test_skip_fill_ignores_other_stations() {
        let snapshot = snapshot(&[(1, &[10_000]), (3, &[10_100])]);
        let mut config = config(&[1], &[], 1_000);
        config.skip_fill = true;
        assert_eq!(select(&snapshot, &config).working_set, set(&[10_000]));
        config.skip_fill = false;
        assert_eq!(select(&snapshot, &config).working_set, set(&[10_000, 10_100]));
    }

    #[test]
    fn test_no_core_starts_from_fringe() {
        let snapshot = snapshot(&[(2, &[7_000, 7_300]), (3, &[6_900])]);
        let selection = select(&snapshot, &config(&[], &[2], 350));
        assert!(selection.diagnostics.low_seed.is_empty());
        assert_eq!(selection.members, vec![7_000, 7_300]);
        // 6_900 would widen the span to 400
        assert_eq!(selection.working_set, set(&[7_000, 7_300]));
    }

    #[test]
    fn test_equal_distance_grows_downward() {
        let snapshot = snapshot(&[(1, &[10_000]), (2, &[9_000, 11_000])]);
        let selection = select(&snapshot, &config(&[1], &[2], 1_000));
        assert_eq!(selection.working_set, set(&[9_000, 10_000]));
    }

    #[test]
    fn test_ignored_ranges_never_selected() {
        let snapshot = snapshot(&[(1, &[5_000, 5_200]), (2, &[5_100])]);
        let mut config = config(&[1], &[2], 1_000);
        config.ignore_ranges = vec![IgnoreRange(5_050, 5_150)];
        let selection = select(&snapshot, &config);
        assert!(selection.working_set.iter().all(|f| !config.is_ignored(*f)));
        assert_eq!(selection.working_set, set(&[5_000, 5_200]));
    }

    #[test]
    fn test_station_without_frequencies_is_skipped() {
        let snapshot = snapshot(&[(1, &[]), (2, &[8_000])]);
        let selection = select(&snapshot, &config(&[1, 2], &[], 1_000));
        assert_eq!(selection.working_set, set(&[8_000]));
    }

    #[test]
    fn test_core_members_survive_expansion() {
        let snapshot = snapshot(&[
            (1, &[10_000, 10_500]),
            (2, &[10_200]),
            (3, &[9_900, 10_800]),
            (4, &[9_950, 10_600, 10_990]),
        ]);
        let selection = select(&snapshot, &config(&[1, 2], &[3], 1_000));
        for core in [10_000, 10_200, 10_500] {
            assert!(selection.working_set.contains(&core));
        }
        assert!(selection.span <= 1_000);
    }

    #[test]
    fn test_snaps_to_smallest_covering_rate() {
        let snapshot = snapshot(&[(1, &[8_000_000]), (2, &[8_300_000])]);
        let mut config = config(&[1, 2], &[], 1_000_000);
        config.sample_rate_options = vec![384_000, 192_000];
        let selection = select(&snapshot, &config);

        assert_eq!(selection.span, 300_000);
        assert_eq!(selection.sample_rate, 384_000);
        assert_eq!(selection.effective_capacity, 384_000);
        assert!(selection.diagnostics.dropped.is_empty());
    }

    #[test]
    fn test_largest_rate_bounds_packing() {
        let snapshot = snapshot(&[(1, &[8_000_000]), (2, &[8_100_000]), (3, &[8_300_000])]);
        let mut config = config(&[1, 2, 3], &[], 1_000_000);
        config.sample_rate_options = vec![192_000];
        let selection = select(&snapshot, &config);

        assert_eq!(selection.sample_rate, 192_000);
        assert!(selection.diagnostics.dropped.is_empty());
        assert_eq!(selection.working_set, set(&[8_000_000, 8_100_000]));
        assert!(selection.span <= 192_000);
    }

    #[test]
    fn test_fringe_next_to_core_survives_rate_cap() {
        // 13_000 kHz never fits a 2 MS/s window, 8_100 kHz sits right next to the kept core member
        let snapshot = snapshot(&[(1, &[8_000_000]), (2, &[13_000_000]), (3, &[8_100_000])]);
        let mut config = config(&[1, 2], &[3], 9_250_000);
        config.sample_rate_options = vec![2_000_000];
        let selection = select(&snapshot, &config);

        assert_eq!(selection.working_set, set(&[8_000_000, 8_100_000]));
        assert_eq!(selection.sample_rate, 2_000_000);
        assert!(selection.diagnostics.dropped.is_empty());
        assert_eq!(selection.diagnostics.fringe, 1);
    }

    #[test]
    fn test_snap_trims_latest_admissions() {
        let mut window = SelectionWindow::new();
        for (frequency, class) in [
            (8_000_000, RankClass::Core),
            (8_100_000, RankClass::Fringe),
            (8_300_000, RankClass::Other),
        ] {
            window.insert(Member { frequency, station: 1, class });
        }
        let mut config = config(&[], &[], 1_000_000);
        config.sample_rate_options = vec![192_000];
        let mut diagnostics = Diagnostics::default();

        assert_eq!(snap_capacity(&mut window, &config, &mut diagnostics), 192_000);
        assert_eq!(diagnostics.dropped, vec![8_300_000]);
        assert_eq!(window.frequencies(), set(&[8_000_000, 8_100_000]));
    }

    #[test]
    fn test_filter_factor_shrinks_usable_span() {
        let snapshot = snapshot(&[(1, &[10_000]), (2, &[10_950])]);
        let mut config = config(&[1, 2], &[], 1_000);
        assert_eq!(select(&snapshot, &config).working_set.len(), 2);
        config.filter_factor = 0.9;
        let selection = select(&snapshot, &config);
        assert_eq!(selection.working_set.len(), 1);
        assert_eq!(selection.sample_rate, 0);
    }

    #[test]
    fn test_repeatable() {
        let snapshot = snapshot(&[(1, &[10_000, 12_000]), (2, &[11_000]), (3, &[10_500, 13_000])]);
        let config = config(&[2, 1], &[3], 2_000);
        let first = select(&snapshot, &config);
        let second = select(&snapshot, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shrinking_capacity_on_clustered_bands() {
        let snapshot = snapshot(&[
            (1, &[8_900, 10_000, 13_300]),
            (2, &[8_930, 11_300]),
            (3, &[10_060, 13_270]),
            (4, &[6_600, 8_940]),
        ]);
        // greedy packing is not monotone in general; this layout happens to be
        let mut previous = usize::MAX;
        for capacity in [10_000, 5_000, 3_000, 2_000, 1_200, 100, 10] {
            let selection = select(&snapshot, &config(&[1, 2], &[3], capacity));
            assert!(selection.working_set.len() <= previous, "capacity {}", capacity);
            assert!(selection.span <= capacity);
            previous = selection.working_set.len();
        }
    }

    #[test]
    fn test_unranked_uses_everything_that_fits() {
        let snapshot = snapshot(&[(1, &[10_000]), (2, &[10_500]), (3, &[30_000])]);
        let selection = select_unranked(&snapshot, &config(&[3], &[], 1_000));
        assert_eq!(selection.working_set, set(&[10_000, 10_500]));
        assert_eq!(selection.diagnostics.other, 2);
        assert!(selection.diagnostics.notes.iter().any(|n| n.starts_with("bootstrap")));
    }
}
