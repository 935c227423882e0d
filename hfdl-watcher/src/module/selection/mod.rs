///! Frequency selection
///!
///! Turns a station snapshot and the selection config into a bounded working
///! set. Everything under this module is pure computation: no I/O, no locks,
///! no clocks.

pub mod engine;
pub mod experiments;
pub mod ranking;
pub mod window;

use hfdl_common::{hz_to_khz, Hz};

use crate::config::{SelectionConfig, StationRef};
use crate::model::FrequencySet;

pub use engine::{select, select_unranked};
pub use experiments::{run_experiments, Experiment};
pub use ranking::{rank_stations, RankedStation, Ranking};
pub use window::{Member, SelectionWindow};

/// Priority class a station was assigned by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankClass {
    Core,
    Fringe,
    Other,
}

/// Which seed window became the working window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedDirection {
    #[default]
    Low,
    High,
}

impl std::fmt::Display for SeedDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedDirection::Low => write!(f, "low"),
            SeedDirection::High => write!(f, "high"),
        }
    }
}

/// Explanation of how a working set came about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub seed: SeedDirection,
    pub core: usize,
    pub fringe: usize,
    pub other: usize,
    /// Frequencies removed while snapping to a sample rate, latest admission first
    pub dropped: Vec<Hz>,
    /// Configured station references that matched nothing
    pub unresolved: Vec<StationRef>,
    pub notes: Vec<String>,
    pub low_seed: FrequencySet,
    pub high_seed: FrequencySet,
}

/// Result of one selection round
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub working_set: FrequencySet,
    /// Working set in order of admission
    pub members: Vec<Hz>,
    pub span: Hz,
    /// Sample rate the decoder should run at to cover `span`
    pub sample_rate: u64,
    pub effective_capacity: u64,
    pub diagnostics: Diagnostics,
}

impl Selection {
    pub fn empty(config: &SelectionConfig, diagnostics: Diagnostics) -> Self {
        let effective_capacity = config
            .sorted_rate_options()
            .first()
            .copied()
            .unwrap_or(config.max_samples_hz);
        Self {
            working_set: FrequencySet::new(),
            members: Vec::new(),
            span: 0,
            sample_rate: 0,
            effective_capacity,
            diagnostics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.working_set.is_empty()
    }

    /// Working set in kHz, ascending
    pub fn khz(&self) -> Vec<u64> {
        self.working_set.iter().map(|f| hz_to_khz(*f)).collect()
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let khz: Vec<String> = self.khz().iter().map(|k| k.to_string()).collect();
        write!(
            f,
            "[{}] span {} Hz @ {} S/s (seed {}, core {}, fringe {}, other {})",
            khz.join(", "),
            self.span,
            self.sample_rate,
            self.diagnostics.seed,
            self.diagnostics.core,
            self.diagnostics.fringe,
            self.diagnostics.other
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection_capacity() {
        let config = SelectionConfig {
            sample_rate_options: vec![384_000, 192_000],
            ..SelectionConfig::default()
        };
        let selection = Selection::empty(&config, Diagnostics::default());
        assert!(selection.is_empty());
        assert_eq!(selection.effective_capacity, 192_000);
        assert_eq!(Selection::empty(&SelectionConfig::default(), Diagnostics::default()).effective_capacity, 9_250_000);
    }

    #[test]
    fn test_display_lists_khz() {
        let mut selection = Selection::empty(&SelectionConfig::default(), Diagnostics::default());
        selection.working_set = [8_942_000, 8_927_000].into_iter().collect();
        selection.span = 15_000;
        selection.sample_rate = 16_667;
        assert_eq!(
            selection.to_string(),
            "[8927, 8942] span 15000 Hz @ 16667 S/s (seed low, core 0, fringe 0, other 0)"
        );
    }
}
