///! Ground station data model
///!
///! Stations are keyed by their HFDL id; a snapshot never holds two records
///! for the same id. Frequencies are kept in Hz.

use chrono::{DateTime, Utc};
use hfdl_common::{hz_to_khz, ActiveFrequencies, GroundStationRecord, GroundStationTable, Hz, StationId};
use std::collections::{BTreeMap, BTreeSet};

/// Unordered set of frequency values. Two sets compare equal regardless of
/// the order the frequencies were chosen in.
pub type FrequencySet = BTreeSet<Hz>;

/// Which tier of the acquisition chain produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSource {
    Remote,
    Squitter,
    Cache,
    Bootstrap,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Remote => "remote",
            SnapshotSource::Squitter => "squitter",
            SnapshotSource::Cache => "cache",
            SnapshotSource::Bootstrap => "bootstrap",
        }
    }
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ground station and the frequencies it currently advertises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub frequencies: FrequencySet,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Station {
    pub fn new(id: StationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            frequencies: FrequencySet::new(),
            last_updated: None,
        }
    }

    /// Builder-style helper, mostly for fixtures
    pub fn with_frequencies(mut self, freqs: impl IntoIterator<Item = Hz>) -> Self {
        self.frequencies.extend(freqs);
        self
    }

    pub fn from_record(record: &GroundStationRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            frequencies: record.active_hz().into_iter().collect(),
            last_updated: record.last_updated_at(),
        }
    }

    pub fn to_record(&self) -> GroundStationRecord {
        GroundStationRecord {
            id: self.id,
            name: self.name.clone(),
            frequencies: ActiveFrequencies {
                active: self
                    .frequencies
                    .iter()
                    .map(|f| hz_to_khz(*f) as f64)
                    .collect(),
            },
            last_updated: self
                .last_updated
                .map(|t| t.timestamp() as f64)
                .unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let freqs: Vec<String> = self
            .frequencies
            .iter()
            .map(|hz| hz_to_khz(*hz).to_string())
            .collect();
        write!(f, "#{} {} ({})", self.id, self.name, freqs.join(","))
    }
}

/// Point-in-time view of every known station
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationSnapshot {
    stations: BTreeMap<StationId, Station>,
}

impl StationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a directory/cache table. A repeated id replaces the earlier row.
    pub fn from_table(table: &GroundStationTable) -> Self {
        let mut snapshot = Self::new();
        for record in &table.ground_stations {
            snapshot.insert(Station::from_record(record));
        }
        snapshot
    }

    pub fn to_table(&self) -> GroundStationTable {
        GroundStationTable {
            when: Some(Utc::now()),
            ground_stations: self.stations.values().map(Station::to_record).collect(),
        }
    }

    /// Insert or wholly replace the station with the same id
    pub fn insert(&mut self, station: Station) {
        self.stations.insert(station.id, station);
    }

    pub fn get(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    /// Case-insensitive exact name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&Station> {
        let name = name.trim();
        self.stations
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Stations in ascending id order
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// True when no station advertises any frequency
    pub fn has_no_frequencies(&self) -> bool {
        self.stations.values().all(|s| s.frequencies.is_empty())
    }

    pub fn frequency_count(&self) -> usize {
        self.stations.values().map(|s| s.frequencies.len()).sum()
    }

    /// Every distinct frequency advertised by any station
    pub fn all_frequencies(&self) -> FrequencySet {
        self.stations
            .values()
            .flat_map(|s| s.frequencies.iter().copied())
            .collect()
    }
}

impl FromIterator<Station> for StationSnapshot {
    fn from_iter<I: IntoIterator<Item = Station>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for station in iter {
            snapshot.insert(station);
        }
        snapshot
    }
}
