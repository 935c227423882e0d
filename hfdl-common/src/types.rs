///! Ground-station table as served by the HFDL directory service.
///!
///! The same shape is written to the on-disk cache, so a cache file can be
///! handed to anything that understands the directory response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frequency in Hz. Everything on the wire is kHz; convert at the edges.
pub type Hz = u64;

/// HFDL ground station identifier
pub type StationId = u32;

/// Convert a kHz value as found on the wire to Hz.
pub fn khz_to_hz(khz: f64) -> Hz {
    (khz * 1000.0).round().max(0.0) as Hz
}

/// Convert Hz back to the integer kHz the decoder and directory expect.
pub fn hz_to_khz(hz: Hz) -> u64 {
    (hz + 500) / 1000
}

/// Full station table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundStationTable {
    /// When the table was written (only present in cache files)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ground_stations: Vec<GroundStationRecord>,
}

/// One station row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundStationRecord {
    pub id: StationId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub frequencies: ActiveFrequencies,

    /// Unix seconds. The directory reports fractional seconds.
    #[serde(default)]
    pub last_updated: f64,
}

/// Frequency block of a station row (kHz)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveFrequencies {
    #[serde(default)]
    pub active: Vec<f64>,
}

impl GroundStationTable {
    /// Parse a directory response or cache file body.
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_empty(&self) -> bool {
        self.ground_stations.is_empty()
    }

    /// Total number of advertised frequencies across all stations
    pub fn frequency_count(&self) -> usize {
        self.ground_stations
            .iter()
            .map(|gs| gs.frequencies.active.len())
            .sum()
    }
}

impl GroundStationRecord {
    /// Active frequencies converted to Hz, ascending, without duplicates.
    pub fn active_hz(&self) -> Vec<Hz> {
        let mut freqs: Vec<Hz> = self
            .frequencies
            .active
            .iter()
            .filter(|f| f.is_finite() && **f > 0.0)
            .map(|f| khz_to_hz(*f))
            .collect();
        freqs.sort_unstable();
        freqs.dedup();
        freqs
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        if !self.last_updated.is_finite() || self.last_updated <= 0.0 {
            return None;
        }
        let secs = self.last_updated.trunc() as i64;
        let nanos = (self.last_updated.fract() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}
