use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use hfdl_common::{Hz, StationId};
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file when `--config` is absent
pub const CONFIG_ENV: &str = "HFDL_WATCHER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_DIRECTORY_URL: &str = "https://api.airframes.io/hfdl/ground-stations";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("max_samples_hz must be greater than zero")]
    ZeroCapacity,
    #[error("filter_factor must be in (0, 1], got {0}")]
    FilterFactor(f64),
    #[error("ignore range {0}-{1} has low above high")]
    InvertedRange(Hz, Hz),
    #[error("watch interval must be greater than zero")]
    ZeroInterval,
}

/// A configured station reference: numeric id or display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationRef {
    Id(StationId),
    Name(String),
}

impl StationRef {
    /// Numeric id, also for names that are all digits ("7" is station 7).
    pub fn as_id(&self) -> Option<StationId> {
        match self {
            StationRef::Id(id) => Some(*id),
            StationRef::Name(name) => name.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for StationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StationRef::Id(id) => write!(f, "#{}", id),
            StationRef::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

/// Inclusive Hz interval excluded from selection, written as `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreRange(pub Hz, pub Hz);

impl IgnoreRange {
    pub fn contains(&self, freq: Hz) -> bool {
        self.0 <= freq && freq <= self.1
    }
}

/// Which seed window to keep regardless of size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedPreference {
    #[default]
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub core_ids: Vec<StationRef>,

    #[serde(default)]
    pub fringe_ids: Vec<StationRef>,

    #[serde(default)]
    pub skip_fill: bool,

    #[serde(default = "default_max_samples_hz")]
    pub max_samples_hz: u64,

    #[serde(default)]
    pub sample_rate_options: Vec<u64>,

    #[serde(default)]
    pub ignore_ranges: Vec<IgnoreRange>,

    #[serde(default = "default_filter_factor")]
    pub filter_factor: f64,

    #[serde(default)]
    pub prefer: SeedPreference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// URLs or absolute paths tried after the directory service
    #[serde(default)]
    pub backup_sources: Vec<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_request_attempts")]
    pub request_attempts: u32,

    /// Cache file; caching is off when unset
    #[serde(default)]
    pub cache_path: Option<PathBuf>,

    #[serde(default = "default_observation_expiry_secs")]
    pub observation_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,

    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,

    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    #[serde(default = "default_launch_attempts")]
    pub launch_attempts: u32,

    /// Forwarded verbatim as `--<name> <value>`
    #[serde(default)]
    pub passthrough: BTreeMap<String, String>,

    /// Extra `--output` specifications
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub packet_log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_max_samples_hz() -> u64 {
    9_250_000
}

fn default_filter_factor() -> f64 {
    0.9
}

fn default_directory_url() -> String {
    DEFAULT_DIRECTORY_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_request_attempts() -> u32 {
    2
}

fn default_observation_expiry_secs() -> u64 {
    2 * 3600
}

fn default_program() -> String {
    "dumphfdl".to_string()
}

fn default_settle_secs() -> u64 {
    5
}

fn default_stop_grace_secs() -> u64 {
    10
}

fn default_max_restarts() -> u32 {
    5
}

fn default_launch_attempts() -> u32 {
    3
}

fn default_interval_secs() -> u64 {
    600
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            core_ids: Vec::new(),
            fringe_ids: Vec::new(),
            skip_fill: false,
            max_samples_hz: default_max_samples_hz(),
            sample_rate_options: Vec::new(),
            ignore_ranges: Vec::new(),
            filter_factor: default_filter_factor(),
            prefer: SeedPreference::None,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            backup_sources: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
            request_attempts: default_request_attempts(),
            cache_path: None,
            observation_expiry_secs: default_observation_expiry_secs(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            settle_secs: default_settle_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            max_restarts: default_max_restarts(),
            launch_attempts: default_launch_attempts(),
            passthrough: BTreeMap::new(),
            outputs: Vec::new(),
            packet_log_dir: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            selection: SelectionConfig::default(),
            acquisition: AcquisitionConfig::default(),
            decoder: DecoderConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl SelectionConfig {
    /// Widest span (Hz) a given sample rate can monitor.
    pub fn usable_span(&self, sample_rate: u64) -> Hz {
        (sample_rate as f64 * self.filter_factor).floor() as Hz
    }

    /// Smallest sample rate whose usable span covers `span`.
    pub fn required_rate(&self, span: Hz) -> u64 {
        (span as f64 / self.filter_factor).ceil() as u64
    }

    /// Widest span worth packing: the capacity ceiling, further capped by the
    /// largest discrete sample rate when those are configured.
    pub fn packing_limit(&self) -> Hz {
        let ceiling = self.usable_span(self.max_samples_hz);
        match self.sorted_rate_options().last() {
            Some(&largest) => ceiling.min(self.usable_span(largest)),
            None => ceiling,
        }
    }

    pub fn is_ignored(&self, freq: Hz) -> bool {
        self.ignore_ranges.iter().any(|r| r.contains(freq))
    }

    /// Sample rate options, ascending and deduplicated
    pub fn sorted_rate_options(&self) -> Vec<u64> {
        let mut options = self.sample_rate_options.clone();
        options.sort_unstable();
        options.dedup();
        options
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_samples_hz == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.filter_factor > 0.0 && self.filter_factor <= 1.0) {
            return Err(ConfigError::FilterFactor(self.filter_factor));
        }
        if let Some(r) = self.ignore_ranges.iter().find(|r| r.0 > r.1) {
            return Err(ConfigError::InvertedRange(r.0, r.1));
        }
        Ok(())
    }
}

impl WatcherConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: WatcherConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config path (flag, then environment, then `config.toml`)
    /// and load it. A missing default file means built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => PathBuf::from(path),
                None => {
                    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                    if !path.exists() {
                        return Ok(Self::default());
                    }
                    path
                }
            },
        };
        let config = Self::from_file(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection.validate()?;
        if self.watch.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: WatcherConfig = toml::from_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.selection.max_samples_hz, 9_250_000);
        assert_eq!(config.watch.interval_secs, 600);
        assert_eq!(config.decoder.program, "dumphfdl");
        assert!(config.acquisition.cache_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
            log_level = "debug"

            [selection]
            core_ids = [2, "Riverhead, New York", "7"]
            fringe_ids = [1]
            skip_fill = true
            max_samples_hz = 2000000
            sample_rate_options = [768000, 192000, 384000]
            ignore_ranges = [[0, 6000000]]
            prefer = "high"

            [acquisition]
            backup_sources = ["/var/lib/hfdl/stations.json"]
            cache_path = "/tmp/gs.json"

            [decoder]
            settle_secs = 2
            passthrough = { soapysdr = "driver=sdrplay", gain = "40" }
        "#;
        let config: WatcherConfig = toml::from_str(content).unwrap();
        let selection = &config.selection;

        assert_eq!(selection.core_ids[0], StationRef::Id(2));
        assert_eq!(selection.core_ids[1], StationRef::Name("Riverhead, New York".to_string()));
        assert_eq!(selection.core_ids[2].as_id(), Some(7));
        assert!(selection.skip_fill);
        assert_eq!(selection.sorted_rate_options(), vec![192000, 384000, 768000]);
        assert!(selection.is_ignored(5_508_000));
        assert!(!selection.is_ignored(8_927_000));
        assert_eq!(selection.prefer, SeedPreference::High);
        assert_eq!(config.decoder.passthrough.get("gain").map(String::as_str), Some("40"));
        assert_eq!(config.acquisition.cache_path, Some(PathBuf::from("/tmp/gs.json")));
    }

    #[test]
    fn test_span_and_rate_conversions() {
        let selection = SelectionConfig::default();
        assert_eq!(selection.usable_span(1_000_000), 900_000);
        assert_eq!(selection.required_rate(900_000), 1_000_000);
        assert_eq!(selection.required_rate(0), 0);

        let capped = SelectionConfig {
            sample_rate_options: vec![192_000, 768_000],
            ..SelectionConfig::default()
        };
        assert_eq!(selection.packing_limit(), 8_325_000);
        assert_eq!(capped.packing_limit(), 691_200);
    }

    #[test]
    fn test_validation_errors() {
        let mut selection = SelectionConfig::default();
        selection.filter_factor = 1.5;
        assert_eq!(selection.validate(), Err(ConfigError::FilterFactor(1.5)));

        let mut selection = SelectionConfig::default();
        selection.ignore_ranges = vec![IgnoreRange(10, 5)];
        assert_eq!(selection.validate(), Err(ConfigError::InvertedRange(10, 5)));

        let mut config = WatcherConfig::default();
        config.watch.interval_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("watcher.toml");
        std::fs::write(&path, "[watch]\ninterval_secs = 120\n").unwrap();

        let config = WatcherConfig::load(Some(&path)).unwrap();
        assert_eq!(config.watch.interval_secs, 120);

        assert!(WatcherConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
