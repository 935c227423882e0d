///! Station table sources: the HFDL directory service and its backups
use async_trait::async_trait;
use hfdl_common::GroundStationTable;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::AcquisitionConfig;

const RETRY_DELAY_SECONDS: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed station table from {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} advertised no frequencies")]
    Empty(String),
}

/// Anything that can produce a full ground-station table
#[async_trait]
pub trait StationSource: Send + Sync {
    /// Human-readable origin, used in logs
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<GroundStationTable, SourceError>;
}

/// Directory service (or backup URL) queried over HTTP
pub struct RemoteSource {
    url: String,
    client: reqwest::Client,
    attempts: u32,
}

impl RemoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration, attempts: u32) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SourceError::Client)?;
        Ok(Self {
            url: url.into(),
            client,
            attempts: attempts.max(1),
        })
    }

    /// Single fetch attempt
    async fn fetch_attempt(&self) -> Result<GroundStationTable, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: self.url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: response.status(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Request {
            url: self.url.clone(),
            source,
        })?;

        GroundStationTable::from_json(&body).map_err(|source| SourceError::Malformed {
            origin: self.url.clone(),
            source,
        })
    }
}

#[async_trait]
impl StationSource for RemoteSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<GroundStationTable, SourceError> {
        let mut attempt = 1;
        loop {
            match self.fetch_attempt().await {
                Ok(table) => {
                    tracing::debug!(
                        "Fetched {} stations from {}",
                        table.ground_stations.len(),
                        self.url
                    );
                    return Ok(table);
                }
                // a malformed body will not improve on retry
                Err(e @ SourceError::Malformed { .. }) => return Err(e),
                Err(e) if attempt >= self.attempts => {
                    tracing::warn!(
                        "Failed to fetch {} after {} attempts: {}",
                        self.url,
                        self.attempts,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        self.attempts,
                        self.url,
                        e
                    );
                    let delay = Duration::from_secs(RETRY_DELAY_SECONDS * attempt as u64);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Local JSON file in directory-response shape
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StationSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<GroundStationTable, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        GroundStationTable::from_json(&content).map_err(|source| SourceError::Malformed {
            origin: self.describe(),
            source,
        })
    }
}

/// Primary directory URL followed by the backups, in order. Entries starting
/// with `/` are local files.
pub fn sources_from_config(config: &AcquisitionConfig) -> Result<Vec<Box<dyn StationSource>>, SourceError> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let mut sources: Vec<Box<dyn StationSource>> = Vec::new();

    for location in std::iter::once(&config.directory_url).chain(config.backup_sources.iter()) {
        let location = location.trim();
        if location.is_empty() {
            continue;
        }
        if location.starts_with('/') {
            sources.push(Box::new(FileSource::new(location)));
        } else {
            sources.push(Box::new(RemoteSource::new(location, timeout, config.request_attempts)?));
        }
    }
    Ok(sources)
}
