///! Decoder output consumers
///!
///! `SquitterListener` reads the JSON record stream on stdout and feeds
///! station observations into the registry. `StderrWatchdog` logs stderr and
///! asks for a stop when the decoder is wedged.

use chrono::Utc;
use hfdl_common::HfdlFrame;
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, info, warn};

use crate::logging::DECODER_TARGET;
use crate::model::StationRegistry;

const FATAL_PATTERNS: &[&str] = &["^Unable to initialize input"];
const RECOVERABLE_PATTERNS: &[&str] = &["readStream failed: TIMEOUT"];
const MAX_RECOVERABLE_ERRORS: u32 = 10;

/// Recoverable stderr errors since the last decoded record. The listener
/// resets it, the watchdog counts up.
pub type ErrorCounter = Arc<AtomicU32>;

/// What one listener run saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub records: u64,
    pub reports: u64,
    pub malformed: u64,
    pub forwarded: u64,
}

pub struct SquitterListener {
    registry: Arc<StationRegistry>,
    errors: ErrorCounter,
}

impl SquitterListener {
    pub fn new(registry: Arc<StationRegistry>, errors: ErrorCounter) -> Self {
        Self { registry, errors }
    }

    /// Consume `reader` line by line until it closes
    pub async fn run<R: AsyncRead + Unpin>(self, reader: R) -> ListenerStats {
        let mut stats = ListenerStats::default();
        let mut lines = LinesStream::new(BufReader::new(reader).lines());

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Decoder output stream failed: {}", e);
                    break;
                }
            };
            self.handle_line(line.trim(), &mut stats).await;
        }

        debug!(
            "Decoder output closed: {} records, {} station reports, {} malformed",
            stats.records, stats.reports, stats.malformed
        );
        stats
    }

    async fn handle_line(&self, line: &str, stats: &mut ListenerStats) {
        if line.is_empty() {
            return;
        }
        if !line.starts_with('{') {
            stats.forwarded += 1;
            info!(target: DECODER_TARGET, "{}", line);
            return;
        }

        let frame = match HfdlFrame::from_line(line) {
            Ok(frame) => frame,
            Err(e) => {
                stats.malformed += 1;
                debug!("Skipping malformed decoder record: {}", e);
                return;
            }
        };
        stats.records += 1;
        self.errors.store(0, Ordering::Relaxed);

        let reports = frame.station_reports();
        if reports.is_empty() {
            stats.forwarded += 1;
            info!(target: DECODER_TARGET, "{}", line);
            return;
        }

        let now = Utc::now();
        for report in &reports {
            stats.reports += 1;
            if self.registry.merge_report(report, now).await {
                info!(
                    "Heard station #{} on {:?} ({:?})",
                    report.station_id, report.frequencies, report.kind
                );
            }
        }
    }
}

/// Why the watchdog wants the decoder stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trip {
    Fatal(String),
    TooManyErrors(String),
}

impl std::fmt::Display for Trip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trip::Fatal(line) => write!(f, "decoder error \"{}\"", line),
            Trip::TooManyErrors(line) => write!(f, "too many recoverable errors, last \"{}\"", line),
        }
    }
}

pub struct StderrWatchdog {
    fatal: Vec<Regex>,
    recoverable: Vec<Regex>,
    errors: ErrorCounter,
    trip: mpsc::Sender<Trip>,
}

impl StderrWatchdog {
    pub fn new(errors: ErrorCounter, trip: mpsc::Sender<Trip>) -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
        };
        Self {
            fatal: compile(FATAL_PATTERNS),
            recoverable: compile(RECOVERABLE_PATTERNS),
            errors,
            trip,
        }
    }

    /// Inspect one stderr line
    pub fn check(&self, line: &str) -> Option<Trip> {
        if self.fatal.iter().any(|re| re.is_match(line)) {
            return Some(Trip::Fatal(line.to_string()));
        }
        if self.recoverable.iter().any(|re| re.is_match(line)) {
            let count = self.errors.fetch_add(1, Ordering::Relaxed) + 1;
            if count > MAX_RECOVERABLE_ERRORS {
                return Some(Trip::TooManyErrors(line.to_string()));
            }
        }
        None
    }

    /// Log stderr until it closes or the watchdog trips
    pub async fn run<R: AsyncRead + Unpin>(self, reader: R) {
        let mut lines = LinesStream::new(BufReader::new(reader).lines());
        while let Some(Ok(line)) = lines.next().await {
            let line = line.trim_end();
            info!(target: DECODER_TARGET, "{}", line);
            if let Some(trip) = self.check(line) {
                warn!("Stopping decoder: {}", trip);
                let _ = self.trip.send(trip).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUITTER: &str = r#"{"hfdl":{"t":{"sec":1718000123,"usec":5},"freq":8927000,"spdu":{"gs_status":[{"gs":{"id":1,"name":"San Francisco, California"},"freqs":[{"freq":8927.0},{"freq":10081.0}]}]}}}"#;
    const OTHER: &str = r#"{"hfdl":{"t":{"sec":1718000124,"usec":0},"freq":8927000,"lpdu":{"type":{"id":47,"name":"Logon confirm"}}}}"#;

    #[tokio::test]
    async fn test_listener_merges_squitters() {
        let registry = Arc::new(StationRegistry::new());
        let errors = ErrorCounter::default();
        errors.store(7, Ordering::Relaxed);

        let output = format!("{}\n{}\n{{\"hfdl\": broken\nStarting decoder\n\n", SQUITTER, OTHER);
        let stats = SquitterListener::new(registry.clone(), errors.clone())
            .run(output.as_bytes())
            .await;

        assert_eq!(stats.records, 2);
        assert_eq!(stats.reports, 1);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.forwarded, 2);
        assert_eq!(errors.load(Ordering::Relaxed), 0);

        let snapshot = registry
            .observed_snapshot(Utc::now(), chrono::Duration::hours(1))
            .await
            .unwrap();
        let station = snapshot.get(1).unwrap();
        assert_eq!(station.frequencies.len(), 2);
        assert!(station.frequencies.contains(&10_081_000));
    }

    #[test]
    fn test_watchdog_fatal_pattern() {
        let (tx, _rx) = mpsc::channel(1);
        let watchdog = StderrWatchdog::new(ErrorCounter::default(), tx);
        assert!(watchdog.check("Found Rx device: RSPdx").is_none());
        assert!(matches!(
            watchdog.check("Unable to initialize input, exiting"),
            Some(Trip::Fatal(_))
        ));
        // anchored at line start
        assert!(watchdog.check("note: Unable to initialize input").is_none());
    }

    #[tokio::test]
    async fn test_watchdog_trips_after_repeated_timeouts() {
        let (tx, mut rx) = mpsc::channel(1);
        let errors = ErrorCounter::default();
        let watchdog = StderrWatchdog::new(errors.clone(), tx);

        let stderr = "readStream failed: TIMEOUT\n".repeat(11) + "never reached\n";
        watchdog.run(stderr.as_bytes()).await;

        assert!(matches!(rx.recv().await, Some(Trip::TooManyErrors(_))));
        assert_eq!(errors.load(Ordering::Relaxed), 11);
    }
}
