///! Decoder JSON records.
///!
///! Only the parts needed to learn which station is active on which frequency
///! are modelled; everything else in a frame is ignored by serde.

use serde::Deserialize;

use super::types::{khz_to_hz, Hz, StationId};

/// One decoded HFDL frame (the `hfdl` object of a decoder JSON line)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HfdlFrame {
    /// Frequency the frame was heard on (Hz)
    #[serde(default)]
    pub freq: Option<u64>,

    #[serde(default)]
    pub spdu: Option<Spdu>,

    #[serde(default)]
    pub lpdu: Option<Lpdu>,
}

/// Squitter PDU
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Spdu {
    #[serde(default)]
    pub gs_status: Vec<GroundStationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundStationStatus {
    pub gs: GroundStationRef,
    #[serde(default)]
    pub freqs: Vec<FrequencyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundStationRef {
    pub id: StationId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FrequencyEntry {
    /// kHz
    pub freq: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Lpdu {
    #[serde(default)]
    pub hfnpdu: Option<Hfnpdu>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hfnpdu {
    #[serde(default)]
    pub freq_data: Vec<FrequencyData>,
}

/// "Frequency data" HFNPDU: which ground-station frequencies an aircraft hears
#[derive(Debug, Clone, Deserialize)]
pub struct FrequencyData {
    pub gs: GroundStationRef,
    #[serde(default)]
    pub heard_on_freqs: Vec<FrequencyEntry>,
}

/// Where a station report came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Squitter,
    FrequencyData,
}

/// (station, frequencies) pair extracted from a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReport {
    pub kind: ReportKind,
    pub station_id: StationId,
    pub name: Option<String>,
    pub frequencies: Vec<Hz>,
}

impl HfdlFrame {
    /// Parse one decoder output line. Accepts both the usual `{"hfdl": {...}}`
    /// envelope and a bare frame.
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(line)?;
        let frame = match value.get_mut("hfdl") {
            Some(inner) => inner.take(),
            None => value,
        };
        serde_json::from_value(frame)
    }

    /// Station reports carried by this frame, squitters first.
    pub fn station_reports(&self) -> Vec<StationReport> {
        let mut reports = Vec::new();

        if let Some(spdu) = &self.spdu {
            for status in &spdu.gs_status {
                reports.push(StationReport {
                    kind: ReportKind::Squitter,
                    station_id: status.gs.id,
                    name: status.gs.name.clone(),
                    frequencies: to_hz(&status.freqs),
                });
            }
        }

        if let Some(hfnpdu) = self.lpdu.as_ref().and_then(|l| l.hfnpdu.as_ref()) {
            for data in &hfnpdu.freq_data {
                if data.heard_on_freqs.is_empty() {
                    continue;
                }
                reports.push(StationReport {
                    kind: ReportKind::FrequencyData,
                    station_id: data.gs.id,
                    name: data.gs.name.clone(),
                    frequencies: to_hz(&data.heard_on_freqs),
                });
            }
        }

        reports
    }
}

fn to_hz(entries: &[FrequencyEntry]) -> Vec<Hz> {
    let mut freqs: Vec<Hz> = entries
        .iter()
        .filter(|e| e.freq.is_finite() && e.freq > 0.0)
        .map(|e| khz_to_hz(e.freq))
        .collect();
    freqs.sort_unstable();
    freqs.dedup();
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUITTER: &str = r#"{"hfdl":{"app":{"name":"dumphfdl"},"t":{"sec":1718000123,"usec":5},
        "freq":8927000,"bit_rate":300,"sig_level":-20.1,"noise_level":-40.2,
        "spdu":{"src":{"type":"Ground station","id":1},
        "gs_status":[
            {"gs":{"type":"Ground station","id":1,"name":"San Francisco, California"},
             "utc_sync":true,"freqs":[{"id":0,"freq":8927.0},{"id":1,"freq":10081.0},{"id":2,"freq":21934.0}]},
            {"gs":{"type":"Ground station","id":7,"name":"Shannon, Ireland"},
             "utc_sync":true,"freqs":[{"id":3,"freq":8942.0}]}
        ]}}}"#;

    const FREQ_DATA: &str = r#"{"hfdl":{"t":{"sec":1718000200,"usec":0},"freq":13276000,
        "lpdu":{"type":{"id":13,"name":"Unnumbered data"},"hfnpdu":{"type":{"id":209,"name":"Frequency data"},
        "freq_data":[
            {"gs":{"type":"Ground station","id":4,"name":"Riverhead, New York"},"listening_on_freqs":[],"heard_on_freqs":[{"id":2,"freq":13276.0},{"id":5,"freq":6661.0}]},
            {"gs":{"type":"Ground station","id":9,"name":"Barrow, Alaska"},"listening_on_freqs":[],"heard_on_freqs":[]}
        ]}}}}"#;

    #[test]
    fn test_squitter_reports() {
        let frame = HfdlFrame::from_line(SQUITTER).unwrap();
        let reports = frame.station_reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].kind, ReportKind::Squitter);
        assert_eq!(reports[0].station_id, 1);
        assert_eq!(reports[0].frequencies, vec![8_927_000, 10_081_000, 21_934_000]);
        assert_eq!(reports[1].name.as_deref(), Some("Shannon, Ireland"));
    }

    #[test]
    fn test_frequency_data_reports_skip_empty() {
        let frame = HfdlFrame::from_line(FREQ_DATA).unwrap();
        let reports = frame.station_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::FrequencyData);
        assert_eq!(reports[0].frequencies, vec![6_661_000, 13_276_000]);
    }

    #[test]
    fn test_unrelated_frame_has_no_reports() {
        let line = r#"{"hfdl":{"t":{"sec":1,"usec":0},"freq":8927000,"lpdu":{"type":{"id":47,"name":"Logon request"}}}}"#;
        let frame = HfdlFrame::from_line(line).unwrap();
        assert!(frame.station_reports().is_empty());
    }

    #[test]
    fn test_bare_frame_and_garbage() {
        let bare = r#"{"spdu":{"gs_status":[{"gs":{"id":3},"freqs":[{"freq":6712}]}]}}"#;
        let frame = HfdlFrame::from_line(bare).unwrap();
        assert_eq!(frame.station_reports()[0].frequencies, vec![6_712_000]);

        assert!(HfdlFrame::from_line("[08:00:01] some text output").is_err());
        assert!(HfdlFrame::from_line(r#"{"hfdl":{"spdu":{"gs_status":[{"gs":{"name":"no id"}}]}}}"#).is_err());
    }
}
