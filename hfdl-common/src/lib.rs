///! Wire shapes shared by the HFDL frequency watcher and anything that produces
///! or consumes ground-station data (directory service, cache files, decoder output).

pub mod packet;
pub mod types;

pub use packet::{HfdlFrame, ReportKind, StationReport};
pub use types::{
    hz_to_khz, khz_to_hz, ActiveFrequencies, GroundStationRecord, GroundStationTable, Hz, StationId,
};
