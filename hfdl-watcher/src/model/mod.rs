pub mod registry;
pub mod station;

pub use registry::{ObservationStats, StationRegistry};
pub use station::{FrequencySet, SnapshotSource, Station, StationSnapshot};
