pub mod bootstrap;
pub mod cache;
pub mod chain;
pub mod remote;

pub use bootstrap::bootstrap_snapshot;
pub use cache::SnapshotCache;
pub use chain::{AcquisitionChain, Acquired};
pub use remote::{sources_from_config, FileSource, RemoteSource, SourceError, StationSource};
