use anyhow::{Context, Result};
use hfdl_common::GroundStationTable;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// On-disk copy of the last good directory response
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create cache directory")?;
                info!("Created cache directory: {:?}", parent);
            }
        }
        Ok(())
    }

    /// Load the cached table; `None` when no cache file exists yet
    pub async fn load(&self) -> Result<Option<GroundStationTable>> {
        if !self.path.exists() {
            debug!("Cache file does not exist: {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .context("Failed to read cache file")?;

        let table = GroundStationTable::from_json(&content).context("Failed to parse cache file")?;

        debug!("Loaded {} stations from cache", table.ground_stations.len());
        Ok(Some(table))
    }

    pub async fn save(&self, table: &GroundStationTable) -> Result<()> {
        self.ensure_parent_dir().await?;

        let content = table.to_json_pretty().context("Failed to serialize cache")?;

        fs::write(&self.path, content)
            .await
            .context("Failed to write cache file")?;

        debug!("Saved {} stations to cache", table.ground_stations.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfdl_common::{ActiveFrequencies, GroundStationRecord};
    use tempfile::TempDir;

    fn table() -> GroundStationTable {
        GroundStationTable {
            when: None,
            ground_stations: vec![GroundStationRecord {
                id: 2,
                name: "Molokai, Hawaii".to_string(),
                frequencies: ActiveFrequencies {
                    active: vec![13312.0, 8912.0],
                },
                last_updated: 1718000000.0,
            }],
        }
    }

    #[tokio::test]
    async fn test_save_and_load_cache() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(temp_dir.path().join("nested").join("gs.json"));

        assert!(cache.load().await.unwrap().is_none());

        cache.save(&table()).await.unwrap();
        let loaded = cache.load().await.unwrap().unwrap();
        assert_eq!(loaded, table());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gs.json");
        std::fs::write(&path, "{ truncated").unwrap();

        assert!(SnapshotCache::new(&path).load().await.is_err());
    }
}
