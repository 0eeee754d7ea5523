//! Shared storage for per-player bandwidth windows
//!
//! Each player process writes only its own record and reads its teammates'.
//! There is no locking across processes: a reader may see a record
//! mid-write, which the tracker treats as zero usage.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::identity::{PlayerIdentity, Team};

#[derive(Debug, thiserror::Error)]
pub enum QuotaStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed quota record: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Published window of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub team: Team,
    pub player: u8,
    /// Bytes sent per step over the trailing second
    pub window: Vec<u32>,
}

/// Key-value store holding one window per player
pub trait QuotaStore {
    /// Replace the record owned by `owner`
    fn publish(&mut self, owner: PlayerIdentity, window: &[u32]) -> Result<(), QuotaStoreError>;

    /// Read a teammate's record, `None` if it was never published
    fn load(&self, player: PlayerIdentity) -> Result<Option<Vec<u32>>, QuotaStoreError>;
}

/// One JSON file per player in a directory shared by the team processes
#[derive(Debug, Clone)]
pub struct FileQuotaStore {
    dir: PathBuf,
}

impl FileQuotaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding a player's record, e.g. `quota-red-2.json`
    pub fn path_for(&self, player: PlayerIdentity) -> PathBuf {
        self.dir
            .join(format!("quota-{}-{}.json", player.team.as_str(), player.player))
    }
}

impl QuotaStore for FileQuotaStore {
    fn publish(&mut self, owner: PlayerIdentity, window: &[u32]) -> Result<(), QuotaStoreError> {
        let record = QuotaRecord {
            team: owner.team,
            player: owner.player,
            window: window.to_vec(),
        };
        let bytes = serde_json::to_vec(&record)?;
        std::fs::write(self.path_for(owner), bytes)?;
        Ok(())
    }

    fn load(&self, player: PlayerIdentity) -> Result<Option<Vec<u32>>, QuotaStoreError> {
        let bytes = match std::fs::read(self.path_for(player)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: QuotaRecord = serde_json::from_slice(&bytes)?;
        Ok(Some(record.window))
    }
}

/// In-process store; clones share the same records
#[derive(Debug, Clone, Default)]
pub struct MemoryQuotaStore {
    records: Arc<RwLock<HashMap<PlayerIdentity, Vec<u32>>>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of players that have published
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl QuotaStore for MemoryQuotaStore {
    fn publish(&mut self, owner: PlayerIdentity, window: &[u32]) -> Result<(), QuotaStoreError> {
        self.records.write().insert(owner, window.to_vec());
        Ok(())
    }

    fn load(&self, player: PlayerIdentity) -> Result<Option<Vec<u32>>, QuotaStoreError> {
        Ok(self.records.read().get(&player).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "robot-gateway-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = temp_dir("file-store");
        let mut store = FileQuotaStore::new(&dir);
        let me = PlayerIdentity::new(Team::Red, 2);

        store.publish(me, &[1, 2, 3]).unwrap();

        assert_eq!(store.load(me).unwrap(), Some(vec![1, 2, 3]));
        assert!(store.path_for(me).ends_with("quota-red-2.json"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_store_missing_player() {
        let dir = temp_dir("file-missing");
        let store = FileQuotaStore::new(&dir);
        assert_eq!(store.load(PlayerIdentity::new(Team::Blue, 4)).unwrap(), None);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_file_store_torn_record() {
        let dir = temp_dir("file-torn");
        let store = FileQuotaStore::new(&dir);
        let mate = PlayerIdentity::new(Team::Blue, 1);
        std::fs::write(store.path_for(mate), b"{\"team\":\"Blue\",\"pla").unwrap();

        assert!(matches!(store.load(mate), Err(QuotaStoreError::Parse(_))));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let mut a = MemoryQuotaStore::new();
        let b = a.clone();
        let me = PlayerIdentity::new(Team::Red, 1);

        a.publish(me, &[10, 20]).unwrap();

        assert_eq!(b.load(me).unwrap(), Some(vec![10, 20]));
        assert_eq!(b.len(), 1);
    }
}
