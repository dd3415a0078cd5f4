//! Durable per-device tuning progress and results

use async_trait::async_trait;
use rig_core::{DeviceId, DeviceRecord, Error, Result, TuningProgress, TuningResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Backing storage of a [`TuningLedger`]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read the stored ledger, `None` when nothing has been stored yet
    async fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored ledger. Readers must see either the previous
    /// contents or the new contents, never a mix.
    async fn save(&self, contents: &[u8]) -> Result<()>;
}

/// Ledger stored in a JSON file, replaced through a temporary file and a rename
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    sync_writes: bool,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: true,
        }
    }

    /// Skip the fsync before the rename
    pub fn without_sync(mut self) -> Self {
        self.sync_writes = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let mut name = self
            .path
            .file_name()
            .ok_or_else(|| Error::config(format!("Ledger path has no file name: {}", self.path.display())))?
            .to_os_string();
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }
}

#[async_trait]
impl LedgerStore for FileStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, contents: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let temp_file = self.temp_path()?;

        // Write to temporary file first
        tokio::fs::write(&temp_file, contents).await?;

        if self.sync_writes {
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(&temp_file)
                .await?;
            file.sync_all().await?;
        }

        // Atomic rename
        tokio::fs::rename(&temp_file, &self.path).await?;

        debug!("Ledger written to {}", self.path.display());
        Ok(())
    }
}

/// Ledger kept in memory, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contents: Arc<RwLock<Option<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Arc::new(RwLock::new(Some(contents.into()))),
        }
    }

    pub async fn contents(&self) -> Option<Vec<u8>> {
        self.contents.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.contents.read().await.clone())
    }

    async fn save(&self, contents: &[u8]) -> Result<()> {
        *self.contents.write().await = Some(contents.to_vec());
        Ok(())
    }
}

/// Per-device tuning state, persisted so an interrupted run resumes where it stopped
pub struct TuningLedger {
    store: Box<dyn LedgerStore>,
    records: BTreeMap<DeviceId, DeviceRecord>,
}

impl TuningLedger {
    /// Load the ledger from `store`.
    ///
    /// A missing or unreadable store yields an empty ledger; neither case is an error.
    pub async fn open(store: Box<dyn LedgerStore>) -> Self {
        let records = match store.load().await {
            Ok(Some(data)) => match parse_records(&data) {
                Ok(records) => {
                    info!("Loaded tuning ledger with {} devices", records.len());
                    records
                }
                Err(e) => {
                    warn!("Discarding tuning ledger: {}", e);
                    BTreeMap::new()
                }
            },
            Ok(None) => {
                info!("Creating tuning ledger");
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Failed to read tuning ledger, starting empty: {}", e);
                BTreeMap::new()
            }
        };

        Self { store, records }
    }

    pub fn get(&self, device: DeviceId) -> Option<&DeviceRecord> {
        self.records.get(&device)
    }

    pub fn progress(&self, device: DeviceId) -> Option<TuningProgress> {
        self.get(device).and_then(|record| record.progress)
    }

    pub fn result(&self, device: DeviceId) -> Option<&TuningResult> {
        self.get(device).and_then(|record| record.result.as_ref())
    }

    pub fn set_progress(&mut self, device: DeviceId, progress: TuningProgress) {
        self.records.entry(device).or_default().progress = Some(progress);
    }

    pub fn set_result(&mut self, device: DeviceId, result: TuningResult) {
        self.records.entry(device).or_default().result = Some(result);
    }

    /// Write the whole ledger to its store
    pub async fn persist(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(&self.records)?;
        self.store.save(&data).await
    }

    /// Devices known to the ledger, in ascending order
    pub fn devices(&self) -> Vec<DeviceId> {
        self.records.keys().copied().collect()
    }

    pub fn records(&self) -> &BTreeMap<DeviceId, DeviceRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_records(data: &[u8]) -> Result<BTreeMap<DeviceId, DeviceRecord>> {
    serde_json::from_slice(data).map_err(|e| Error::StoreCorrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_core::SearchState;
    use tempfile::TempDir;

    fn progress(voltage: i32, memory_clock: i32) -> TuningProgress {
        TuningProgress {
            state: SearchState::LoweringMemoryClock,
            voltage,
            memory_clock,
        }
    }

    #[tokio::test]
    async fn test_missing_store_starts_empty() {
        let ledger = TuningLedger::open(Box::new(MemoryStore::new())).await;
        assert!(ledger.is_empty());
        assert!(ledger.get(DeviceId(6)).is_none());
    }

    #[tokio::test]
    async fn test_corrupt_store_starts_empty() {
        let store = MemoryStore::with_contents(b"{\"6\": {\"progress\": ".to_vec());
        let ledger = TuningLedger::open(Box::new(store)).await;
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_parse_error_is_store_corrupt() {
        let err = parse_records(b"not json").unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt(_)));
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let store = MemoryStore::new();
        let mut ledger = TuningLedger::open(Box::new(store.clone())).await;

        ledger.set_progress(DeviceId(6), progress(995, 1075));
        ledger.set_progress(DeviceId(7), progress(995, 900));
        ledger.set_result(
            DeviceId(7),
            TuningResult::Failed {
                reason: "mem clk getting too low".to_string(),
            },
        );
        ledger.persist().await.unwrap();

        let reloaded = TuningLedger::open(Box::new(store)).await;
        assert_eq!(reloaded.records(), ledger.records());
        assert_eq!(reloaded.devices(), vec![DeviceId(6), DeviceId(7)]);
        assert!(reloaded.result(DeviceId(6)).is_none());
        assert_eq!(reloaded.progress(DeviceId(6)), Some(progress(995, 1075)));
    }

    #[tokio::test]
    async fn test_stored_shape_is_keyed_by_device() {
        let store = MemoryStore::new();
        let mut ledger = TuningLedger::open(Box::new(store.clone())).await;
        ledger.set_result(DeviceId(6), TuningResult::Stable(progress(955, 1150)));
        ledger.persist().await.unwrap();

        let data = store.contents().await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(json["6"]["result"]["outcome"], "stable");
        assert_eq!(json["6"]["result"]["voltage"], 955);
        assert!(json["6"].get("progress").is_none());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("optimizer-db.json");

        let mut ledger = TuningLedger::open(Box::new(FileStore::new(&path))).await;
        assert!(ledger.is_empty());

        ledger.set_progress(DeviceId(6), progress(925, 1150));
        ledger.persist().await.unwrap();
        assert!(path.exists());
        assert!(!path.with_file_name("optimizer-db.json.tmp").exists());

        let reloaded = TuningLedger::open(Box::new(FileStore::new(&path))).await;
        assert_eq!(reloaded.records(), ledger.records());
    }

    #[tokio::test]
    async fn test_interrupted_write_leaves_previous_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("optimizer-db.json");

        let mut ledger = TuningLedger::open(Box::new(FileStore::new(&path))).await;
        ledger.set_progress(DeviceId(6), progress(925, 1150));
        ledger.persist().await.unwrap();

        // A crash between writing the temporary file and the rename
        std::fs::write(path.with_file_name("optimizer-db.json.tmp"), b"{\"6\": {\"prog").unwrap();

        let reloaded = TuningLedger::open(Box::new(FileStore::new(&path))).await;
        assert_eq!(reloaded.progress(DeviceId(6)), Some(progress(925, 1150)));

        // The next persist replaces the stale temporary file
        let mut ledger = reloaded;
        ledger.set_progress(DeviceId(6), progress(935, 1150));
        ledger.persist().await.unwrap();
        assert!(!path.with_file_name("optimizer-db.json.tmp").exists());

        let reloaded = TuningLedger::open(Box::new(FileStore::new(&path).without_sync())).await;
        assert_eq!(reloaded.progress(DeviceId(6)), Some(progress(935, 1150)));
    }
}
