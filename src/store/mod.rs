//! Versioned local key-value store
//!
//! Layout of a store directory:
//! - `db.json`: schema version plus every document collection
//! - `blobs/`: image bytes, one file per SHA-256 digest
//! - `LOCK`: exclusive process lock held while the store is open
//!
//! Reads are served from the in-memory snapshot. Every write goes through a
//! [`Transaction`]: blobs are written first, then the new snapshot replaces
//! `db.json` with a rename, so a failed commit leaves the previous state intact.

mod app_state;
mod migration;
mod transaction;

pub use app_state::{IngestionInfo, Pagination, INGESTION_KEY, PAGINATION_KEY};
pub use migration::{
    split_legacy_state, LegacyImageFile, LegacyResult, LegacyState, Migration, MigrationFn,
    LEGACY_STATE_KEY, MIGRATIONS,
};
pub use transaction::Transaction;

use crate::error::{ClassifierError, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use transaction::Op;

/// Schema version this build reads and writes
pub const SCHEMA_VERSION: u32 = 2;

const SNAPSHOT_FILE: &str = "db.json";
const SNAPSHOT_TMP_FILE: &str = "db.json.tmp";
const BLOB_DIR: &str = "blobs";
const LOCK_FILE: &str = "LOCK";

/// Logical collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    /// fileName -> [`BlobRef`]
    Images,
    /// fileName -> `ItemRecord`
    Stars,
    /// key -> small scalar documents (pagination, ingestion bookkeeping)
    AppState,
    /// Legacy v1 flat state, kept read-only after migration
    State,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Images => "images",
            Collection::Stars => "stars",
            Collection::AppState => "appState",
            Collection::State => "state",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document stored in [`Collection::Images`]; the bytes live in `blobs/<blob>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Hex SHA-256 of the bytes
    pub blob: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    version: u32,
    #[serde(default)]
    collections: BTreeMap<Collection, BTreeMap<String, Value>>,
}

/// Read-only view over the current snapshot.
///
/// Iteration is in key order, which stays stable for the life of a session.
#[derive(Clone, Copy)]
pub struct StoreView<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> StoreView<'a> {
    pub fn version(&self) -> u32 {
        self.snapshot.version
    }

    pub fn get_raw(&self, collection: Collection, key: &str) -> Option<&'a Value> {
        self.snapshot
            .collections
            .get(&collection)
            .and_then(|c| c.get(key))
    }

    pub fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        match self.get_raw(collection, key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let Some(docs) = self.snapshot.collections.get(&collection) else {
            return Ok(Vec::new());
        };
        docs.values()
            .map(|v| serde_json::from_value(v.clone()).map_err(ClassifierError::from))
            .collect()
    }

    pub fn keys(&self, collection: Collection) -> Vec<String> {
        self.snapshot
            .collections
            .get(&collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, collection: Collection, key: &str) -> bool {
        self.get_raw(collection, key).is_some()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.snapshot
            .collections
            .get(&collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

pub struct Store {
    root: PathBuf,
    snapshot: Snapshot,
    _lock: File,
}

impl Store {
    /// Open (or create) a store at the current schema version
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(root, SCHEMA_VERSION, MIGRATIONS).await
    }

    /// Open (or create) a store, upgrading it to `version` with `migrations`
    ///
    /// A new store is stamped with `version` directly. An older store runs
    /// each step whose `from` matches the stored version, committing the
    /// step's writes together with the version bump.
    pub async fn open_with(
        root: impl AsRef<Path>,
        version: u32,
        migrations: &[Migration],
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(BLOB_DIR)).await?;

        let lock = acquire_lock(&root)?;
        let snapshot = load_snapshot(&root).await?;

        let mut store = Self {
            root,
            snapshot,
            _lock: lock,
        };

        let stored = store.snapshot.version;
        if stored > version {
            return Err(ClassifierError::SchemaTooNew {
                found: stored,
                supported: version,
            });
        }

        if stored == 0 {
            debug!(path = %store.root.display(), version, "creating store");
            store.commit_inner(Transaction::new(), Some(version)).await?;
            return Ok(store);
        }

        store.migrate(version, migrations).await?;
        Ok(store)
    }

    async fn migrate(&mut self, version: u32, migrations: &[Migration]) -> Result<()> {
        while self.snapshot.version < version {
            let from = self.snapshot.version;
            let step = migrations
                .iter()
                .find(|m| m.from == from && m.to > from && m.to <= version)
                .ok_or_else(|| ClassifierError::MigrationFailed {
                    from,
                    to: version,
                    reason: "no migration step registered".into(),
                })?;

            info!(from = step.from, to = step.to, name = step.name, "running migration");
            let tx = (step.apply)(&self.view()).map_err(|e| ClassifierError::MigrationFailed {
                from: step.from,
                to: step.to,
                reason: e.to_string(),
            })?;
            let writes = tx.len();
            self.commit_inner(tx, Some(step.to)).await?;
            info!(to = step.to, writes, "migration committed");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn version(&self) -> u32 {
        self.snapshot.version
    }

    pub fn view(&self) -> StoreView<'_> {
        StoreView {
            snapshot: &self.snapshot,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        self.view().get(collection, key)
    }

    pub fn get_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.view().get_all(collection)
    }

    pub fn keys(&self, collection: Collection) -> Vec<String> {
        self.view().keys(collection)
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.view().count(collection)
    }

    /// Create or overwrite one document
    pub async fn put<T: Serialize>(
        &mut self,
        collection: Collection,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let mut tx = Transaction::new();
        tx.put(collection, key, value)?;
        self.commit(tx).await
    }

    /// Store image bytes under `key`
    pub async fn put_image(&mut self, key: impl Into<String>, bytes: Vec<u8>) -> Result<()> {
        let mut tx = Transaction::new();
        tx.put_image(key, bytes);
        self.commit(tx).await
    }

    pub async fn clear(&mut self, collection: Collection) -> Result<()> {
        let mut tx = Transaction::new();
        tx.clear(collection);
        self.commit(tx).await
    }

    /// Read the bytes of one image
    pub async fn get_image(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(blob_ref) = self.get::<BlobRef>(Collection::Images, key)? else {
            return Ok(None);
        };
        let path = self.blob_path(&blob_ref.blob);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ClassifierError::Store(
                format!("blob {} for {} is missing", blob_ref.blob, key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply every write in `tx` or none of them
    pub async fn commit(&mut self, tx: Transaction) -> Result<()> {
        self.commit_inner(tx, None).await
    }

    async fn commit_inner(&mut self, tx: Transaction, version: Option<u32>) -> Result<()> {
        let mut next = self.snapshot.clone();
        let mut images_changed = false;
        let op_count = tx.len();

        for op in tx.into_ops() {
            match op {
                Op::Put {
                    collection,
                    key,
                    value,
                } => {
                    next.collections.entry(collection).or_default().insert(key, value);
                }
                Op::PutImage { key, bytes } => {
                    let blob_ref = self.write_blob(&bytes).await?;
                    let images = next.collections.entry(Collection::Images).or_default();
                    if images.insert(key, serde_json::to_value(&blob_ref)?).is_some() {
                        images_changed = true;
                    }
                }
                Op::Delete { collection, key } => {
                    if let Some(docs) = next.collections.get_mut(&collection) {
                        docs.remove(&key);
                    }
                    images_changed |= collection == Collection::Images;
                }
                Op::Clear(collection) => {
                    next.collections.remove(&collection);
                    images_changed |= collection == Collection::Images;
                }
            }
        }

        if let Some(version) = version {
            next.version = version;
        }

        self.persist(&next).await?;
        self.snapshot = next;
        debug!(ops = op_count, version = self.snapshot.version, "store commit");

        if images_changed {
            self.collect_garbage().await;
        }
        Ok(())
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.root.join(SNAPSHOT_TMP_FILE);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, self.root.join(SNAPSHOT_FILE)).await?;
        Ok(())
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        self.root.join(BLOB_DIR).join(digest)
    }

    async fn write_blob(&self, bytes: &[u8]) -> Result<BlobRef> {
        let digest = hex::encode(Sha256::digest(bytes));
        let path = self.blob_path(&digest);

        if !tokio::fs::try_exists(&path).await? {
            let tmp = path.with_extension("tmp");
            tokio::fs::write(&tmp, bytes).await?;
            tokio::fs::rename(&tmp, &path).await?;
        }

        Ok(BlobRef {
            blob: digest,
            size: bytes.len() as u64,
        })
    }

    /// Remove blob files no image document points at. Failures are only logged.
    async fn collect_garbage(&self) {
        let referenced: HashSet<String> = match self.get_all::<BlobRef>(Collection::Images) {
            Ok(refs) => refs.into_iter().map(|r| r.blob).collect(),
            Err(e) => {
                warn!(error = %e, "skipping blob cleanup: image index unreadable");
                return;
            }
        };

        let mut entries = match tokio::fs::read_dir(self.root.join(BLOB_DIR)).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "skipping blob cleanup");
                return;
            }
        };

        let mut removed = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "blob cleanup interrupted");
                    break;
                }
            };
            let name = entry.file_name().to_string_lossy().to_string();
            if referenced.contains(&name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(blob = %name, error = %e, "failed to remove blob"),
            }
        }

        if removed > 0 {
            debug!(removed, "removed unreferenced blobs");
        }
    }
}

fn acquire_lock(root: &Path) -> Result<File> {
    let path = root.join(LOCK_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| ClassifierError::StoreLocked(root.display().to_string()))?;
    Ok(file)
}

async fn load_snapshot(root: &Path) -> Result<Snapshot> {
    let path = root.join(SNAPSHOT_FILE);
    match tokio::fs::read(&path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            ClassifierError::Store(format!("{} is unreadable: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::default()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use star_classifier_common::{ItemRecord, Label};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_new_store_is_stamped() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        assert_eq!(store.version(), SCHEMA_VERSION);
        assert!(dir.path().join("db.json").exists());
        assert_eq!(store.count(Collection::Stars), 0);
    }

    #[tokio::test]
    async fn test_put_get_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = Store::open(dir.path()).await.unwrap();
            let record = ItemRecord::new("TIC_1_a.png").with_label(Some(Label::No));
            store.put(Collection::Stars, "TIC_1_a.png", &record).await.unwrap();
        }

        let store = Store::open(dir.path()).await.unwrap();
        let record: ItemRecord = store
            .get(Collection::Stars, "TIC_1_a.png")
            .unwrap()
            .expect("record persisted");
        assert_eq!(record.label, Some(Label::No));
        assert!(store.get::<ItemRecord>(Collection::Stars, "missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_all_is_key_ordered() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(dir.path()).await.unwrap();
        for name in ["c.png", "a.png", "b.png"] {
            store.put(Collection::Stars, name, &ItemRecord::new(name)).await.unwrap();
        }

        let names: Vec<String> = store
            .get_all::<ItemRecord>(Collection::Stars)
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        assert_eq!(store.keys(Collection::Stars), names);
    }

    #[tokio::test]
    async fn test_images_roundtrip_and_dedup() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(dir.path()).await.unwrap();
        store.put_image("a.png", b"same".to_vec()).await.unwrap();
        store.put_image("b.png", b"same".to_vec()).await.unwrap();

        assert_eq!(store.get_image("a.png").await.unwrap().unwrap(), b"same");
        assert!(store.get_image("zzz.png").await.unwrap().is_none());

        let blobs = std::fs::read_dir(dir.path().join("blobs")).unwrap().count();
        assert_eq!(blobs, 1);
    }

    #[tokio::test]
    async fn test_clear_images_removes_blobs() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(dir.path()).await.unwrap();
        store.put_image("a.png", b"one".to_vec()).await.unwrap();
        store.put_image("b.png", b"two".to_vec()).await.unwrap();

        store.clear(Collection::Images).await.unwrap();

        assert_eq!(store.count(Collection::Images), 0);
        let blobs = std::fs::read_dir(dir.path().join("blobs")).unwrap().count();
        assert_eq!(blobs, 0);
    }

    #[tokio::test]
    async fn test_transaction_applies_together() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(dir.path()).await.unwrap();

        let mut tx = Transaction::new();
        tx.put_image("a.png", b"bytes".to_vec());
        tx.put(Collection::Stars, "a.png", &ItemRecord::new("a.png")).unwrap();
        tx.put(Collection::AppState, PAGINATION_KEY, &Pagination { rows_per_page: 25 })
            .unwrap();

        // nothing is visible before commit
        assert_eq!(store.count(Collection::Stars), 0);
        store.commit(tx).await.unwrap();

        assert_eq!(store.count(Collection::Stars), 1);
        assert_eq!(store.count(Collection::Images), 1);
        let pagination: Pagination = store
            .get(Collection::AppState, PAGINATION_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(pagination.rows_per_page, 25);
    }

    #[tokio::test]
    async fn test_dropped_transaction_has_no_effect() {
        let dir = tempdir().unwrap();
        let mut store = Store::open(dir.path()).await.unwrap();
        {
            let mut tx = Transaction::new();
            tx.put(Collection::Stars, "a.png", &ItemRecord::new("a.png")).unwrap();
        }
        assert_eq!(store.count(Collection::Stars), 0);
        store.clear(Collection::Stars).await.unwrap();
        assert_eq!(store.count(Collection::Stars), 0);
    }

    async fn store_with_one_record(root: &Path) -> Store {
        let mut store = Store::open(root).await.unwrap();
        let mut tx = Transaction::new();
        tx.put_image("a.png", b"first".to_vec());
        tx.put(Collection::Stars, "a.png", &ItemRecord::new("a.png")).unwrap();
        store.commit(tx).await.unwrap();
        store
    }

    fn second_record_tx() -> Transaction {
        let mut tx = Transaction::new();
        tx.put(Collection::Stars, "b.png", &ItemRecord::new("b.png")).unwrap();
        tx.put_image("b.png", b"second".to_vec());
        tx
    }

    fn assert_only_first_record(store: &Store) {
        assert_eq!(store.keys(Collection::Stars), vec!["a.png"]);
        assert_eq!(store.keys(Collection::Images), vec!["a.png"]);
    }

    #[tokio::test]
    async fn test_failed_blob_write_keeps_snapshot() {
        let dir = tempdir().unwrap();
        let blobs = dir.path().join("blobs");
        {
            let mut store = store_with_one_record(dir.path()).await;

            // a plain file where the blob directory should be
            let kept = std::fs::read(blobs.join(hex::encode(Sha256::digest(b"first")))).unwrap();
            std::fs::remove_dir_all(&blobs).unwrap();
            std::fs::write(&blobs, b"in the way").unwrap();

            let result = store.commit(second_record_tx()).await;
            assert!(result.is_err());
            assert_only_first_record(&store);

            std::fs::remove_file(&blobs).unwrap();
            std::fs::create_dir(&blobs).unwrap();
            std::fs::write(blobs.join(hex::encode(Sha256::digest(b"first"))), kept).unwrap();
        }

        let store = Store::open(dir.path()).await.unwrap();
        assert_only_first_record(&store);
        assert_eq!(store.get_image("a.png").await.unwrap().unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_keeps_snapshot() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join(SNAPSHOT_TMP_FILE);
        {
            let mut store = store_with_one_record(dir.path()).await;

            // the blob lands, then the snapshot temp file cannot be created
            std::fs::create_dir(&tmp).unwrap();
            let result = store.commit(second_record_tx()).await;
            assert!(matches!(result, Err(ClassifierError::Io(_))));
            assert_only_first_record(&store);
            assert!(store.get_image("b.png").await.unwrap().is_none());
        }

        std::fs::remove_dir(&tmp).unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        assert_only_first_record(&store);
        assert_eq!(store.get_image("a.png").await.unwrap().unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_put_into_images_is_rejected() {
        let mut tx = Transaction::new();
        let result = tx.put(Collection::Images, "a.png", &"not a blob ref");
        assert!(matches!(result, Err(ClassifierError::Store(_))));
    }

    #[tokio::test]
    async fn test_second_open_is_locked() {
        let dir = tempdir().unwrap();
        let _store = Store::open(dir.path()).await.unwrap();
        let second = Store::open(dir.path()).await;
        assert!(matches!(second, Err(ClassifierError::StoreLocked(_))));
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let dir = tempdir().unwrap();
        {
            Store::open_with(dir.path(), SCHEMA_VERSION + 1, &[]).await.unwrap();
        }
        let result = Store::open(dir.path()).await;
        assert!(matches!(
            result,
            Err(ClassifierError::SchemaTooNew { found, supported })
                if found == SCHEMA_VERSION + 1 && supported == SCHEMA_VERSION
        ));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("db.json"), "{ not json").unwrap();
        let result = Store::open(dir.path()).await;
        assert!(matches!(result, Err(ClassifierError::Store(_))));
    }
}
