//! File-backed trust store
//!
//! One JSON file holds all records, either as a bare array or as
//! `{ "<entityName>": [...] }` (selected at construction). The file is
//! shared state across processes; safety comes from three mechanisms
//! working together:
//!
//! 1. an advisory `fs2` lock on `<file>.lock`, acquired with bounded
//!    retry and a stale-lock takeover, so writers never interleave;
//! 2. write-to-temp plus atomic rename, so readers never observe a
//!    half-written file;
//! 3. an mtime check before every read, so a handle notices flushes made
//!    by other processes and reloads.
//!
//! Mutations mark the store dirty and are coalesced by a debounced
//! background flush. While holding the write lock, records present on
//! disk but unknown to this handle are merged in (unless locally
//! deleted), so concurrent writers converge instead of clobbering.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use fs2::FileExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{TrustStoreError, TrustStoreResult};
use crate::record::{deterministic_trust_id, TrustPatch, TrustRecord, TrustRecordDraft};
use crate::store::TrustStore;

/// How long mutations are coalesced before the background flush.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

const LOCK_ATTEMPTS: u32 = 5;
const LOCK_BASE_DELAY: Duration = Duration::from_millis(100);
const LOCK_DELAY_FACTOR: f64 = 1.5;
const LOCK_MAX_DELAY: Duration = Duration::from_secs(1);
const LOCK_STALE_AFTER: Duration = Duration::from_secs(5);

/// Construction options for [`FileTrustStore`].
#[derive(Debug, Clone)]
pub struct FileTrustStoreOptions {
    /// When set, the on-disk container is `{ "<entityName>": [...] }`;
    /// when `None`, a bare array.
    pub entity_name: Option<String>,
    /// Debounce window for coalescing flushes.
    pub debounce: Duration,
}

impl Default for FileTrustStoreOptions {
    fn default() -> Self {
        Self {
            entity_name: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// The file-backed [`TrustStore`] implementation.
#[derive(Clone)]
pub struct FileTrustStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    lock_path: PathBuf,
    entity_name: Option<String>,
    records: DashMap<String, TrustRecord>,
    /// Ids deleted locally but not yet flushed; the write-time merge
    /// must not resurrect them from disk.
    pending_deletes: DashMap<String, ()>,
    dirty: AtomicBool,
    last_mtime: std::sync::Mutex<Option<SystemTime>>,
    flush_timer: Mutex<Option<JoinHandle<()>>>,
    debounce: Duration,
}

impl FileTrustStore {
    /// Open (or lazily create) a store at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        options: FileTrustStoreOptions,
    ) -> TrustStoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = sibling_with_suffix(&path, ".lock");

        let inner = Arc::new(Inner {
            path,
            lock_path,
            entity_name: options.entity_name,
            records: DashMap::new(),
            pending_deletes: DashMap::new(),
            dirty: AtomicBool::new(false),
            last_mtime: std::sync::Mutex::new(None),
            flush_timer: Mutex::new(None),
            debounce: options.debounce,
        });

        let init = Arc::clone(&inner);
        run_blocking(move || init.initialize_blocking()).await?;

        Ok(Self { inner })
    }

    /// Flush pending writes and stop the debounce timer. Further use of
    /// the handle is still valid; this exists so applications can wire
    /// it to their own shutdown signal handling.
    pub async fn close(&self) -> TrustStoreResult<()> {
        self.flush_now().await
    }

    /// Set the dirty flag and make sure exactly one debounced flush is
    /// scheduled. Marks inside an open window do not re-schedule.
    async fn mark_dirty(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);

        let mut timer = self.inner.flush_timer.lock().await;
        if let Some(handle) = timer.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        let inner = Arc::clone(&self.inner);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            if !inner.dirty.load(Ordering::SeqCst) {
                return;
            }
            let flusher = Arc::clone(&inner);
            match tokio::task::spawn_blocking(move || flusher.flush_blocking()).await {
                Ok(Ok(())) => debug!("Debounced trust store flush complete"),
                Ok(Err(e)) => warn!(error = %e, "Debounced trust store flush failed"),
                Err(e) => warn!(error = %e, "Trust store flush task panicked"),
            }
        }));
    }

    /// Stat the file and reload if another process has flushed since we
    /// last looked. Runs before every read-only operation.
    async fn check_external_change(&self) -> TrustStoreResult<()> {
        let inner = Arc::clone(&self.inner);
        run_blocking(move || {
            let disk_mtime = inner.disk_mtime();
            let last = *inner.last_mtime.lock().expect("mtime lock poisoned");
            if disk_mtime == last {
                return Ok(());
            }
            debug!(path = ?inner.path, "Trust store changed on disk, reloading");
            if inner.dirty.load(Ordering::SeqCst) {
                inner.flush_blocking()?;
            }
            inner.reload_blocking()
        })
        .await
    }
}

#[async_trait]
impl TrustStore for FileTrustStore {
    async fn get_by_id(&self, id: &str) -> TrustStoreResult<Option<TrustRecord>> {
        self.check_external_change().await?;
        Ok(self.inner.records.get(id).map(|r| r.value().clone()))
    }

    async fn create(
        &self,
        draft: TrustRecordDraft,
        id: Option<String>,
    ) -> TrustStoreResult<TrustRecord> {
        let id =
            id.unwrap_or_else(|| deterministic_trust_id(&draft.sender_id, &draft.receiver_id));

        let record = match self.inner.records.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(TrustStoreError::Conflict(id));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let record = draft.into_record(id.clone());
                slot.insert(record.clone());
                record
            }
        };

        self.inner.pending_deletes.remove(&id);
        self.mark_dirty().await;
        Ok(record)
    }

    async fn update(&self, id: &str, patch: TrustPatch) -> TrustStoreResult<TrustRecord> {
        let updated = {
            let mut entry = self
                .inner
                .records
                .get_mut(id)
                .ok_or_else(|| TrustStoreError::NotFound(id.to_string()))?;
            patch.apply(entry.value_mut());
            entry.value().clone()
        };
        self.mark_dirty().await;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> TrustStoreResult<()> {
        if self.inner.records.remove(id).is_none() {
            return Err(TrustStoreError::NotFound(id.to_string()));
        }
        self.inner.pending_deletes.insert(id.to_string(), ());
        self.mark_dirty().await;
        Ok(())
    }

    async fn get_all(&self, receiver_id: Option<&str>) -> TrustStoreResult<Vec<TrustRecord>> {
        self.check_external_change().await?;
        let mut records: Vec<TrustRecord> = self
            .inner
            .records
            .iter()
            .filter(|r| receiver_id.map_or(true, |rx| r.value().receiver_id == rx))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn flush_now(&self) -> TrustStoreResult<()> {
        {
            let mut timer = self.inner.flush_timer.lock().await;
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
        if !self.inner.dirty.load(Ordering::SeqCst) {
            return Ok(());
        }
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.flush_blocking()).await
    }

    async fn flush_and_reload(&self) -> TrustStoreResult<()> {
        self.flush_now().await?;
        let inner = Arc::clone(&self.inner);
        run_blocking(move || inner.reload_blocking()).await
    }
}

impl Inner {
    fn initialize_blocking(&self) -> TrustStoreResult<()> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            info!(path = ?self.path, "Creating empty trust store file");
            self.write_locked_snapshot()?;
        }
        self.reload_blocking()
    }

    fn disk_mtime(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok().and_then(|m| m.modified().ok())
    }

    /// Parse the on-disk container into records. Accepts both container
    /// shapes regardless of configuration, so handles with different
    /// settings can still read each other's files.
    fn read_disk_records(&self) -> TrustStoreResult<Vec<TrustRecord>> {
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| TrustStoreError::Corrupt(e.to_string()))?;

        let array = match &value {
            Value::Array(_) => value.clone(),
            Value::Object(map) => {
                let entity = match &self.entity_name {
                    Some(name) => map.get(name),
                    // Tolerate a named container when we expected a bare
                    // array, as long as it is unambiguous.
                    None if map.len() == 1 => map.values().next(),
                    None => None,
                };
                entity
                    .filter(|v| v.is_array())
                    .cloned()
                    .ok_or_else(|| {
                        TrustStoreError::Corrupt(
                            "expected an array or a single-entity object".to_string(),
                        )
                    })?
            }
            _ => {
                return Err(TrustStoreError::Corrupt(
                    "top level must be an array or object".to_string(),
                ));
            }
        };

        serde_json::from_value(array).map_err(|e| TrustStoreError::Corrupt(e.to_string()))
    }

    fn reload_blocking(&self) -> TrustStoreResult<()> {
        let disk = self.read_disk_records()?;
        self.records.clear();
        for record in disk {
            self.records.insert(record.id.clone(), record);
        }
        self.pending_deletes.clear();
        *self.last_mtime.lock().expect("mtime lock poisoned") = self.disk_mtime();
        self.dirty.store(false, Ordering::SeqCst);
        debug!(count = self.records.len(), "Trust store loaded");
        Ok(())
    }

    /// Flush, re-setting the dirty flag on failure so the next flush
    /// retries.
    fn flush_blocking(&self) -> TrustStoreResult<()> {
        match self.write_locked_snapshot() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// The persistence protocol: lock, merge external changes, write
    /// temp, rename, record mtime, unlock.
    fn write_locked_snapshot(&self) -> TrustStoreResult<()> {
        let lock = self.acquire_lock_blocking()?;

        // Another process may have flushed since we last loaded. Merge
        // its records in under the lock so nothing is lost.
        let disk_mtime = self.disk_mtime();
        let last = *self.last_mtime.lock().expect("mtime lock poisoned");
        if disk_mtime.is_some() && disk_mtime != last {
            if let Ok(disk_records) = self.read_disk_records() {
                for record in disk_records {
                    if !self.records.contains_key(&record.id)
                        && !self.pending_deletes.contains_key(&record.id)
                    {
                        self.records.insert(record.id.clone(), record);
                    }
                }
            }
        }

        let mut records: Vec<TrustRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        let json = match &self.entity_name {
            Some(name) => {
                let mut container = serde_json::Map::new();
                container.insert(
                    name.clone(),
                    serde_json::to_value(&records).map_err(|e| TrustStoreError::Io(e.to_string()))?,
                );
                serde_json::to_vec_pretty(&Value::Object(container))
            }
            None => serde_json::to_vec_pretty(&records),
        }
        .map_err(|e| TrustStoreError::Io(e.to_string()))?;

        let tmp = sibling_with_suffix(&self.path, ".tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;

        *self.last_mtime.lock().expect("mtime lock poisoned") = self.disk_mtime();
        self.pending_deletes.clear();
        self.dirty.store(false, Ordering::SeqCst);

        let _ = FileExt::unlock(&lock);
        debug!(path = ?self.path, count = records.len(), "Trust store flushed");
        Ok(())
    }

    /// Acquire the advisory lock with bounded exponential retry and a
    /// stale-lock takeover after [`LOCK_STALE_AFTER`].
    fn acquire_lock_blocking(&self) -> TrustStoreResult<File> {
        let mut delay = LOCK_BASE_DELAY;

        for attempt in 1..=LOCK_ATTEMPTS {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&self.lock_path)?;

            if FileExt::try_lock_exclusive(&file).is_ok() {
                // Refresh the lock file's mtime so other processes can
                // judge staleness.
                let mut file = file;
                let _ = file.set_len(0);
                let _ = write!(file, "{}", std::process::id());
                return Ok(file);
            }

            let age = fs::metadata(&self.lock_path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|m| SystemTime::now().duration_since(m).ok());
            if let Some(age) = age {
                if age > LOCK_STALE_AFTER {
                    warn!(path = ?self.lock_path, age_secs = age.as_secs(), "Taking over stale trust store lock");
                    let _ = fs::remove_file(&self.lock_path);
                    continue;
                }
            }

            if attempt < LOCK_ATTEMPTS {
                std::thread::sleep(delay);
                let scaled = delay.mul_f64(LOCK_DELAY_FACTOR);
                delay = scaled.min(LOCK_MAX_DELAY);
            }
        }

        Err(TrustStoreError::LockContended {
            path: self.lock_path.display().to_string(),
            attempts: LOCK_ATTEMPTS,
        })
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Best-effort synchronous flush of anything still pending. The
        // application's shutdown path should prefer `close()`.
        if self.dirty.load(Ordering::SeqCst) {
            if let Err(e) = self.flush_blocking() {
                warn!(error = %e, "Trust store flush on drop failed");
            }
        }
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

async fn run_blocking<T, F>(f: F) -> TrustStoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> TrustStoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TrustStoreError::Io(format!("blocking task: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TrustStatus;
    use tempfile::TempDir;

    fn fast_options() -> FileTrustStoreOptions {
        FileTrustStoreOptions {
            entity_name: None,
            debounce: Duration::from_millis(20),
        }
    }

    async fn open_store(dir: &TempDir) -> FileTrustStore {
        FileTrustStore::open(dir.path().join("trust.json"), fast_options())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lazy_initialization_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        assert!(!path.exists());

        let store = FileTrustStore::open(&path, fast_options()).await.unwrap();
        assert!(path.exists());
        assert!(store.get_all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let created = store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            created.id,
            deterministic_trust_id("alice$a.example", "bob$b.example")
        );

        let fetched = store.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TrustStatus::Requested);

        let updated = store
            .update(&created.id, TrustPatch::decision(TrustStatus::Accepted))
            .await
            .unwrap();
        assert_eq!(updated.status, TrustStatus::Accepted);
        assert!(updated.decided_at.is_some());

        store.delete(&created.id).await.unwrap();
        assert!(store.get_by_id(&created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let draft = TrustRecordDraft::requested("alice$a.example", "bob$b.example");
        store.create(draft.clone(), None).await.unwrap();

        assert!(matches!(
            store.create(draft, None).await,
            Err(TrustStoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        assert!(matches!(
            store.update("nope", TrustPatch::default()).await,
            Err(TrustStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nope").await,
            Err(TrustStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_receiver_filter() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        for sender in ["a$x.example", "b$x.example", "c$x.example"] {
            store
                .create(TrustRecordDraft::requested(sender, "bob$b.example"), None)
                .await
                .unwrap();
        }
        store
            .create(
                TrustRecordDraft::requested("a$x.example", "carol$c.example"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.get_all(None).await.unwrap().len(), 4);
        assert_eq!(
            store.get_all(Some("bob$b.example")).await.unwrap().len(),
            3
        );
        assert_eq!(store.get_all(Some("nobody$n.example")).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");

        {
            let store = FileTrustStore::open(&path, fast_options()).await.unwrap();
            for i in 0..5 {
                store
                    .create(
                        TrustRecordDraft::requested(
                            format!("sender{}$x.example", i),
                            "bob$b.example",
                        ),
                        None,
                    )
                    .await
                    .unwrap();
            }
            store.flush_now().await.unwrap();
        }

        let store = FileTrustStore::open(&path, fast_options()).await.unwrap();
        assert_eq!(store.get_all(None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_debounced_flush_writes_eventually() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        let store = FileTrustStore::open(&path, fast_options()).await.unwrap();

        store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();

        // Inside the debounce window the file still holds the empty
        // snapshot from initialization.
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("alice$a.example"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("alice$a.example"));
    }

    #[tokio::test]
    async fn test_external_change_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");

        let writer = FileTrustStore::open(&path, fast_options()).await.unwrap();
        let reader = FileTrustStore::open(&path, fast_options()).await.unwrap();

        writer
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();
        writer.flush_now().await.unwrap();

        // The reader handle never wrote; the mtime check must pick up
        // the other handle's flush.
        let all = reader.get_all(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].sender_id, "alice$a.example");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_handles_converge_without_loss() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");

        let a = FileTrustStore::open(&path, fast_options()).await.unwrap();
        let b = FileTrustStore::open(&path, fast_options()).await.unwrap();

        // Race the two handles' creates and flushes against each other.
        let task_a = {
            let a = a.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    a.create(
                        TrustRecordDraft::requested(format!("a{}$x.example", i), "bob$b.example"),
                        None,
                    )
                    .await
                    .unwrap();
                    if i % 10 == 9 {
                        a.flush_now().await.unwrap();
                    }
                }
            })
        };
        let task_b = {
            let b = b.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    b.create(
                        TrustRecordDraft::requested(format!("b{}$y.example", i), "bob$b.example"),
                        None,
                    )
                    .await
                    .unwrap();
                    if i % 10 == 9 {
                        b.flush_now().await.unwrap();
                    }
                }
            })
        };
        task_a.await.unwrap();
        task_b.await.unwrap();

        a.flush_and_reload().await.unwrap();
        b.flush_and_reload().await.unwrap();
        a.flush_and_reload().await.unwrap();

        assert_eq!(a.get_all(None).await.unwrap().len(), 100);
        assert_eq!(b.get_all(None).await.unwrap().len(), 100);

        // The file itself must be valid JSON holding all records.
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<TrustRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 100);
    }

    #[tokio::test]
    async fn test_flush_retries_until_competing_lock_released() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        let store = FileTrustStore::open(&path, fast_options()).await.unwrap();

        store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();

        // Hold the advisory lock from outside for a few backoff steps;
        // the flush must wait it out through the retry loop and then
        // succeed.
        let lock_path = dir.path().join("trust.json.lock");
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .unwrap();
        fs2::FileExt::lock_exclusive(&lock_file).unwrap();
        let holder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            let _ = fs2::FileExt::unlock(&lock_file);
        });

        store.flush_now().await.unwrap();
        holder.join().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("alice$a.example"));
    }

    #[tokio::test]
    async fn test_entity_name_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        let options = FileTrustStoreOptions {
            entity_name: Some("trustedSenders".to_string()),
            debounce: Duration::from_millis(20),
        };

        let store = FileTrustStore::open(&path, options.clone()).await.unwrap();
        store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();
        store.flush_now().await.unwrap();

        let value: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["trustedSenders"].is_array());

        // A second instance with the same configuration reads it back.
        let reopened = FileTrustStore::open(&path, options).await.unwrap();
        assert_eq!(reopened.get_all(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_terminal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(&path, "{this is not json").unwrap();

        match FileTrustStore::open(&path, fast_options()).await {
            Err(TrustStoreError::Corrupt(_)) => {}
            other => panic!("Expected corrupt-file error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_explicit_id_respected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let record = store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                Some("custom-id".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(record.id, "custom-id");
        assert!(store.get_by_id("custom-id").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_survives_merge() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trust.json");
        let store = FileTrustStore::open(&path, fast_options()).await.unwrap();

        let record = store
            .create(
                TrustRecordDraft::requested("alice$a.example", "bob$b.example"),
                None,
            )
            .await
            .unwrap();
        store.flush_now().await.unwrap();

        // Delete after the record reached disk; the flush-time merge
        // must not resurrect it.
        store.delete(&record.id).await.unwrap();
        store.flush_and_reload().await.unwrap();
        assert!(store.get_by_id(&record.id).await.unwrap().is_none());
    }
}
