//! Per-user persistent memory.
//!
//! The host runtime gives each user a small key/value memory. It is modelled
//! as the `MemoryStore` trait with two backends: an in-process map (tests,
//! ephemeral deployments) and one pretty-printed JSON file per user under a
//! state directory. `UserMemory` layers the typed `zigma_*` keys on top.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::types::{TrackedMarket, UsageRecord, ZigmaError, ZigmaResult};

/// Persisted key names.
pub mod keys {
    pub const WALLET: &str = "zigma_wallet";
    pub const USAGE: &str = "zigma_usage";
    pub const TRACKED: &str = "zigma_tracked";
    pub const LAST_STRONG_SIGNAL: &str = "zigma_last_strong_signal";
    pub const LAST_DAILY_POST: &str = "zigma_last_daily_post";
    pub const REPLIED_COMMENTS: &str = "zigma_replied_comments";
}

/// Memory id used for process-scope state (daily post, comment replies).
/// Never listed as a user.
pub const PROCESS_SCOPE: &str = "_zigma";

/// Key/value memory of one user.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get(&self, key: &str) -> ZigmaResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> ZigmaResult<()>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn get(&self, key: &str) -> ZigmaResult<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| ZigmaError::Storage("memory store lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> ZigmaResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ZigmaError::Storage("memory store lock poisoned".into()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// One JSON object per user, rewritten whole on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> ZigmaResult<Map<String, Value>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(ZigmaError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&json).map_err(|e| {
            ZigmaError::Storage(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }
}

#[async_trait]
impl MemoryStore for JsonFileStore {
    async fn get(&self, key: &str) -> ZigmaResult<Option<Value>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> ZigmaResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), value);

        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| ZigmaError::Storage(format!("Failed to serialise memory: {e}")))?;
        // Replaced via rename; readers never see a partial file
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            ZigmaError::Storage(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ZigmaError::Storage(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), key, "Memory saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Typed accessors over a user's raw memory.
#[derive(Clone)]
pub struct UserMemory {
    store: Arc<dyn MemoryStore>,
}

impl UserMemory {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Fresh in-process memory, for tests and one-off contexts.
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn raw(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// A stored value of the wrong shape is logged and treated as absent.
    async fn read<T: DeserializeOwned>(&self, key: &str) -> ZigmaResult<Option<T>> {
        let Some(value) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring malformed memory value");
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> ZigmaResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ZigmaError::Storage(format!("Failed to serialise {key}: {e}")))?;
        self.store.set(key, value).await
    }

    pub async fn wallet(&self) -> ZigmaResult<Option<String>> {
        self.read(keys::WALLET).await
    }

    pub async fn set_wallet(&self, address: &str) -> ZigmaResult<()> {
        self.write(keys::WALLET, &address).await
    }

    /// Per-day usage keyed by `YYYY-MM-DD`.
    pub async fn usage_map(&self) -> ZigmaResult<BTreeMap<String, UsageRecord>> {
        Ok(self.read(keys::USAGE).await?.unwrap_or_default())
    }

    pub async fn set_usage_map(&self, usage: &BTreeMap<String, UsageRecord>) -> ZigmaResult<()> {
        self.write(keys::USAGE, usage).await
    }

    pub async fn tracked(&self) -> ZigmaResult<Vec<TrackedMarket>> {
        Ok(self.read(keys::TRACKED).await?.unwrap_or_default())
    }

    pub async fn set_tracked(&self, tracked: &[TrackedMarket]) -> ZigmaResult<()> {
        self.write(keys::TRACKED, &tracked).await
    }

    pub async fn last_strong_signal(&self) -> ZigmaResult<Option<String>> {
        self.read(keys::LAST_STRONG_SIGNAL).await
    }

    pub async fn set_last_strong_signal(&self, market_id: &str) -> ZigmaResult<()> {
        self.write(keys::LAST_STRONG_SIGNAL, &market_id).await
    }

    pub async fn last_daily_post(&self) -> ZigmaResult<Option<String>> {
        self.read(keys::LAST_DAILY_POST).await
    }

    pub async fn set_last_daily_post(&self, day: &str) -> ZigmaResult<()> {
        self.write(keys::LAST_DAILY_POST, &day).await
    }

    pub async fn replied_comments(&self) -> ZigmaResult<Vec<String>> {
        Ok(self.read(keys::REPLIED_COMMENTS).await?.unwrap_or_default())
    }

    pub async fn set_replied_comments(&self, ids: &[String]) -> ZigmaResult<()> {
        self.write(keys::REPLIED_COMMENTS, &ids).await
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

enum Backend {
    Memory,
    Directory(PathBuf),
}

/// Per-id stores. An id gets an entry on its first write only.
struct Stores {
    backend: Backend,
    map: Mutex<HashMap<String, Arc<dyn MemoryStore>>>,
}

impl Stores {
    fn map(&self) -> ZigmaResult<std::sync::MutexGuard<'_, HashMap<String, Arc<dyn MemoryStore>>>> {
        self.map
            .lock()
            .map_err(|_| ZigmaError::Storage("store registry lock poisoned".into()))
    }

    fn open(&self, id: &str) -> Arc<dyn MemoryStore> {
        match &self.backend {
            Backend::Memory => Arc::new(InMemoryStore::new()) as Arc<dyn MemoryStore>,
            Backend::Directory(dir) => Arc::new(JsonFileStore::new(dir.join(file_name(id)))),
        }
    }

    fn registered(&self, id: &str) -> ZigmaResult<Option<Arc<dyn MemoryStore>>> {
        Ok(self.map()?.get(id).cloned())
    }

    fn register(&self, id: &str) -> ZigmaResult<Arc<dyn MemoryStore>> {
        let mut map = self.map()?;
        let store = map.entry(id.to_string()).or_insert_with(|| self.open(id));
        Ok(store.clone())
    }
}

/// Handle on one id's memory that joins the registry on its first write.
struct RegistryStore {
    id: String,
    stores: Arc<Stores>,
}

#[async_trait]
impl MemoryStore for RegistryStore {
    async fn get(&self, key: &str) -> ZigmaResult<Option<Value>> {
        match self.stores.registered(&self.id)? {
            Some(store) => store.get(key).await,
            None => match &self.stores.backend {
                Backend::Memory => Ok(None),
                // State written by an earlier process
                Backend::Directory(_) => self.stores.open(&self.id).get(key).await,
            },
        }
    }

    async fn set(&self, key: &str, value: Value) -> ZigmaResult<()> {
        self.stores.register(&self.id)?.set(key, value).await
    }
}

/// Hands out one store per user id and serialises work on the same user.
///
/// A user is known once something has been written for them; ids that only
/// ever read leave nothing behind.
pub struct StoreRegistry {
    stores: Arc<Stores>,
    user_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StoreRegistry {
    pub fn in_memory() -> Self {
        Self::with_backend(Backend::Memory)
    }

    /// File-backed registry; the directory is created if missing.
    pub fn json_dir(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        info!(dir = %dir.display(), "Using JSON file memory");
        Ok(Self::with_backend(Backend::Directory(dir)))
    }

    pub fn from_config(cfg: &StorageConfig) -> anyhow::Result<Self> {
        match cfg.dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => Self::json_dir(dir),
            _ => {
                info!("No storage directory configured, memory is in-process only");
                Ok(Self::in_memory())
            }
        }
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            stores: Arc::new(Stores {
                backend,
                map: Mutex::new(HashMap::new()),
            }),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn store_for(&self, id: &str) -> UserMemory {
        UserMemory::new(Arc::new(RegistryStore {
            id: id.to_string(),
            stores: self.stores.clone(),
        }))
    }

    /// Memory of `user_id`. The user becomes known on the first write.
    pub fn user(&self, user_id: &str) -> ZigmaResult<UserMemory> {
        if user_id.trim().is_empty() || user_id == PROCESS_SCOPE {
            return Err(ZigmaError::invalid("Missing user id"));
        }
        Ok(self.store_for(user_id))
    }

    /// Memory shared by the whole process.
    pub fn process(&self) -> ZigmaResult<UserMemory> {
        Ok(self.store_for(PROCESS_SCOPE))
    }

    /// Every known user id, sorted.
    pub async fn users(&self) -> ZigmaResult<Vec<String>> {
        let mut ids: Vec<String> = self.stores.map()?.keys().cloned().collect();

        if let Backend::Directory(dir) = &self.stores.backend {
            let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
                ZigmaError::Storage(format!("Failed to list {}: {e}", dir.display()))
            })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| ZigmaError::Storage(e.to_string()))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if let Some(id) = user_id_from_file(&name) {
                    ids.push(id);
                }
            }
        }

        ids.retain(|id| id != PROCESS_SCOPE);
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Exclusive access to one user's state for the duration of a command
    /// or a heartbeat pass.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop lock entries nobody holds or waits on. Returns how many remain.
    pub fn prune_idle_locks(&self) -> usize {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }
}

fn file_name(user_id: &str) -> String {
    format!("{}.json", urlencoding::encode(user_id))
}

fn user_id_from_file(name: &str) -> Option<String> {
    let stem = name.strip_suffix(".json")?;
    urlencoding::decode(stem).ok().map(|s| s.into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
