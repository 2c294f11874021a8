use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::{CatalogError, DataSourceEntity, KeyValueStorage};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCatalog {
    version: u32,
    sources: Vec<DataSourceEntity>,
}

/// Encodes the catalog for durable storage. Volatile sources are left out.
pub fn serialize_catalog(entities: &[DataSourceEntity]) -> Result<String, CatalogError> {
    let snapshot = PersistedCatalog {
        version: SNAPSHOT_VERSION,
        sources: entities.iter().filter(|e| !e.volatile).cloned().collect(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Decodes a persisted catalog.
///
/// Never fails: a corrupt or foreign snapshot is logged and treated as an
/// empty catalog. Transient runtime flags are reset, volatile sources are
/// dropped and sources sharing a location keep only the most recent one.
pub fn deserialize_catalog(raw: &str) -> Vec<DataSourceEntity> {
    let snapshot = match serde_json::from_str::<PersistedCatalog>(raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("Failed to parse persisted catalog ({}), starting empty", e);
            return Vec::new();
        }
    };

    if snapshot.version != SNAPSHOT_VERSION {
        log::warn!(
            "Persisted catalog has version {} (expected {}), starting empty",
            snapshot.version,
            SNAPSHOT_VERSION
        );
        return Vec::new();
    }

    let mut sources: Vec<DataSourceEntity> = Vec::with_capacity(snapshot.sources.len());
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for mut entity in snapshot.sources {
        if entity.volatile {
            continue;
        }
        entity.reset_transient_state();

        let key = entity.location_key();
        match by_key.get(&key) {
            Some(&idx) => {
                if entity.added_at > sources[idx].added_at {
                    sources[idx] = entity;
                }
            }
            None => {
                by_key.insert(key, sources.len());
                sources.push(entity);
            }
        }
    }

    sources
}

/// Loads and decodes `key`; storage failures are treated like a missing key.
pub fn load_catalog(storage: &dyn KeyValueStorage, key: &str) -> Vec<DataSourceEntity> {
    match storage.get(key) {
        Ok(Some(raw)) => deserialize_catalog(&raw),
        Ok(None) => Vec::new(),
        Err(e) => {
            log::warn!("Failed to read persisted catalog: {}", e);
            Vec::new()
        }
    }
}

#[derive(Default)]
struct WriterState {
    pending: Option<String>,
    timer: Option<JoinHandle<()>>,
}

/// Coalesces bursts of writes into one storage write after a quiet period.
///
/// Holds at most one pending payload and one timer. `flush` writes the
/// pending payload synchronously; dropping the writer flushes too.
pub struct DeferredWriter {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    delay: Duration,
    state: Arc<Mutex<WriterState>>,
}

impl DeferredWriter {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>, delay: Duration) -> Self {
        Self {
            storage,
            key: key.into(),
            delay,
            state: Arc::new(Mutex::new(WriterState::default())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replaces the pending payload and restarts the quiet-period timer.
    ///
    /// Outside a tokio runtime the payload is written immediately.
    pub fn schedule(&self, payload: String) {
        let mut state = lock(&self.state);
        state.pending = Some(payload);

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            Self::write_pending(&mut state, self.storage.as_ref(), &self.key);
            return;
        };

        let shared = self.state.clone();
        let storage = self.storage.clone();
        let key = self.key.clone();
        let delay = self.delay;

        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = lock(&shared);
            state.timer = None;
            Self::write_pending(&mut state, storage.as_ref(), &key);
        }));
    }

    /// Cancels the timer and writes whatever is pending, synchronously.
    pub fn flush(&self) {
        let mut state = lock(&self.state);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        Self::write_pending(&mut state, self.storage.as_ref(), &self.key);
    }

    /// Drops the pending payload without writing it.
    pub fn cancel(&self) {
        let mut state = lock(&self.state);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.state).pending.is_some()
    }

    // Written under the state lock so a late timer can never overwrite a
    // newer flush.
    fn write_pending(state: &mut WriterState, storage: &dyn KeyValueStorage, key: &str) {
        if let Some(payload) = state.pending.take()
            && let Err(e) = storage.set(key, &payload)
        {
            log::error!("Failed to persist catalog under {}: {}", key, e);
        }
    }
}

impl Drop for DeferredWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

pub(crate) fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
