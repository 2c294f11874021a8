use datadeck_core::{CatalogError, KeyValueStorage, StorageChange};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::fake_executor::mutex_lock;

#[derive(Default)]
struct HubState {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(u64, String)>>,
    tabs: Mutex<Vec<(u64, broadcast::Sender<StorageChange>)>>,
    next_tab: AtomicU64,
}

/// In-memory storage shared by several simulated tabs. A write made through
/// one tab is delivered to every other tab's subscription.
#[derive(Clone, Default)]
pub struct MemoryStorageHub {
    state: Arc<HubState>,
}

impl MemoryStorageHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self) -> MemoryStorage {
        let id = self.state.next_tab.fetch_add(1, Ordering::SeqCst);
        let (sender, _) = broadcast::channel(64);
        mutex_lock(&self.state.tabs).push((id, sender.clone()));
        MemoryStorage {
            id,
            sender,
            hub: self.clone(),
        }
    }

    pub fn value(&self, key: &str) -> Option<String> {
        mutex_lock(&self.state.values).get(key).cloned()
    }

    /// Seeds a value without notifying anyone.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        mutex_lock(&self.state.values).insert(key.into(), value.into());
    }

    /// Number of writes (set or remove) that reached storage for `key`.
    pub fn write_count(&self, key: &str) -> usize {
        mutex_lock(&self.state.writes)
            .iter()
            .filter(|(_, k)| k == key)
            .count()
    }

    fn publish(&self, origin: u64, change: StorageChange) {
        mutex_lock(&self.state.writes).push((origin, change.key.clone()));
        for (tab, sender) in mutex_lock(&self.state.tabs).iter() {
            if *tab != origin {
                let _ = sender.send(change.clone());
            }
        }
    }
}

/// One tab's view of a [`MemoryStorageHub`].
#[derive(Clone)]
pub struct MemoryStorage {
    id: u64,
    sender: broadcast::Sender<StorageChange>,
    hub: MemoryStorageHub,
}

impl MemoryStorage {
    pub fn as_storage_arc(self) -> Arc<dyn KeyValueStorage> {
        Arc::new(self)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, CatalogError> {
        Ok(self.hub.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        mutex_lock(&self.hub.state.values).insert(key.to_string(), value.to_string());
        self.hub.publish(
            self.id,
            StorageChange {
                key: key.to_string(),
                new_value: Some(value.to_string()),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CatalogError> {
        mutex_lock(&self.hub.state.values).remove(key);
        self.hub.publish(
            self.id,
            StorageChange {
                key: key.to_string(),
                new_value: None,
            },
        );
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }
}
