use async_trait::async_trait;
use datadeck_core::{CatalogError, HandleStore, SourceId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::fake_executor::mutex_lock;

#[derive(Default)]
struct HandleState {
    removed: Mutex<Vec<SourceId>>,
    fail_removal: Mutex<bool>,
    lost: Mutex<HashSet<SourceId>>,
}

/// Records handle releases; removal and verification can be made to fail.
#[derive(Clone, Default)]
pub struct FakeHandleStore {
    state: Arc<HandleState>,
}

impl FakeHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_removal(self) -> Self {
        *mutex_lock(&self.state.fail_removal) = true;
        self
    }

    /// `verify_handle` fails for this source until `recover` is called.
    pub fn lose(&self, id: SourceId) {
        mutex_lock(&self.state.lost).insert(id);
    }

    pub fn recover(&self, id: SourceId) {
        mutex_lock(&self.state.lost).remove(&id);
    }

    pub fn removed(&self) -> Vec<SourceId> {
        mutex_lock(&self.state.removed).clone()
    }

    pub fn as_handle_store_arc(self) -> Arc<dyn HandleStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl HandleStore for FakeHandleStore {
    async fn remove_handle(&self, source_id: SourceId) -> Result<(), CatalogError> {
        mutex_lock(&self.state.removed).push(source_id);
        if *mutex_lock(&self.state.fail_removal) {
            return Err(CatalogError::Storage("handle store unavailable".into()));
        }
        Ok(())
    }

    async fn verify_handle(&self, source_id: SourceId) -> Result<(), CatalogError> {
        if mutex_lock(&self.state.lost).contains(&source_id) {
            return Err(CatalogError::FileNotFound(format!(
                "permission for {} was revoked",
                source_id
            )));
        }
        Ok(())
    }
}
