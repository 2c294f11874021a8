use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{CatalogError, QueryResult, SourceId};

/// Engine a statement is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorKind {
    /// The embedded engine that reads files and attached databases.
    LocalEngine,
    CloudWarehouse,
}

impl ConnectorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocalEngine => "local engine",
            Self::CloudWarehouse => "cloud warehouse",
        }
    }
}

pub type SchemaChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by callback registrations; dropping it unsubscribes.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn detached() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Query execution collaborator. The catalog never talks to an engine
/// directly; statements are built with the helpers in `sanitize`.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_query(&self, statement: &str) -> Result<QueryResult, CatalogError>;

    fn is_connector_ready(&self, kind: ConnectorKind) -> bool;

    /// Registers a callback fired whenever the engine's schema changes.
    fn on_schema_change(&self, callback: SchemaChangeCallback) -> Subscription;
}

/// Holds persisted local file handles.
#[async_trait]
pub trait HandleStore: Send + Sync {
    async fn remove_handle(&self, source_id: SourceId) -> Result<(), CatalogError>;

    /// Re-acquires the handle after a reload. Errors mean the user has to
    /// restore the file manually.
    async fn verify_handle(&self, _source_id: SourceId) -> Result<(), CatalogError> {
        Ok(())
    }
}

/// A write performed by another tab/process on a shared key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<String>,
}

/// Durable key/value storage collaborator.
///
/// Reads and writes are synchronous so the catalog can flush on teardown.
/// `subscribe` delivers changes made by *other* writers only.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CatalogError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CatalogError>;

    fn remove(&self, key: &str) -> Result<(), CatalogError>;

    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscription_runs_unsubscribe_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let counter = calls.clone();
        {
            let _sub = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
