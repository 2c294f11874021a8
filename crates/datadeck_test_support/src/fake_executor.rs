use async_trait::async_trait;
use datadeck_core::{
    CatalogError, ConnectorKind, QueryExecutor, QueryResult, SchemaChangeCallback, Subscription,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeQueryOutcome {
    Success(QueryResult),
    Error(String),
    MissingFile(String),
}

impl FakeQueryOutcome {
    fn to_result(&self) -> Result<QueryResult, CatalogError> {
        match self {
            Self::Success(result) => Ok(result.clone()),
            Self::Error(message) => Err(CatalogError::query_failed(message.clone())),
            Self::MissingFile(path) => Err(CatalogError::FileNotFound(path.clone())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeExecutorStats {
    pub executed_statements: Vec<String>,
    pub schema_listeners: usize,
}

impl FakeExecutorStats {
    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.executed_statements
            .iter()
            .filter(|s| s.starts_with(prefix))
            .count()
    }
}

#[derive(Default)]
struct FakeExecutorState {
    outcomes: RwLock<HashMap<String, FakeQueryOutcome>>,
    prefix_outcomes: RwLock<Vec<(String, FakeQueryOutcome)>>,
    default_outcome: RwLock<Option<FakeQueryOutcome>>,
    executed: Mutex<Vec<String>>,
    not_ready: RwLock<Vec<ConnectorKind>>,
    latency: RwLock<Option<Duration>>,
    listeners: Mutex<Vec<(u64, SchemaChangeCallback)>>,
    next_listener: AtomicU64,
    in_flight: AtomicUsize,
}

/// Scripted query executor. Statements are matched exactly first, then by
/// prefix, then fall back to the default outcome (an empty result).
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<FakeExecutorState>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(self, statement: impl Into<String>, result: QueryResult) -> Self {
        self.set_outcome(statement, FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_error(self, statement: impl Into<String>, message: impl Into<String>) -> Self {
        self.set_outcome(statement, FakeQueryOutcome::Error(message.into()));
        self
    }

    pub fn with_prefix_error(self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        rwlock_write(&self.state.prefix_outcomes)
            .push((prefix.into(), FakeQueryOutcome::Error(message.into())));
        self
    }

    pub fn with_default_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.default_outcome) = Some(FakeQueryOutcome::Error(message.into()));
        self
    }

    /// Every statement sleeps this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        *rwlock_write(&self.state.latency) = Some(latency);
        self
    }

    pub fn with_connector_down(self, kind: ConnectorKind) -> Self {
        rwlock_write(&self.state.not_ready).push(kind);
        self
    }

    pub fn set_outcome(&self, statement: impl Into<String>, outcome: FakeQueryOutcome) {
        rwlock_write(&self.state.outcomes).insert(statement.into(), outcome);
    }

    pub fn set_connector_ready(&self, kind: ConnectorKind, ready: bool) {
        let mut not_ready = rwlock_write(&self.state.not_ready);
        not_ready.retain(|k| *k != kind);
        if !ready {
            not_ready.push(kind);
        }
    }

    /// Invokes every registered schema-change callback.
    pub fn fire_schema_change(&self) {
        let callbacks: Vec<SchemaChangeCallback> = mutex_lock(&self.state.listeners)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    pub fn stats(&self) -> FakeExecutorStats {
        FakeExecutorStats {
            executed_statements: mutex_lock(&self.state.executed).clone(),
            schema_listeners: mutex_lock(&self.state.listeners).len(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    pub fn as_executor_arc(self) -> Arc<dyn QueryExecutor> {
        Arc::new(self)
    }

    fn outcome_for(&self, statement: &str) -> Option<FakeQueryOutcome> {
        if let Some(outcome) = rwlock_read(&self.state.outcomes).get(statement) {
            return Some(outcome.clone());
        }

        if let Some((_, outcome)) = rwlock_read(&self.state.prefix_outcomes)
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
        {
            return Some(outcome.clone());
        }

        rwlock_read(&self.state.default_outcome).clone()
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute_query(&self, statement: &str) -> Result<QueryResult, CatalogError> {
        mutex_lock(&self.state.executed).push(statement.to_string());
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);

        let latency = *rwlock_read(&self.state.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.outcome_for(statement) {
            Some(outcome) => outcome.to_result(),
            None => Ok(QueryResult::empty()),
        }
    }

    fn is_connector_ready(&self, kind: ConnectorKind) -> bool {
        !rwlock_read(&self.state.not_ready).contains(&kind)
    }

    fn on_schema_change(&self, callback: SchemaChangeCallback) -> Subscription {
        let id = self.state.next_listener.fetch_add(1, Ordering::SeqCst);
        mutex_lock(&self.state.listeners).push((id, callback));

        let state = self.state.clone();
        Subscription::new(move || {
            mutex_lock(&state.listeners).retain(|(listener, _)| *listener != id);
        })
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

pub(crate) fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
