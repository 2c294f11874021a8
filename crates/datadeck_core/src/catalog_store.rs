use std::collections::{HashMap, HashSet};
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::introspection::{
    FlatFileIntrospection, SheetIntrospection, introspect_database, introspect_flat_file,
    introspect_sheet,
};
use crate::persistence::{DeferredWriter, deserialize_catalog, load_catalog, lock, serialize_catalog};
use crate::sanitize::detach_statement;
use crate::{
    CatalogConfig, CatalogError, ColumnInfo, ConnectorKind, DataSourceEntity, HandleStore,
    KeyValueStorage, QueryExecutor, SchemaChangeCallback, SchemaInfo, SourceDraft, SourceId,
    SourceKind, SourceLocation, Subscription, derive_alias,
};

pub type CatalogSnapshot = Arc<Vec<DataSourceEntity>>;

type AddResult = Result<DataSourceEntity, CatalogError>;

/// An in-flight `add`. Cloning and awaiting it from several places joins the
/// same underlying work; the entity is already visible in the catalog.
#[derive(Clone)]
pub struct PendingAdd {
    id: SourceId,
    result: Shared<BoxFuture<'static, AddResult>>,
}

impl PendingAdd {
    fn ready(id: SourceId, result: AddResult) -> Self {
        Self {
            id,
            result: futures::future::ready(result).boxed().shared(),
        }
    }

    /// Id of the entity this add created, or of the add that was joined.
    pub fn id(&self) -> SourceId {
        self.id
    }
}

impl IntoFuture for PendingAdd {
    type Output = AddResult;
    type IntoFuture = Shared<BoxFuture<'static, AddResult>>;

    fn into_future(self) -> Self::IntoFuture {
        self.result
    }
}

impl std::fmt::Debug for PendingAdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAdd").field("id", &self.id).finish()
    }
}

enum IntrospectionOutcome {
    Database {
        alias: String,
        schemas: Vec<SchemaInfo>,
    },
    FlatFile(FlatFileIntrospection),
    Sheet(SheetIntrospection),
    Unchanged,
}

struct StoreInner {
    config: CatalogConfig,
    executor: Arc<dyn QueryExecutor>,
    handles: Arc<dyn HandleStore>,
    storage: Arc<dyn KeyValueStorage>,

    snapshot: watch::Sender<CatalogSnapshot>,
    pending_adds: Mutex<HashMap<String, PendingAdd>>,
    introspecting: Mutex<HashSet<SourceId>>,

    tasks: Mutex<Vec<JoinHandle<()>>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
    schema_subscription: Mutex<Option<Subscription>>,
    writer: DeferredWriter,
}

/// Removes the id from the in-progress set even if the introspection future
/// is dropped half-way.
struct IntrospectionGuard<'a> {
    inner: &'a StoreInner,
    id: SourceId,
}

impl Drop for IntrospectionGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.introspecting).remove(&self.id);
    }
}

/// The single source of truth for registered data sources.
///
/// Every mutation replaces the entity list wholesale and publishes it on a
/// `watch` channel, then schedules a debounced write to storage.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<StoreInner>,
}

impl CatalogStore {
    /// Builds the store and loads whatever was persisted under the
    /// configured key.
    pub fn new(
        config: CatalogConfig,
        executor: Arc<dyn QueryExecutor>,
        handles: Arc<dyn HandleStore>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let entities = load_catalog(storage.as_ref(), &config.storage_key);
        log::info!("Loaded {} persisted data sources", entities.len());

        let writer = DeferredWriter::new(
            storage.clone(),
            config.storage_key.clone(),
            config.persist_debounce(),
        );
        let (snapshot, _) = watch::channel(Arc::new(entities));

        Self {
            inner: Arc::new(StoreInner {
                config,
                executor,
                handles,
                storage,
                snapshot,
                pending_adds: Mutex::new(HashMap::new()),
                introspecting: Mutex::new(HashSet::new()),
                tasks: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                schema_subscription: Mutex::new(None),
                writer,
            }),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    pub fn entities(&self) -> CatalogSnapshot {
        self.inner.entities()
    }

    pub fn get(&self, id: SourceId) -> Option<DataSourceEntity> {
        self.inner.get(id)
    }

    pub fn find_by_location(&self, location_key: &str) -> Option<DataSourceEntity> {
        self.entities()
            .iter()
            .find(|e| e.location_key() == location_key)
            .cloned()
    }

    /// Receives every published catalog state.
    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn is_introspecting(&self, id: SourceId) -> bool {
        lock(&self.inner.introspecting).contains(&id)
    }

    /// Registers a source.
    ///
    /// The entity is visible immediately with `introspecting` set. Adding a
    /// location that is already being added joins the in-flight work; adding
    /// one that is already registered replaces the old entity in a single
    /// update and releases its resources before the new one is introspected.
    pub fn add(&self, draft: SourceDraft) -> PendingAdd {
        if draft.name.trim().is_empty() {
            return PendingAdd::ready(
                Uuid::nil(),
                Err(CatalogError::InvalidSource("source name is empty".into())),
            );
        }

        let key = draft.location_key();
        let mut pending = lock(&self.inner.pending_adds);
        if let Some(existing) = pending.get(&key) {
            log::debug!("Add for {} already in flight, joining it", key);
            return existing.clone();
        }

        let current = self.inner.entities();
        let replaced = current.iter().find(|e| e.location_key() == key).cloned();
        let draft = self
            .inner
            .prepare_draft(draft, &current, replaced.as_ref().map(|e| e.id));
        let entity = draft.into_entity(Uuid::new_v4(), Utc::now());
        let id = entity.id;

        match &replaced {
            Some(old) => log::info!("Replacing source {} ({})", entity.name, old.id),
            None => log::info!("Adding source {} ({})", entity.name, entity.kind_tag().as_str()),
        }

        let replaced_id = replaced.as_ref().map(|e| e.id);
        self.inner.update(move |entities| {
            let mut next: Vec<DataSourceEntity> = entities
                .iter()
                .filter(|e| Some(e.id) != replaced_id)
                .cloned()
                .collect();
            next.push(entity);
            Some(next)
        });

        let inner = self.inner.clone();
        let work_key = key.clone();
        let work = async move {
            if let Some(old) = replaced {
                inner.release_resources(&old).await;
            }

            let needs_introspection = inner.get(id).is_some_and(|e| e.needs_introspection());
            if needs_introspection && let Err(e) = inner.introspect(id).await {
                log::debug!("Add of {} finished with introspection error: {}", id, e);
            }

            lock(&inner.pending_adds).remove(&work_key);
            inner.get(id).ok_or(CatalogError::SourceNotFound(id))
        }
        .boxed()
        .shared();

        let pending_add = PendingAdd { id, result: work };
        pending.insert(key, pending_add.clone());
        drop(pending);

        self.inner.drive(pending_add.result.clone());
        pending_add
    }

    /// Detaches and releases a source, then removes it. Cleanup failures are
    /// logged and never block the removal.
    pub async fn remove(&self, id: SourceId) -> bool {
        let Some(entity) = self.inner.get(id) else {
            return false;
        };

        self.inner.release_resources(&entity).await;

        let removed = self.inner.update(|entities| {
            let next: Vec<DataSourceEntity> =
                entities.iter().filter(|e| e.id != id).cloned().collect();
            (next.len() != entities.len()).then_some(next)
        });

        if removed {
            log::info!("Removed source {} ({})", entity.name, id);
        }
        removed
    }

    /// Re-runs introspection for one source. Errors are also recorded on the
    /// entity.
    pub async fn introspect_schema(&self, id: SourceId) -> Result<(), CatalogError> {
        self.inner.introspect(id).await
    }

    /// Loads the columns of a single worksheet on demand and caches them on
    /// the sheet. Unknown sources or sheets yield no columns.
    pub async fn introspect_sheet_columns(
        &self,
        id: SourceId,
        sheet: &str,
    ) -> Result<Vec<ColumnInfo>, CatalogError> {
        let Some(entity) = self.inner.get(id) else {
            return Ok(Vec::new());
        };
        if let SourceKind::Spreadsheet(spreadsheet) = &entity.kind
            && spreadsheet.sheet(sheet).is_none()
        {
            return Ok(Vec::new());
        }

        let result = introspect_sheet(self.inner.executor.as_ref(), &entity, sheet).await?;
        let columns = result.columns.clone();
        self.inner.patch(id, |e| apply_sheet(e, result));

        Ok(columns)
    }

    pub fn mark_restore_failed(&self, id: SourceId, error: impl Into<String>) {
        let error = error.into();
        log::warn!("Source {} needs to be restored: {}", id, error);
        self.inner.patch(id, move |e| {
            e.restore_failed = true;
            e.restore_error = Some(error);
            e.introspecting = false;
        });
    }

    /// Rebinds a source whose file handle was lost, then introspects it.
    pub async fn restore_source(
        &self,
        id: SourceId,
        handle_id: Option<String>,
    ) -> Result<(), CatalogError> {
        if self.inner.get(id).is_none() {
            return Err(CatalogError::SourceNotFound(id));
        }

        self.inner.patch(id, move |e| {
            if let (Some(new_handle), SourceLocation::Local { handle_id, .. }) =
                (handle_id, &mut e.location)
            {
                *handle_id = Some(new_handle);
            }
            e.restore_failed = false;
            e.restore_error = None;
        });

        if let Err(e) = self.inner.handles.verify_handle(id).await {
            self.mark_restore_failed(id, e.to_string());
            return Err(e);
        }

        self.inner.introspect(id).await
    }

    /// Checks every local source's handle after a reload and flags the ones
    /// that need a manual restore.
    pub async fn verify_local_handles(&self) -> usize {
        let local: Vec<SourceId> = self
            .entities()
            .iter()
            .filter(|e| matches!(e.location, SourceLocation::Local { .. }))
            .map(|e| e.id)
            .collect();

        let mut failed = 0;
        for id in local {
            if let Err(e) = self.inner.handles.verify_handle(id).await {
                self.mark_restore_failed(id, e.to_string());
                failed += 1;
            }
        }
        failed
    }

    /// Introspects every loaded source that has not been introspected in
    /// this process yet.
    pub async fn introspect_all(&self) {
        let ids: Vec<SourceId> = self
            .entities()
            .iter()
            .filter(|e| e.needs_introspection() && !e.restore_failed)
            .map(|e| e.id)
            .collect();

        for id in ids {
            if let Err(e) = self.inner.introspect(id).await {
                log::debug!("Startup introspection of {} failed: {}", id, e);
            }
        }
    }

    /// Replaces the whole catalog with a snapshot written by another tab.
    /// `None` means the key was cleared.
    pub fn apply_external_snapshot(&self, raw: Option<&str>) {
        self.inner.apply_external_snapshot(raw);
    }

    /// Follows writes to the storage key made by other tabs.
    pub fn start_cross_tab_sync(&self) {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime, cross-tab sync disabled");
            return;
        };

        let mut changes = self.inner.storage.subscribe();
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let key = self.inner.config.storage_key.clone();

        let listener = runtime.spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if change.key != key {
                            continue;
                        }
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        inner.apply_external_snapshot(change.new_value.as_deref());
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        log::debug!("Missed {} storage events, reloading catalog", skipped);
                        match inner.storage.get(&key) {
                            Ok(raw) => inner.apply_external_snapshot(raw.as_deref()),
                            Err(e) => log::warn!("Failed to reload catalog: {}", e),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        lock(&self.inner.listeners).push(listener);
    }

    /// Re-introspects attached databases whenever the engine reports a
    /// schema change.
    pub fn watch_schema_changes(&self) {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime, schema change tracking disabled");
            return;
        };

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let callback: SchemaChangeCallback = Arc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let task_inner = inner.clone();
            let task = runtime.spawn(async move {
                task_inner.refresh_attached().await;
            });
            inner.track(task);
        });

        let subscription = self.inner.executor.on_schema_change(callback);
        *lock(&self.inner.schema_subscription) = Some(subscription);
    }

    /// Awaits every background add/introspection task spawned so far,
    /// including the ones spawned while waiting.
    pub async fn wait_for_introspections(&self) {
        loop {
            let tasks: Vec<JoinHandle<()>> = lock(&self.inner.tasks).drain(..).collect();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(e) = task.await
                    && !e.is_cancelled()
                {
                    log::warn!("Background catalog task failed: {}", e);
                }
            }
        }
    }

    /// Number of tracked background task handles, finished ones included
    /// until the next spawn reaps them.
    pub fn background_tasks(&self) -> usize {
        lock(&self.inner.tasks).len()
    }

    /// Writes any pending snapshot immediately.
    pub fn flush(&self) {
        self.inner.writer.flush();
    }

    /// Stops listeners, drops the schema subscription and flushes.
    pub fn shutdown(&self) {
        for listener in lock(&self.inner.listeners).drain(..) {
            listener.abort();
        }
        lock(&self.inner.schema_subscription).take();
        self.inner.writer.flush();
        log::debug!("Catalog store shut down");
    }
}

impl StoreInner {
    fn entities(&self) -> CatalogSnapshot {
        self.snapshot.borrow().clone()
    }

    fn get(&self, id: SourceId) -> Option<DataSourceEntity> {
        self.snapshot.borrow().iter().find(|e| e.id == id).cloned()
    }

    /// Applies `f` to the current list. Returning `Some` publishes the new
    /// list and schedules a write.
    fn update(
        &self,
        f: impl FnOnce(&[DataSourceEntity]) -> Option<Vec<DataSourceEntity>>,
    ) -> bool {
        let modified = self.snapshot.send_if_modified(|current| match f(current) {
            Some(next) => {
                *current = Arc::new(next);
                true
            }
            None => false,
        });

        if modified {
            self.persist();
        }
        modified
    }

    /// Mutates one entity by id. A missing id is a no-op, which is what a
    /// late introspection result for a removed source needs.
    fn patch(&self, id: SourceId, f: impl FnOnce(&mut DataSourceEntity)) -> bool {
        self.update(|entities| {
            let index = entities.iter().position(|e| e.id == id)?;
            let mut next = entities.to_vec();
            f(&mut next[index]);
            Some(next)
        })
    }

    fn persist(&self) {
        let entities = self.entities();
        match serialize_catalog(&entities) {
            Ok(payload) => self.writer.schedule(payload),
            Err(e) => log::error!("Failed to serialize catalog: {}", e),
        }
    }

    fn apply_external_snapshot(&self, raw: Option<&str>) {
        let entities = raw.map(deserialize_catalog).unwrap_or_default();
        self.writer.cancel();
        log::info!(
            "Catalog replaced by another tab ({} sources)",
            entities.len()
        );
        self.snapshot.send_replace(Arc::new(entities));
    }

    fn drive(&self, work: Shared<BoxFuture<'static, AddResult>>) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let task = runtime.spawn(work.map(|_| ()));
        self.track(task);
    }

    /// Keeps `task` for `wait_for_introspections`, dropping handles of tasks
    /// that already finished.
    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Fills in defaults the draft left open: the read-only flag and a
    /// database alias unique among the other registered databases.
    fn prepare_draft(
        &self,
        mut draft: SourceDraft,
        current: &[DataSourceEntity],
        replacing: Option<SourceId>,
    ) -> SourceDraft {
        if draft.read_only.is_none() {
            draft.read_only = Some(match draft.kind {
                SourceKind::Database(_) => self.config.attach_read_only,
                _ => true,
            });
        }

        if let SourceKind::Database(db) = &mut draft.kind {
            let taken: HashSet<&str> = current
                .iter()
                .filter(|e| Some(e.id) != replacing)
                .filter_map(|e| e.attached_alias())
                .collect();

            let base = db
                .attached_alias
                .take()
                .unwrap_or_else(|| derive_alias(&draft.name));
            db.attached_alias = Some(unique_alias(&base, &taken));
        }

        draft
    }

    async fn release_resources(&self, entity: &DataSourceEntity) {
        if entity.is_attached()
            && let Some(alias) = entity.attached_alias()
            && let Err(e) = self.executor.execute_query(&detach_statement(alias)).await
        {
            log::warn!("Failed to detach {}: {}", alias, e);
        }

        if matches!(entity.location, SourceLocation::Local { .. })
            && let Err(e) = self.handles.remove_handle(entity.id).await
        {
            log::warn!("Failed to release file handle for {}: {}", entity.name, e);
        }
    }

    async fn introspect(&self, id: SourceId) -> Result<(), CatalogError> {
        if !lock(&self.introspecting).insert(id) {
            log::debug!("Introspection of {} already running", id);
            return Ok(());
        }
        let _guard = IntrospectionGuard { inner: self, id };

        let Some(entity) = self.get(id) else {
            return Err(CatalogError::SourceNotFound(id));
        };

        self.patch(id, |e| {
            e.introspecting = true;
            e.introspection_error = None;
        });

        let connector = match entity.kind {
            SourceKind::Cloud(_) => ConnectorKind::CloudWarehouse,
            _ => ConnectorKind::LocalEngine,
        };
        let result = if self.executor.is_connector_ready(connector) {
            self.run_introspection(&entity).await
        } else {
            Err(CatalogError::EngineNotReady(connector.label().to_string()))
        };

        match result {
            Ok(outcome) => {
                self.patch(id, |e| apply_outcome(e, outcome));
                log::debug!("Introspected {} ({})", entity.name, id);
                Ok(())
            }
            Err(err) => {
                log::warn!("Introspection of {} failed: {}", entity.name, err);
                let message = err.to_string();
                self.patch(id, move |e| {
                    e.introspecting = false;
                    e.introspection_error = Some(message);
                });
                Err(err)
            }
        }
    }

    async fn run_introspection(
        &self,
        entity: &DataSourceEntity,
    ) -> Result<IntrospectionOutcome, CatalogError> {
        let executor = self.executor.as_ref();

        match &entity.kind {
            SourceKind::Database(db) => {
                let reference = entity.location.reference().ok_or_else(|| {
                    CatalogError::InvalidSource(format!("{} has no location", entity.name))
                })?;
                let alias = db
                    .attached_alias
                    .clone()
                    .unwrap_or_else(|| derive_alias(&entity.name));

                let result =
                    introspect_database(executor, reference, &alias, entity.read_only, db.attached)
                        .await?;
                Ok(IntrospectionOutcome::Database {
                    alias,
                    schemas: result.schemas,
                })
            }
            SourceKind::FlatFile(file) => {
                let result = introspect_flat_file(executor, file.format, &entity.location).await?;
                Ok(IntrospectionOutcome::FlatFile(result))
            }
            SourceKind::Spreadsheet(spreadsheet) => match spreadsheet.sheets.first() {
                Some(first) => {
                    let result = introspect_sheet(executor, entity, &first.name).await?;
                    Ok(IntrospectionOutcome::Sheet(result))
                }
                None => Ok(IntrospectionOutcome::Unchanged),
            },
            SourceKind::Cloud(_) => Ok(IntrospectionOutcome::Unchanged),
        }
    }

    async fn refresh_attached(&self) {
        let attached: Vec<SourceId> = self
            .entities()
            .iter()
            .filter(|e| e.is_attached())
            .map(|e| e.id)
            .collect();

        log::debug!("Schema changed, refreshing {} attached databases", attached.len());
        for id in attached {
            if let Err(e) = self.introspect(id).await {
                log::debug!("Refresh of {} failed: {}", id, e);
            }
        }
    }
}

fn apply_outcome(entity: &mut DataSourceEntity, outcome: IntrospectionOutcome) {
    entity.introspecting = false;
    entity.introspection_error = None;

    match outcome {
        IntrospectionOutcome::Database { alias, schemas } => {
            if let SourceKind::Database(db) = &mut entity.kind {
                db.attached = true;
                db.attached_alias = Some(alias);
                db.schemas = schemas;
            }
            entity.restore_failed = false;
            entity.restore_error = None;
        }
        IntrospectionOutcome::FlatFile(result) => {
            let missing = result.file_missing;
            if let SourceKind::FlatFile(file) = &mut entity.kind {
                file.columns = result.columns;
                file.row_count = if missing { Some(0) } else { result.row_count };
            }
            entity.restore_failed = missing;
            entity.restore_error = missing.then(|| "file is no longer available".to_string());
        }
        IntrospectionOutcome::Sheet(result) => apply_sheet(entity, result),
        IntrospectionOutcome::Unchanged => {}
    }
}

fn apply_sheet(entity: &mut DataSourceEntity, result: SheetIntrospection) {
    if let SourceKind::Spreadsheet(spreadsheet) = &mut entity.kind
        && let Some(sheet) = spreadsheet.sheets.iter_mut().find(|s| s.name == result.sheet)
    {
        sheet.columns = Some(result.columns);
        sheet.row_count = result.row_count;
    }
}

fn unique_alias(base: &str, taken: &HashSet<&str>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
