use datadeck_core::{
    CatalogConfig, CatalogStore, DeferredWriter, FileFormat, KeyValueStorage, SourceKind, deserialize_catalog,
    serialize_catalog,
};
use datadeck_test_support::fixtures::{
    TEST_DEBOUNCE, catalog_store, entity, local_csv, local_database, script_flat_file,
};
use datadeck_test_support::{FakeExecutor, FakeHandleStore, MemoryStorageHub};
use std::time::Duration;

fn storage_key() -> String {
    CatalogConfig::default().storage_key
}

#[tokio::test(start_paused = true)]
async fn deferred_writer_coalesces_bursts() {
    let hub = MemoryStorageHub::new();
    let writer = DeferredWriter::new(hub.tab().as_storage_arc(), "k", TEST_DEBOUNCE);

    writer.schedule("one".into());
    writer.schedule("two".into());
    writer.schedule("three".into());
    assert!(writer.has_pending());
    assert_eq!(hub.write_count("k"), 0);

    tokio::time::sleep(TEST_DEBOUNCE + Duration::from_millis(10)).await;

    assert_eq!(hub.write_count("k"), 1);
    assert_eq!(hub.value("k").as_deref(), Some("three"));
    assert!(!writer.has_pending());
}

#[tokio::test(start_paused = true)]
async fn flush_writes_synchronously_and_disarms_the_timer() {
    let hub = MemoryStorageHub::new();
    let writer = DeferredWriter::new(hub.tab().as_storage_arc(), "k", TEST_DEBOUNCE);

    writer.schedule("payload".into());
    writer.flush();
    assert_eq!(hub.value("k").as_deref(), Some("payload"));

    tokio::time::sleep(TEST_DEBOUNCE * 2).await;
    assert_eq!(hub.write_count("k"), 1);

    writer.schedule("dropped".into());
    writer.cancel();
    tokio::time::sleep(TEST_DEBOUNCE * 2).await;
    assert_eq!(hub.value("k").as_deref(), Some("payload"));
}

#[test]
fn writer_outside_a_runtime_writes_immediately() {
    let hub = MemoryStorageHub::new();
    let writer = DeferredWriter::new(hub.tab().as_storage_arc(), "k", TEST_DEBOUNCE);

    writer.schedule("now".into());
    assert_eq!(hub.value("k").as_deref(), Some("now"));
}

#[tokio::test]
async fn shutdown_flushes_the_latest_state() {
    let executor = FakeExecutor::new();
    script_flat_file(&executor, FileFormat::Csv, "/data/a.csv", &[("x", "INTEGER")], 9);
    let hub = MemoryStorageHub::new();
    let store = catalog_store(&executor, &FakeHandleStore::new(), &hub.tab());

    store.add(local_csv("/data/a.csv")).await.expect("add");
    store.add(local_csv("/data/b.csv").volatile()).await.expect("add");
    store.shutdown();

    let raw = hub.value(&storage_key()).expect("snapshot written");
    let restored = deserialize_catalog(&raw);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].name, "a.csv");
    match &restored[0].kind {
        SourceKind::FlatFile(file) => assert_eq!(file.row_count, Some(9)),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn dropping_the_writer_writes_the_pending_payload() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    let hub = MemoryStorageHub::new();

    runtime.block_on(async {
        let writer = DeferredWriter::new(hub.tab().as_storage_arc(), "k", Duration::from_secs(60));
        writer.schedule("last".into());
        assert_eq!(hub.write_count("k"), 0);
    });

    assert_eq!(hub.value("k").as_deref(), Some("last"));
    assert_eq!(hub.write_count("k"), 1);
}

#[tokio::test]
async fn dropping_the_store_writes_pending_state() {
    let executor = FakeExecutor::new();
    script_flat_file(&executor, FileFormat::Csv, "/data/a.csv", &[("x", "INTEGER")], 3);
    let hub = MemoryStorageHub::new();

    {
        let config = CatalogConfig {
            persist_debounce_ms: 60_000,
            ..CatalogConfig::default()
        };
        let store = CatalogStore::new(
            config,
            executor.clone().as_executor_arc(),
            FakeHandleStore::new().as_handle_store_arc(),
            hub.tab().as_storage_arc(),
        );
        store.add(local_csv("/data/a.csv")).await.expect("add");
        store.wait_for_introspections().await;
        assert_eq!(hub.write_count(&storage_key()), 0);
    }

    let raw = hub.value(&storage_key()).expect("written on drop");
    let restored = deserialize_catalog(&raw);
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].name, "a.csv");
}

#[tokio::test]
async fn startup_load_resets_runtime_flags() {
    let mut attached = entity(local_database("/data/sales.duckdb").with_alias("sales"));
    if let SourceKind::Database(db) = &mut attached.kind {
        db.attached = true;
    }
    attached.introspection_error = Some("stale".into());
    let mut lost = entity(local_csv("/data/lost.csv"));
    lost.restore_failed = true;

    let hub = MemoryStorageHub::new();
    hub.seed(
        storage_key(),
        serialize_catalog(&[attached.clone(), lost.clone()]).expect("serialize"),
    );

    let store = catalog_store(&FakeExecutor::new(), &FakeHandleStore::new(), &hub.tab());
    let loaded = store.entities();

    assert_eq!(loaded.len(), 2);
    assert!(!loaded[0].is_attached());
    assert_eq!(loaded[0].attached_alias(), Some("sales"));
    assert_eq!(loaded[0].introspection_error, None);
    assert!(!loaded[1].restore_failed);
}

#[tokio::test]
async fn corrupt_storage_starts_empty() {
    let hub = MemoryStorageHub::new();
    hub.seed(storage_key(), "{ definitely not a catalog");

    let store = catalog_store(&FakeExecutor::new(), &FakeHandleStore::new(), &hub.tab());
    assert!(store.entities().is_empty());
}

#[tokio::test]
async fn other_tabs_converge_on_the_last_write() {
    let executor = FakeExecutor::new();
    script_flat_file(&executor, FileFormat::Csv, "/data/a.csv", &[("x", "INTEGER")], 4);
    let hub = MemoryStorageHub::new();
    let tab_a = catalog_store(&executor, &FakeHandleStore::new(), &hub.tab());
    let tab_b = catalog_store(&executor, &FakeHandleStore::new(), &hub.tab());
    tab_b.start_cross_tab_sync();

    let mut updates = tab_b.subscribe();
    let added = tab_a.add(local_csv("/data/a.csv")).await.expect("add");
    tab_a.flush();

    tokio::time::timeout(Duration::from_secs(1), updates.changed())
        .await
        .expect("notification delivered")
        .expect("store alive");

    let mirrored = tab_b.entities();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].id, added.id);
    assert!(!mirrored[0].introspecting);

    let storage = hub.tab();
    storage.remove(&storage_key()).expect("remove");
    tokio::time::timeout(Duration::from_secs(1), updates.changed())
        .await
        .expect("notification delivered")
        .expect("store alive");
    assert!(tab_b.entities().is_empty());

    tab_a.shutdown();
    tab_b.shutdown();
}
