use datadeck_core::sanitize::{
    count_statement, file_relation, list_columns_statement, list_schemas_statement,
    list_tables_statement, qualified_table, sheet_relation, structure_statement,
};
use datadeck_core::{
    CatalogConfig, CatalogStore, ColumnMeta, DataSourceEntity, FileFormat, QueryResult, Row,
    SourceDraft, SourceLocation, Value,
};
use std::time::Duration;
use uuid::Uuid;

use crate::{FakeExecutor, FakeHandleStore, FakeQueryOutcome, MemoryStorage};

pub fn column(name: impl Into<String>, type_name: impl Into<String>) -> ColumnMeta {
    ColumnMeta::new(name, type_name, true)
}

pub fn text_cell(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn int_cell(value: i64) -> Value {
    Value::Int(value)
}

pub fn count_result(count: i64) -> QueryResult {
    QueryResult::new(vec![column("count", "BIGINT")], vec![vec![int_cell(count)]])
}

pub fn structure_result(columns: &[(&str, &str)]) -> QueryResult {
    QueryResult::new(
        columns.iter().map(|(n, t)| column(*n, *t)).collect(),
        Vec::new(),
    )
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<(String, String)>,
    pub row_count: i64,
}

pub fn table(name: &str, columns: &[(&str, &str)], row_count: i64) -> FakeTable {
    FakeTable {
        name: name.to_string(),
        columns: columns
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect(),
        row_count,
    }
}

/// Scripts the catalog queries issued when a database attached as `alias`
/// is introspected: one schema holding `tables`.
pub fn script_database(executor: &FakeExecutor, alias: &str, schema: &str, tables: &[FakeTable]) {
    executor.set_outcome(
        list_schemas_statement(alias),
        FakeQueryOutcome::Success(QueryResult::new(
            vec![column("schema_name", "VARCHAR")],
            vec![vec![text_cell(schema)]],
        )),
    );

    let table_rows: Vec<Row> = tables
        .iter()
        .map(|t| vec![text_cell(&t.name), text_cell("BASE TABLE")])
        .collect();
    executor.set_outcome(
        list_tables_statement(alias, schema),
        FakeQueryOutcome::Success(QueryResult::new(
            vec![column("table_name", "VARCHAR"), column("table_type", "VARCHAR")],
            table_rows,
        )),
    );

    for t in tables {
        let column_rows: Vec<Row> = t
            .columns
            .iter()
            .map(|(n, ty)| vec![text_cell(n), text_cell(ty), text_cell("YES")])
            .collect();
        executor.set_outcome(
            list_columns_statement(alias, schema, &t.name),
            FakeQueryOutcome::Success(QueryResult::new(
                vec![
                    column("column_name", "VARCHAR"),
                    column("data_type", "VARCHAR"),
                    column("is_nullable", "VARCHAR"),
                ],
                column_rows,
            )),
        );
        executor.set_outcome(
            count_statement(&qualified_table(Some(alias), Some(schema), &t.name)),
            FakeQueryOutcome::Success(count_result(t.row_count)),
        );
    }
}

pub fn script_flat_file(
    executor: &FakeExecutor,
    format: FileFormat,
    reference: &str,
    columns: &[(&str, &str)],
    row_count: i64,
) {
    let relation = file_relation(format, reference);
    executor.set_outcome(
        structure_statement(&relation),
        FakeQueryOutcome::Success(structure_result(columns)),
    );
    executor.set_outcome(
        count_statement(&relation),
        FakeQueryOutcome::Success(count_result(row_count)),
    );
}

pub fn script_missing_file(executor: &FakeExecutor, format: FileFormat, reference: &str) {
    let relation = file_relation(format, reference);
    executor.set_outcome(
        structure_statement(&relation),
        FakeQueryOutcome::MissingFile(reference.to_string()),
    );
}

pub fn script_sheet(executor: &FakeExecutor, reference: &str, sheet: &str, columns: &[(&str, &str)]) {
    executor.set_outcome(
        structure_statement(&sheet_relation(reference, sheet)),
        FakeQueryOutcome::Success(structure_result(columns)),
    );
}

pub fn script_sheet_rows(executor: &FakeExecutor, reference: &str, sheet: &str, row_count: i64) {
    executor.set_outcome(
        count_statement(&sheet_relation(reference, sheet)),
        FakeQueryOutcome::Success(count_result(row_count)),
    );
}

pub fn local_csv(path: &str) -> SourceDraft {
    SourceDraft::flat_file(file_name(path), FileFormat::Csv, SourceLocation::local(path))
}

pub fn remote_parquet(url: &str) -> SourceDraft {
    SourceDraft::flat_file(file_name(url), FileFormat::Parquet, SourceLocation::remote(url))
}

pub fn local_database(path: &str) -> SourceDraft {
    SourceDraft::database(file_name(path), SourceLocation::local(path))
}

pub fn entity(draft: SourceDraft) -> DataSourceEntity {
    let mut entity = draft.into_entity(Uuid::new_v4(), chrono::Utc::now());
    entity.introspecting = false;
    entity
}

pub fn test_config() -> CatalogConfig {
    CatalogConfig {
        persist_debounce_ms: 100,
        ..CatalogConfig::default()
    }
}

pub const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

pub fn catalog_store(
    executor: &FakeExecutor,
    handles: &FakeHandleStore,
    storage: &MemoryStorage,
) -> CatalogStore {
    CatalogStore::new(
        test_config(),
        executor.clone().as_executor_arc(),
        handles.clone().as_handle_store_arc(),
        storage.clone().as_storage_arc(),
    )
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
