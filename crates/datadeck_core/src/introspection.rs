//! Schema discovery for each source kind.
//!
//! These functions only issue queries and return metadata; merging results
//! into the catalog is the store's job.

use crate::sanitize::{
    attach_statement, count_statement, file_relation, list_columns_statement,
    list_schemas_statement, list_tables_statement, qualified_table, sheet_relation,
    structure_statement,
};
use crate::{
    CatalogError, ColumnInfo, DataSourceEntity, FileFormat, QueryExecutor, SchemaInfo,
    SourceKind, SourceLocation, TableInfo, TableKind,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseIntrospection {
    pub schemas: Vec<SchemaInfo>,
}

impl DatabaseIntrospection {
    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatFileIntrospection {
    pub columns: Vec<ColumnInfo>,
    /// `None` when the count query failed.
    pub row_count: Option<u64>,
    /// The local file was gone; the result is intentionally empty.
    pub file_missing: bool,
}

impl FlatFileIntrospection {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetIntrospection {
    pub sheet: String,
    pub columns: Vec<ColumnInfo>,
    /// `None` when the count query failed.
    pub row_count: Option<u64>,
}

impl SheetIntrospection {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Attaches the database (unless it already is) and walks
/// schemas → tables → columns → row counts.
pub async fn introspect_database(
    executor: &dyn QueryExecutor,
    reference: &str,
    alias: &str,
    read_only: bool,
    already_attached: bool,
) -> Result<DatabaseIntrospection, CatalogError> {
    if !already_attached {
        match executor
            .execute_query(&attach_statement(reference, alias, read_only))
            .await
        {
            Ok(_) => log::debug!("Attached {} as {}", reference, alias),
            Err(e) if e.is_already_attached() => {
                log::debug!("{} already attached as {}", reference, alias);
            }
            Err(e) => return Err(e),
        }
    }

    let schema_rows = executor
        .execute_query(&list_schemas_statement(alias))
        .await?;

    let mut schemas = Vec::with_capacity(schema_rows.row_count());
    for row in 0..schema_rows.row_count() {
        let Some(schema_name) = schema_rows.text(row, 0) else {
            continue;
        };

        let tables = introspect_schema_tables(executor, alias, &schema_name).await?;
        schemas.push(SchemaInfo::new(schema_name, tables));
    }

    Ok(DatabaseIntrospection { schemas })
}

async fn introspect_schema_tables(
    executor: &dyn QueryExecutor,
    alias: &str,
    schema: &str,
) -> Result<Vec<TableInfo>, CatalogError> {
    let table_rows = executor
        .execute_query(&list_tables_statement(alias, schema))
        .await?;

    let mut tables = Vec::with_capacity(table_rows.row_count());
    for row in 0..table_rows.row_count() {
        let Some(table_name) = table_rows.text(row, 0) else {
            continue;
        };
        let kind = table_rows
            .text(row, 1)
            .map(|t| TableKind::from_table_type(&t))
            .unwrap_or_default();

        let column_rows = executor
            .execute_query(&list_columns_statement(alias, schema, &table_name))
            .await?;

        let columns = (0..column_rows.row_count())
            .filter_map(|r| {
                let name = column_rows.text(r, 0)?;
                let type_name = column_rows.text(r, 1).unwrap_or_default();
                let nullable = column_rows
                    .rows
                    .get(r)
                    .and_then(|row| row.get(2))
                    .and_then(|v| v.as_flag())
                    .unwrap_or(true);
                Some(ColumnInfo::new(name, type_name, nullable))
            })
            .collect();

        let relation = qualified_table(Some(alias), Some(schema), &table_name);
        let row_count = match executor.execute_query(&count_statement(&relation)).await {
            Ok(result) => result.scalar().and_then(|v| v.as_u64()).unwrap_or(0),
            Err(e) => {
                log::warn!("Row count failed for {}: {}", relation, e);
                0
            }
        };

        tables.push(
            TableInfo::new(table_name, columns)
                .with_kind(kind)
                .with_row_count(row_count),
        );
    }

    Ok(tables)
}

/// Reads column metadata with a zero-row query, then counts rows.
///
/// A missing *local* file yields an empty result flagged `file_missing`;
/// a missing *remote* file is an error.
pub async fn introspect_flat_file(
    executor: &dyn QueryExecutor,
    format: FileFormat,
    location: &SourceLocation,
) -> Result<FlatFileIntrospection, CatalogError> {
    let reference = location
        .reference()
        .ok_or_else(|| CatalogError::InvalidSource("file source has no location".into()))?;
    let relation = file_relation(format, reference);

    let structure = match executor.execute_query(&structure_statement(&relation)).await {
        Ok(result) => result,
        Err(e) if e.is_missing_file() && !location.is_remote() => {
            log::warn!("Local file {} no longer exists", reference);
            return Ok(FlatFileIntrospection {
                file_missing: true,
                ..FlatFileIntrospection::default()
            });
        }
        Err(e) => return Err(e),
    };

    let columns = structure.columns.iter().map(ColumnInfo::from).collect();

    let row_count = match executor.execute_query(&count_statement(&relation)).await {
        Ok(result) => result.scalar().and_then(|v| v.as_u64()),
        Err(e) => {
            log::debug!("Row count unavailable for {}: {}", reference, e);
            None
        }
    };

    Ok(FlatFileIntrospection {
        columns,
        row_count,
        file_missing: false,
    })
}

/// Structural query scoped to one worksheet, then a row count. A failed
/// count leaves `row_count` empty.
pub async fn introspect_sheet(
    executor: &dyn QueryExecutor,
    entity: &DataSourceEntity,
    sheet: &str,
) -> Result<SheetIntrospection, CatalogError> {
    if !matches!(entity.kind, SourceKind::Spreadsheet(_)) {
        return Err(CatalogError::InvalidSource(format!(
            "{} is not a spreadsheet",
            entity.name
        )));
    }

    let reference = entity.location.reference().ok_or_else(|| {
        CatalogError::InvalidSource(format!("spreadsheet {} has no location", entity.name))
    })?;

    let relation = sheet_relation(reference, sheet);
    let structure = executor
        .execute_query(&structure_statement(&relation))
        .await?;

    let row_count = match executor.execute_query(&count_statement(&relation)).await {
        Ok(result) => result.scalar().and_then(|v| v.as_u64()),
        Err(e) => {
            log::debug!("Row count unavailable for sheet {} of {}: {}", sheet, reference, e);
            None
        }
    };

    Ok(SheetIntrospection {
        sheet: sheet.to_string(),
        columns: structure.columns.iter().map(ColumnInfo::from).collect(),
        row_count,
    })
}
