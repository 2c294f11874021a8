use serde::{Deserialize, Serialize};

use crate::{ColumnMeta, SourceId};

/// Column discovered by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

impl From<&ColumnMeta> for ColumnInfo {
    fn from(meta: &ColumnMeta) -> Self {
        Self {
            name: meta.name.clone(),
            type_name: meta.type_name.clone(),
            nullable: meta.nullable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TableKind {
    #[default]
    Table,
    View,
}

impl TableKind {
    /// Maps information_schema `table_type` values.
    pub fn from_table_type(table_type: &str) -> Self {
        if table_type.to_ascii_uppercase().contains("VIEW") {
            TableKind::View
        } else {
            TableKind::Table
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub kind: TableKind,
    pub columns: Vec<ColumnInfo>,
    /// Zero when counting failed.
    #[serde(default)]
    pub row_count: u64,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            kind: TableKind::Table,
            columns,
            row_count: 0,
        }
    }

    pub fn with_kind(mut self, kind: TableKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = row_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub name: String,
    pub tables: Vec<TableInfo>,
}

impl SchemaInfo {
    pub fn new(name: impl Into<String>, tables: Vec<TableInfo>) -> Self {
        Self {
            name: name.into(),
            tables,
        }
    }
}

/// One worksheet of a spreadsheet source. Columns and the row count are
/// filled lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub name: String,
    pub index: usize,
    #[serde(default)]
    pub columns: Option<Vec<ColumnInfo>>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

impl SheetInfo {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            columns: None,
            row_count: None,
        }
    }
}

/// Tables living in the in-memory query session, supplied by the SQL engine
/// rather than by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudDataset {
    pub name: String,
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudProject {
    pub id: String,
    pub datasets: Vec<CloudDataset>,
}

/// Warehouse metadata for one cloud connection entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSnapshot {
    pub source_id: SourceId,
    pub projects: Vec<CloudProject>,
}

/// Schema data the projection receives from outside the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalSnapshots {
    pub session: Option<SessionSnapshot>,
    pub cloud: Vec<CloudSnapshot>,
}

impl ExternalSnapshots {
    pub fn cloud_for(&self, source_id: SourceId) -> Option<&CloudSnapshot> {
        self.cloud.iter().find(|c| c.source_id == source_id)
    }
}
