mod catalog_store;
mod config;
mod error;
mod file_storage;
mod introspection;
mod persistence;
mod query;
pub mod sanitize;
mod schema;
mod source;
mod traits;

pub use catalog_store::{CatalogSnapshot, CatalogStore, PendingAdd};
pub use config::{APP_DIR, CatalogConfig, ConfigStore};
pub use error::CatalogError;
pub use file_storage::FileStorage;
pub use introspection::{
    DatabaseIntrospection, FlatFileIntrospection, SheetIntrospection, introspect_database,
    introspect_flat_file, introspect_sheet,
};
pub use persistence::{DeferredWriter, deserialize_catalog, load_catalog, serialize_catalog};
pub use query::{ColumnMeta, QueryResult, Row, Value};
pub use schema::{
    CloudDataset, CloudProject, CloudSnapshot, ColumnInfo, ExternalSnapshots, SchemaInfo,
    SessionSnapshot, SheetInfo, TableInfo, TableKind,
};
pub use source::{
    CloudSource, DataSourceEntity, DatabaseSource, FileFormat, FlatFileSource, SourceDraft,
    SourceId, SourceKind, SourceKindTag, SourceLocation, SpreadsheetSource, derive_alias,
    location_key,
};
pub use traits::{
    ConnectorKind, HandleStore, KeyValueStorage, QueryExecutor, SchemaChangeCallback,
    StorageChange, Subscription,
};
