use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ColumnInfo, SchemaInfo, SheetInfo};

pub type SourceId = Uuid;

/// Flat file formats the engine can read in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Tsv,
    Parquet,
    Json,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "parquet" | "pq" => Some(Self::Parquet),
            "json" | "jsonl" | "ndjson" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Tsv => "TSV",
            Self::Parquet => "Parquet",
            Self::Json => "JSON",
        }
    }
}

/// Where a source lives. Local and remote are mutually exclusive by
/// construction; cloud connections carry no location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceLocation {
    Local {
        /// Path as registered with the query engine.
        #[serde(default)]
        path: Option<String>,
        /// Id of the persisted file handle held by the handle store.
        #[serde(default)]
        handle_id: Option<String>,
    },
    Remote {
        url: String,
    },
    Unbound,
}

impl SourceLocation {
    pub fn local(path: impl Into<String>) -> Self {
        Self::Local {
            path: Some(path.into()),
            handle_id: None,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote { url: url.into() }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// The reference handed to the engine: the URL for remote sources, the
    /// registered path for local ones.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Local { path, .. } => path.as_deref(),
            Self::Remote { url } => Some(url),
            Self::Unbound => None,
        }
    }

    pub fn handle_id(&self) -> Option<&str> {
        match self {
            Self::Local { handle_id, .. } => handle_id.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSource {
    #[serde(default)]
    pub attached: bool,
    #[serde(default)]
    pub attached_alias: Option<String>,
    #[serde(default)]
    pub schemas: Vec<SchemaInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatFileSource {
    pub format: FileFormat,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetSource {
    #[serde(default)]
    pub sheets: Vec<SheetInfo>,
}

impl SpreadsheetSource {
    pub fn sheet(&self, name: &str) -> Option<&SheetInfo> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSource {
    #[serde(default)]
    pub project_ids: Vec<String>,
}

/// Kind-specific payload of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Database(DatabaseSource),
    FlatFile(FlatFileSource),
    Spreadsheet(SpreadsheetSource),
    Cloud(CloudSource),
}

/// Data-free discriminant of [`SourceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKindTag {
    Database,
    FlatFile,
    Spreadsheet,
    Cloud,
}

impl SourceKindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::FlatFile => "flat_file",
            Self::Spreadsheet => "spreadsheet",
            Self::Cloud => "cloud",
        }
    }
}

impl SourceKind {
    pub fn tag(&self) -> SourceKindTag {
        match self {
            Self::Database(_) => SourceKindTag::Database,
            Self::FlatFile(_) => SourceKindTag::FlatFile,
            Self::Spreadsheet(_) => SourceKindTag::Spreadsheet,
            Self::Cloud(_) => SourceKindTag::Cloud,
        }
    }
}

/// One user-visible data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceEntity {
    pub id: SourceId,
    pub name: String,
    #[serde(flatten)]
    pub kind: SourceKind,
    pub location: SourceLocation,
    pub added_at: DateTime<Utc>,

    #[serde(default)]
    pub introspecting: bool,
    #[serde(default)]
    pub introspection_error: Option<String>,
    #[serde(default)]
    pub restore_failed: bool,
    #[serde(default)]
    pub restore_error: Option<String>,

    #[serde(default)]
    pub read_only: bool,
    /// Dropped straight into memory; never survives a reload.
    #[serde(default)]
    pub volatile: bool,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl DataSourceEntity {
    pub fn kind_tag(&self) -> SourceKindTag {
        self.kind.tag()
    }

    pub fn is_remote(&self) -> bool {
        self.location.is_remote()
    }

    pub fn location_key(&self) -> String {
        location_key(&self.location, self.kind_tag(), &self.name)
    }

    /// Cloud connections are ready as soon as they are added.
    pub fn needs_introspection(&self) -> bool {
        !matches!(self.kind, SourceKind::Cloud(_))
    }

    pub fn is_attached(&self) -> bool {
        matches!(&self.kind, SourceKind::Database(db) if db.attached)
    }

    pub fn attached_alias(&self) -> Option<&str> {
        match &self.kind {
            SourceKind::Database(db) => db.attached_alias.as_deref(),
            _ => None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.introspection_error.is_some() || self.restore_failed
    }

    /// Clears the flags that describe a previous process's runtime state.
    pub fn reset_transient_state(&mut self) {
        self.introspecting = false;
        self.introspection_error = None;
        self.restore_failed = false;
        self.restore_error = None;
        if let SourceKind::Database(db) = &mut self.kind {
            db.attached = false;
        }
    }
}

/// Input to `CatalogStore::add`, supplied by upload/attach collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDraft {
    pub name: String,
    pub kind: SourceKind,
    pub location: SourceLocation,
    /// `None` defers to the catalog's configured default.
    pub read_only: Option<bool>,
    pub volatile: bool,
    pub size_bytes: Option<u64>,
}

impl SourceDraft {
    pub fn database(name: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(name, SourceKind::Database(DatabaseSource::default()), location)
    }

    pub fn flat_file(
        name: impl Into<String>,
        format: FileFormat,
        location: SourceLocation,
    ) -> Self {
        Self::new(
            name,
            SourceKind::FlatFile(FlatFileSource {
                format,
                columns: Vec::new(),
                row_count: None,
            }),
            location,
        )
    }

    pub fn spreadsheet(
        name: impl Into<String>,
        location: SourceLocation,
        sheet_names: &[&str],
    ) -> Self {
        let sheets = sheet_names
            .iter()
            .enumerate()
            .map(|(index, name)| SheetInfo::new(*name, index))
            .collect();
        Self::new(
            name,
            SourceKind::Spreadsheet(SpreadsheetSource { sheets }),
            location,
        )
    }

    pub fn cloud(name: impl Into<String>, project_ids: Vec<String>) -> Self {
        Self::new(
            name,
            SourceKind::Cloud(CloudSource { project_ids }),
            SourceLocation::Unbound,
        )
    }

    fn new(name: impl Into<String>, kind: SourceKind, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            read_only: None,
            volatile: false,
            size_bytes: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        if let SourceKind::Database(db) = &mut self.kind {
            db.attached_alias = Some(alias.into());
        }
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        if let SourceLocation::Local { handle_id, .. } = &mut self.location {
            *handle_id = Some(handle.into());
        }
        self
    }

    pub fn location_key(&self) -> String {
        location_key(&self.location, self.kind.tag(), &self.name)
    }

    pub fn into_entity(self, id: SourceId, added_at: DateTime<Utc>) -> DataSourceEntity {
        let introspecting = !matches!(self.kind, SourceKind::Cloud(_));
        DataSourceEntity {
            id,
            name: self.name,
            kind: self.kind,
            location: self.location,
            added_at,
            introspecting,
            introspection_error: None,
            restore_failed: false,
            restore_error: None,
            read_only: self.read_only.unwrap_or(true),
            volatile: self.volatile,
            size_bytes: self.size_bytes,
        }
    }
}

/// Identity used for duplicate suppression: the remote URL, else the local
/// path, else name and kind.
pub fn location_key(location: &SourceLocation, tag: SourceKindTag, name: &str) -> String {
    match location {
        SourceLocation::Remote { url } => format!("url:{}", normalize_url(url)),
        SourceLocation::Local {
            path: Some(path), ..
        } if !path.trim().is_empty() => format!("path:{}", path.trim()),
        _ => format!("name:{}:{}", tag.as_str(), name.trim()),
    }
}

fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Derives an attach alias from a file name: extension dropped, anything
/// outside `[A-Za-z0-9_]` replaced, leading digit prefixed.
pub fn derive_alias(name: &str) -> String {
    let base = std::path::Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);

    let mut alias: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if alias.is_empty() {
        alias.push_str("db");
    } else if alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert_str(0, "db_");
    }

    alias
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_key_prefers_url_then_path_then_name() {
        let remote = SourceDraft::flat_file(
            "a.csv",
            FileFormat::Csv,
            SourceLocation::remote("https://Example.com/data/a.csv"),
        );
        assert_eq!(remote.location_key(), "url:https://example.com/data/a.csv");

        let local = SourceDraft::database("sales.duckdb", SourceLocation::local("sales.duckdb"));
        assert_eq!(local.location_key(), "path:sales.duckdb");

        let cloud = SourceDraft::cloud("warehouse", vec!["p1".into()]);
        assert_eq!(cloud.location_key(), "name:cloud:warehouse");

        let unnamed_path = SourceDraft::flat_file(
            "drop.csv",
            FileFormat::Csv,
            SourceLocation::Local {
                path: None,
                handle_id: Some("h1".into()),
            },
        );
        assert_eq!(unnamed_path.location_key(), "name:flat_file:drop.csv");
    }

    #[test]
    fn alias_derivation() {
        assert_eq!(derive_alias("sales.duckdb"), "sales");
        assert_eq!(derive_alias("my-data v2.db"), "my_data_v2");
        assert_eq!(derive_alias("2024.duckdb"), "db_2024");
        assert_eq!(derive_alias(""), "db");
    }

    #[test]
    fn new_entities_start_introspecting_except_cloud() {
        let now = Utc::now();
        let db = SourceDraft::database("a.duckdb", SourceLocation::local("a.duckdb"))
            .into_entity(Uuid::new_v4(), now);
        assert!(db.introspecting);

        let cloud = SourceDraft::cloud("wh", Vec::new()).into_entity(Uuid::new_v4(), now);
        assert!(!cloud.introspecting);
        assert!(!cloud.needs_introspection());
    }

    #[test]
    fn reset_transient_state_keeps_alias() {
        let mut entity = SourceDraft::database("a.duckdb", SourceLocation::local("a.duckdb"))
            .with_alias("a")
            .into_entity(Uuid::new_v4(), Utc::now());
        if let SourceKind::Database(db) = &mut entity.kind {
            db.attached = true;
        }
        entity.introspection_error = Some("boom".into());
        entity.restore_failed = true;

        entity.reset_transient_state();

        assert!(!entity.is_attached());
        assert_eq!(entity.attached_alias(), Some("a"));
        assert!(entity.introspection_error.is_none());
        assert!(!entity.restore_failed);
    }

    #[test]
    fn entity_serializes_with_kind_tag() {
        let entity = SourceDraft::flat_file(
            "a.csv",
            FileFormat::Csv,
            SourceLocation::local("a.csv"),
        )
        .into_entity(Uuid::new_v4(), Utc::now());

        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["kind"], "flat_file");
        assert_eq!(json["format"], "csv");
        assert_eq!(json["location"]["type"], "local");

        let back: DataSourceEntity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }
}
