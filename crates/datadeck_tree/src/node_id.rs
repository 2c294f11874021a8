use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::{NodeKind, SectionKind};

/// Typed identity of a tree node.
///
/// Ids are derived from the node's position in the source hierarchy, never
/// generated, so projecting the same catalog twice yields equal ids and
/// expansion state keyed by id survives rebuilds.
///
/// Encoding is pipe separated with every component percent-encoded, so
/// names containing `|` still round-trip through `Display`/`FromStr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Section {
        section: SectionKind,
    },

    // Attached databases
    Database {
        source_id: Uuid,
    },
    Schema {
        source_id: Uuid,
        schema: String,
    },
    /// Tables and views share this shape.
    Table {
        source_id: Uuid,
        schema: String,
        table: String,
    },
    Column {
        source_id: Uuid,
        schema: String,
        table: String,
        column: String,
    },

    // Files
    File {
        source_id: Uuid,
    },
    FileColumn {
        source_id: Uuid,
        column: String,
    },
    Sheet {
        source_id: Uuid,
        sheet: String,
    },
    SheetColumn {
        source_id: Uuid,
        sheet: String,
        column: String,
    },
    RemoteHost {
        host: String,
    },
    RemoteFolder {
        host: String,
        path: String,
    },

    // Session tables live in the engine's default catalog
    SessionTable {
        schema: String,
        table: String,
    },
    SessionColumn {
        schema: String,
        table: String,
        column: String,
    },

    // Cloud
    Connection {
        source_id: Uuid,
    },
    Project {
        source_id: Uuid,
        project: String,
    },
    Dataset {
        source_id: Uuid,
        project: String,
        dataset: String,
    },
    CloudTable {
        source_id: Uuid,
        project: String,
        dataset: String,
        table: String,
    },
    CloudColumn {
        source_id: Uuid,
        project: String,
        dataset: String,
        table: String,
        column: String,
    },
}

impl NodeId {
    /// Display kind implied by the id. Views report `Table`; the node itself
    /// carries the finer kind.
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Section { .. } => NodeKind::Section,
            Self::Database { .. } => NodeKind::Database,
            Self::Schema { .. } => NodeKind::Schema,
            Self::Table { .. } | Self::SessionTable { .. } | Self::CloudTable { .. } => {
                NodeKind::Table
            }
            Self::Sheet { .. } => NodeKind::Table,
            Self::Column { .. }
            | Self::FileColumn { .. }
            | Self::SheetColumn { .. }
            | Self::SessionColumn { .. }
            | Self::CloudColumn { .. } => NodeKind::Column,
            Self::File { .. } => NodeKind::File,
            Self::RemoteHost { .. } | Self::RemoteFolder { .. } => NodeKind::Folder,
            Self::Connection { .. } => NodeKind::Connection,
            Self::Project { .. } => NodeKind::Project,
            Self::Dataset { .. } => NodeKind::Dataset,
        }
    }

    /// The catalog entity this node belongs to, if any.
    pub fn source_id(&self) -> Option<Uuid> {
        match self {
            Self::Database { source_id }
            | Self::Schema { source_id, .. }
            | Self::Table { source_id, .. }
            | Self::Column { source_id, .. }
            | Self::File { source_id }
            | Self::FileColumn { source_id, .. }
            | Self::Sheet { source_id, .. }
            | Self::SheetColumn { source_id, .. }
            | Self::Connection { source_id }
            | Self::Project { source_id, .. }
            | Self::Dataset { source_id, .. }
            | Self::CloudTable { source_id, .. }
            | Self::CloudColumn { source_id, .. } => Some(*source_id),
            Self::Section { .. }
            | Self::RemoteHost { .. }
            | Self::RemoteFolder { .. }
            | Self::SessionTable { .. }
            | Self::SessionColumn { .. } => None,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Self::Section { .. } => P_SECTION,
            Self::Database { .. } => P_DATABASE,
            Self::Schema { .. } => P_SCHEMA,
            Self::Table { .. } => P_TABLE,
            Self::Column { .. } => P_COLUMN,
            Self::File { .. } => P_FILE,
            Self::FileColumn { .. } => P_FILE_COLUMN,
            Self::Sheet { .. } => P_SHEET,
            Self::SheetColumn { .. } => P_SHEET_COLUMN,
            Self::RemoteHost { .. } => P_REMOTE_HOST,
            Self::RemoteFolder { .. } => P_REMOTE_FOLDER,
            Self::SessionTable { .. } => P_SESSION_TABLE,
            Self::SessionColumn { .. } => P_SESSION_COLUMN,
            Self::Connection { .. } => P_CONNECTION,
            Self::Project { .. } => P_PROJECT,
            Self::Dataset { .. } => P_DATASET,
            Self::CloudTable { .. } => P_CLOUD_TABLE,
            Self::CloudColumn { .. } => P_CLOUD_COLUMN,
        }
    }

    fn components(&self) -> Vec<String> {
        match self {
            Self::Section { section } => vec![section.as_str().to_string()],
            Self::Database { source_id } | Self::File { source_id } | Self::Connection { source_id } => {
                vec![source_id.to_string()]
            }
            Self::Schema { source_id, schema } => vec![source_id.to_string(), schema.clone()],
            Self::Table {
                source_id,
                schema,
                table,
            } => vec![source_id.to_string(), schema.clone(), table.clone()],
            Self::Column {
                source_id,
                schema,
                table,
                column,
            } => vec![
                source_id.to_string(),
                schema.clone(),
                table.clone(),
                column.clone(),
            ],
            Self::FileColumn { source_id, column } => {
                vec![source_id.to_string(), column.clone()]
            }
            Self::Sheet { source_id, sheet } => vec![source_id.to_string(), sheet.clone()],
            Self::SheetColumn {
                source_id,
                sheet,
                column,
            } => vec![source_id.to_string(), sheet.clone(), column.clone()],
            Self::RemoteHost { host } => vec![host.clone()],
            Self::RemoteFolder { host, path } => vec![host.clone(), path.clone()],
            Self::SessionTable { schema, table } => vec![schema.clone(), table.clone()],
            Self::SessionColumn {
                schema,
                table,
                column,
            } => vec![schema.clone(), table.clone(), column.clone()],
            Self::Project { source_id, project } => vec![source_id.to_string(), project.clone()],
            Self::Dataset {
                source_id,
                project,
                dataset,
            } => vec![source_id.to_string(), project.clone(), dataset.clone()],
            Self::CloudTable {
                source_id,
                project,
                dataset,
                table,
            } => vec![
                source_id.to_string(),
                project.clone(),
                dataset.clone(),
                table.clone(),
            ],
            Self::CloudColumn {
                source_id,
                project,
                dataset,
                table,
                column,
            } => vec![
                source_id.to_string(),
                project.clone(),
                dataset.clone(),
                table.clone(),
                column.clone(),
            ],
        }
    }
}

const P_SECTION: &str = "SEC";
const P_DATABASE: &str = "DB";
const P_SCHEMA: &str = "S";
const P_TABLE: &str = "T";
const P_COLUMN: &str = "CL";
const P_FILE: &str = "F";
const P_FILE_COLUMN: &str = "FC";
const P_SHEET: &str = "SH";
const P_SHEET_COLUMN: &str = "SC";
const P_REMOTE_HOST: &str = "RH";
const P_REMOTE_FOLDER: &str = "RF";
const P_SESSION_TABLE: &str = "ST";
const P_SESSION_COLUMN: &str = "STC";
const P_CONNECTION: &str = "CN";
const P_PROJECT: &str = "P";
const P_DATASET: &str = "DS";
const P_CLOUD_TABLE: &str = "CT";
const P_CLOUD_COLUMN: &str = "CC";

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())?;
        for component in self.components() {
            write!(f, "|{}", urlencoding::encode(&component))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNodeIdError {
    pub input: String,
}

impl fmt::Display for ParseNodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid node id: {:?}", self.input)
    }
}

impl std::error::Error for ParseNodeIdError {}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNodeIdError {
            input: s.to_string(),
        };

        let mut raw = s.split('|');
        let prefix = raw.next().ok_or_else(err)?;
        let parts = raw
            .map(|part| urlencoding::decode(part).map(|p| p.into_owned()))
            .collect::<Result<Vec<String>, _>>()
            .map_err(|_| err())?;

        let text = |i: usize| parts.get(i).cloned().ok_or_else(err);
        let uuid = |i: usize| {
            parts
                .get(i)
                .and_then(|p| Uuid::parse_str(p).ok())
                .ok_or_else(err)
        };

        let expected = match prefix {
            P_SECTION | P_DATABASE | P_FILE | P_REMOTE_HOST | P_CONNECTION => 1,
            P_SCHEMA | P_FILE_COLUMN | P_SHEET | P_REMOTE_FOLDER | P_SESSION_TABLE | P_PROJECT => 2,
            P_TABLE | P_SHEET_COLUMN | P_SESSION_COLUMN | P_DATASET => 3,
            P_COLUMN | P_CLOUD_TABLE => 4,
            P_CLOUD_COLUMN => 5,
            _ => return Err(err()),
        };
        if parts.len() != expected {
            return Err(err());
        }

        let id = match prefix {
            P_SECTION => Self::Section {
                section: text(0)?.parse().map_err(|_| err())?,
            },
            P_DATABASE => Self::Database { source_id: uuid(0)? },
            P_SCHEMA => Self::Schema {
                source_id: uuid(0)?,
                schema: text(1)?,
            },
            P_TABLE => Self::Table {
                source_id: uuid(0)?,
                schema: text(1)?,
                table: text(2)?,
            },
            P_COLUMN => Self::Column {
                source_id: uuid(0)?,
                schema: text(1)?,
                table: text(2)?,
                column: text(3)?,
            },
            P_FILE => Self::File { source_id: uuid(0)? },
            P_FILE_COLUMN => Self::FileColumn {
                source_id: uuid(0)?,
                column: text(1)?,
            },
            P_SHEET => Self::Sheet {
                source_id: uuid(0)?,
                sheet: text(1)?,
            },
            P_SHEET_COLUMN => Self::SheetColumn {
                source_id: uuid(0)?,
                sheet: text(1)?,
                column: text(2)?,
            },
            P_REMOTE_HOST => Self::RemoteHost { host: text(0)? },
            P_REMOTE_FOLDER => Self::RemoteFolder {
                host: text(0)?,
                path: text(1)?,
            },
            P_SESSION_TABLE => Self::SessionTable {
                schema: text(0)?,
                table: text(1)?,
            },
            P_SESSION_COLUMN => Self::SessionColumn {
                schema: text(0)?,
                table: text(1)?,
                column: text(2)?,
            },
            P_CONNECTION => Self::Connection { source_id: uuid(0)? },
            P_PROJECT => Self::Project {
                source_id: uuid(0)?,
                project: text(1)?,
            },
            P_DATASET => Self::Dataset {
                source_id: uuid(0)?,
                project: text(1)?,
                dataset: text(2)?,
            },
            P_CLOUD_TABLE => Self::CloudTable {
                source_id: uuid(0)?,
                project: text(1)?,
                dataset: text(2)?,
                table: text(3)?,
            },
            P_CLOUD_COLUMN => Self::CloudColumn {
                source_id: uuid(0)?,
                project: text(1)?,
                dataset: text(2)?,
                table: text(3)?,
                column: text(4)?,
            },
            _ => return Err(err()),
        };

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(id: NodeId) {
        let s = id.to_string();
        let parsed: NodeId = s.parse().unwrap_or_else(|e| {
            panic!("Failed to parse {:?}: {}", s, e);
        });
        assert_eq!(id, parsed, "Roundtrip failed for: {}", s);
    }

    #[test]
    fn variants_roundtrip() {
        let uuid = Uuid::parse_str("12345678-1234-1234-1234-123456789abc").unwrap();

        roundtrip(NodeId::Section {
            section: SectionKind::RemoteFiles,
        });
        roundtrip(NodeId::Column {
            source_id: uuid,
            schema: "main".into(),
            table: "orders".into(),
            column: "id".into(),
        });
        roundtrip(NodeId::RemoteFolder {
            host: "data.example.com".into(),
            path: "/exports/2024".into(),
        });
        roundtrip(NodeId::SheetColumn {
            source_id: uuid,
            sheet: "Q1 | draft".into(),
            column: "100%".into(),
        });
        roundtrip(NodeId::CloudColumn {
            source_id: uuid,
            project: "acme-prod".into(),
            dataset: "events".into(),
            table: "clicks".into(),
            column: "ts".into(),
        });
    }

    #[test]
    fn pipes_in_names_are_escaped() {
        let id = NodeId::SessionTable {
            schema: "main".into(),
            table: "a|b".into(),
        };
        assert_eq!(id.to_string(), "ST|main|a%7Cb");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!("".parse::<NodeId>().is_err());
        assert!("DB".parse::<NodeId>().is_err());
        assert!("DB|not-a-uuid".parse::<NodeId>().is_err());
        assert!("ZZ|x".parse::<NodeId>().is_err());
        assert!("ST|main".parse::<NodeId>().is_err());
        assert!("SEC|nowhere".parse::<NodeId>().is_err());
    }

    #[test]
    fn kind_and_source() {
        let uuid = Uuid::new_v4();
        let id = NodeId::Sheet {
            source_id: uuid,
            sheet: "Q1".into(),
        };
        assert_eq!(id.kind(), NodeKind::Table);
        assert_eq!(id.source_id(), Some(uuid));
        assert_eq!(
            NodeId::RemoteHost {
                host: "x".into()
            }
            .source_id(),
            None
        );
    }
}
