use std::collections::{BTreeMap, HashSet};

use datadeck_core::{
    CloudProject, ColumnInfo, DataSourceEntity, ExternalSnapshots, FlatFileSource, SessionSnapshot,
    SheetInfo, SourceKind, SpreadsheetSource, TableInfo, TableKind,
};
use uuid::Uuid;

use crate::badges::{primary_badge, suffix_badges};
use crate::context_menu::{member_actions, source_actions};
use crate::filter::filter_node;
use crate::format::{compact_count, format_bytes, rows_label};
use crate::{NodeId, NodeKind, Projection, Section, SectionKind, TreeNode};

/// Session tables are created in the engine's default schema.
pub const SESSION_SCHEMA: &str = "main";

/// Projects catalog entities and external snapshots into display sections.
///
/// Pure: equal inputs give equal output, ids included. With a non-blank
/// `query` only matching nodes and their ancestors survive, and the
/// ancestors are listed in `auto_expand`.
pub fn build_sections(
    entities: &[DataSourceEntity],
    snapshots: &ExternalSnapshots,
    query: &str,
) -> Projection {
    let sections = project_sections(entities, snapshots);

    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Projection {
            sections,
            auto_expand: HashSet::new(),
        };
    }

    filter_sections(sections, &query)
}

fn project_sections(entities: &[DataSourceEntity], snapshots: &ExternalSnapshots) -> Vec<Section> {
    let mut sorted: Vec<&DataSourceEntity> = entities.iter().collect();
    sorted.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut databases = Vec::new();
    let mut local_files = Vec::new();
    let mut remote_files = Vec::new();
    let mut connections = Vec::new();

    for entity in sorted {
        match &entity.kind {
            SourceKind::Database(_) => databases.push(database_node(entity)),
            SourceKind::FlatFile(_) | SourceKind::Spreadsheet(_) if entity.is_remote() => {
                remote_files.push(entity)
            }
            SourceKind::FlatFile(_) | SourceKind::Spreadsheet(_) => {
                local_files.push(entity)
            }
            SourceKind::Cloud(_) => connections.push(connection_node(entity, snapshots)),
        }
    }

    let mut sections = Vec::new();

    if let Some(session) = &snapshots.session
        && !session.tables.is_empty()
    {
        let badge = compact_count(session.tables.len() as u64);
        sections.push(section(SectionKind::Session, Some(badge), session_nodes(session)));
    }

    if !databases.is_empty() {
        let badge = compact_count(databases.len() as u64);
        sections.push(section(SectionKind::AttachedDatabases, Some(badge), databases));
    }

    if !local_files.is_empty() {
        let total: u64 = local_files.iter().filter_map(|e| e.size_bytes).sum();
        let badge = if total > 0 {
            format_bytes(total)
        } else {
            compact_count(local_files.len() as u64)
        };
        let nodes = local_files.into_iter().map(file_node).collect();
        sections.push(section(SectionKind::LocalFiles, Some(badge), nodes));
    }

    if !remote_files.is_empty() {
        let badge = compact_count(remote_files.len() as u64);
        sections.push(section(
            SectionKind::RemoteFiles,
            Some(badge),
            remote_nodes(&remote_files),
        ));
    }

    if !connections.is_empty() {
        let badge = compact_count(connections.len() as u64);
        sections.push(section(SectionKind::Cloud, Some(badge), connections));
    }

    sections
}

fn section(kind: SectionKind, badge: Option<String>, nodes: Vec<TreeNode>) -> Section {
    Section {
        kind,
        label: kind.label().to_string(),
        collapsed: false,
        badge,
        nodes,
    }
}

fn filter_sections(sections: Vec<Section>, query_lower: &str) -> Projection {
    let mut auto_expand = HashSet::new();
    let mut kept = Vec::new();

    for section in sections {
        let mut nodes = Vec::new();
        for node in &section.nodes {
            if let Some((filtered, expand)) = filter_node(node, query_lower) {
                nodes.push(filtered);
                auto_expand.extend(expand);
            }
        }

        if nodes.is_empty() {
            continue;
        }
        auto_expand.insert(section.id());
        kept.push(Section { nodes, ..section });
    }

    Projection {
        sections: kept,
        auto_expand,
    }
}

/// Badges, actions and the loading hint shared by every source root.
fn source_root(entity: &DataSourceEntity, id: NodeId, kind: NodeKind) -> TreeNode {
    let mut node = TreeNode::new(id, kind, entity.name.clone());
    node.badge = primary_badge(entity);
    node.suffixes = suffix_badges(entity);
    node.actions = source_actions(kind, entity);
    if entity.introspecting {
        node.detail = Some("loading…".to_string());
    }
    node
}

fn database_node(entity: &DataSourceEntity) -> TreeNode {
    let mut node = source_root(
        entity,
        NodeId::Database {
            source_id: entity.id,
        },
        NodeKind::Database,
    );

    let SourceKind::Database(db) = &entity.kind else {
        return node;
    };

    node.children = db
        .schemas
        .iter()
        .map(|schema| {
            let tables = schema
                .tables
                .iter()
                .map(|table| {
                    let id = NodeId::Table {
                        source_id: entity.id,
                        schema: schema.name.clone(),
                        table: table.name.clone(),
                    };
                    table_node(id, table, false, |column| NodeId::Column {
                        source_id: entity.id,
                        schema: schema.name.clone(),
                        table: table.name.clone(),
                        column: column.to_string(),
                    })
                })
                .collect();

            let mut schema_node = TreeNode::new(
                NodeId::Schema {
                    source_id: entity.id,
                    schema: schema.name.clone(),
                },
                NodeKind::Schema,
                schema.name.clone(),
            )
            .with_detail(count_label(schema.tables.len(), "table", "tables"))
            .with_children(tables);
            schema_node.actions = member_actions(NodeKind::Schema, false);
            schema_node
        })
        .collect();

    if !entity.introspecting && node.detail.is_none() {
        let tables: usize = db.schemas.iter().map(|s| s.tables.len()).sum();
        node.detail = Some(count_label(tables, "table", "tables"));
    }

    node
}

fn table_node(
    id: NodeId,
    table: &TableInfo,
    session: bool,
    column_id: impl Fn(&str) -> NodeId,
) -> TreeNode {
    let kind = match table.kind {
        TableKind::Table => NodeKind::Table,
        TableKind::View => NodeKind::View,
    };

    let mut node = TreeNode::new(id, kind, table.name.clone())
        .with_detail(rows_label(table.row_count))
        .with_children(column_nodes(&table.columns, column_id));
    node.actions = member_actions(kind, session);
    node
}

fn column_nodes(columns: &[ColumnInfo], id: impl Fn(&str) -> NodeId) -> Vec<TreeNode> {
    columns
        .iter()
        .map(|column| {
            let mut node = TreeNode::new(id(&column.name), NodeKind::Column, column.name.clone())
                .with_detail(column.type_name.clone());
            node.actions = member_actions(NodeKind::Column, false);
            node
        })
        .collect()
}

fn file_node(entity: &DataSourceEntity) -> TreeNode {
    let mut node = source_root(
        entity,
        NodeId::File {
            source_id: entity.id,
        },
        NodeKind::File,
    );

    match &entity.kind {
        SourceKind::FlatFile(file) => {
            node.children = column_nodes(&file.columns, |column| NodeId::FileColumn {
                source_id: entity.id,
                column: column.to_string(),
            });
            if node.detail.is_none() {
                node.detail = Some(flat_file_detail(file, entity.size_bytes));
            }
        }
        SourceKind::Spreadsheet(spreadsheet) => {
            node.children = spreadsheet_children(entity.id, spreadsheet);
            if node.detail.is_none() {
                node.detail = Some(count_label(spreadsheet.sheets.len(), "sheet", "sheets"));
            }
        }
        _ => {}
    }

    node
}

fn flat_file_detail(file: &FlatFileSource, size: Option<u64>) -> String {
    let mut parts = vec![file.format.label().to_string()];
    if let Some(rows) = file.row_count {
        parts.push(rows_label(rows));
    }
    if let Some(size) = size {
        parts.push(format_bytes(size));
    }
    parts.join(" · ")
}

/// Several sheets get their own nodes; a single sheet shows its columns
/// directly under the file.
fn spreadsheet_children(source_id: Uuid, spreadsheet: &SpreadsheetSource) -> Vec<TreeNode> {
    let sheet_columns = |sheet: &SheetInfo| {
        column_nodes(sheet.columns.as_deref().unwrap_or_default(), |column| {
            NodeId::SheetColumn {
                source_id,
                sheet: sheet.name.clone(),
                column: column.to_string(),
            }
        })
    };

    match spreadsheet.sheets.as_slice() {
        [] => Vec::new(),
        [only] => sheet_columns(only),
        sheets => sheets
            .iter()
            .map(|sheet| {
                let mut node = TreeNode::new(
                    NodeId::Sheet {
                        source_id,
                        sheet: sheet.name.clone(),
                    },
                    NodeKind::Table,
                    sheet.name.clone(),
                )
                .with_children(sheet_columns(sheet));
                node.detail = sheet_detail(sheet);
                node.actions = vec![crate::NodeAction::Preview, crate::NodeAction::InsertName];
                node
            })
            .collect(),
    }
}

fn sheet_detail(sheet: &SheetInfo) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(columns) = &sheet.columns {
        parts.push(count_label(columns.len(), "column", "columns"));
    }
    if let Some(rows) = sheet.row_count {
        parts.push(rows_label(rows));
    }
    (!parts.is_empty()).then(|| parts.join(" · "))
}

/// Groups remote files by host, then by directory.
fn remote_nodes(entities: &[&DataSourceEntity]) -> Vec<TreeNode> {
    let mut hosts: BTreeMap<String, BTreeMap<String, Vec<TreeNode>>> = BTreeMap::new();

    for entity in entities {
        let (host, dir) = entity
            .location
            .reference()
            .map(split_remote)
            .unwrap_or_else(|| ("unknown".to_string(), String::new()));
        hosts
            .entry(host)
            .or_default()
            .entry(dir)
            .or_default()
            .push(file_node(entity));
    }

    hosts
        .into_iter()
        .map(|(host, dirs)| {
            let file_count: usize = dirs.values().map(Vec::len).sum();
            let mut children = Vec::new();
            for (dir, files) in dirs {
                if dir.is_empty() {
                    children.extend(files);
                    continue;
                }
                children.push(
                    TreeNode::new(
                        NodeId::RemoteFolder {
                            host: host.clone(),
                            path: dir.clone(),
                        },
                        NodeKind::Folder,
                        dir.trim_start_matches('/').to_string(),
                    )
                    .with_detail(count_label(files.len(), "file", "files"))
                    .with_children(files),
                );
            }

            TreeNode::new(
                NodeId::RemoteHost { host: host.clone() },
                NodeKind::Folder,
                host,
            )
            .with_detail(count_label(file_count, "file", "files"))
            .with_children(children)
        })
        .collect()
}

/// `https://host/a/b/file.csv` → `("host", "/a/b")`. Files at the root get
/// an empty directory.
fn split_remote(reference: &str) -> (String, String) {
    match url::Url::parse(reference) {
        Ok(url) => {
            let host = url
                .host_str()
                .map(str::to_string)
                .unwrap_or_else(|| url.scheme().to_string());
            let path = url.path();
            let dir = match path.rfind('/') {
                Some(idx) if idx > 0 => path[..idx].to_string(),
                _ => String::new(),
            };
            (host, dir)
        }
        Err(_) => ("unknown".to_string(), String::new()),
    }
}

fn session_nodes(session: &SessionSnapshot) -> Vec<TreeNode> {
    let mut tables: Vec<&TableInfo> = session.tables.iter().collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));

    tables
        .into_iter()
        .map(|table| {
            let id = NodeId::SessionTable {
                schema: SESSION_SCHEMA.to_string(),
                table: table.name.clone(),
            };
            table_node(id, table, true, |column| NodeId::SessionColumn {
                schema: SESSION_SCHEMA.to_string(),
                table: table.name.clone(),
                column: column.to_string(),
            })
        })
        .collect()
}

fn connection_node(entity: &DataSourceEntity, snapshots: &ExternalSnapshots) -> TreeNode {
    let mut node = source_root(
        entity,
        NodeId::Connection {
            source_id: entity.id,
        },
        NodeKind::Connection,
    );

    let projects: Vec<CloudProject> = match (snapshots.cloud_for(entity.id), &entity.kind) {
        (Some(snapshot), _) => snapshot.projects.clone(),
        (None, SourceKind::Cloud(cloud)) => cloud
            .project_ids
            .iter()
            .map(|id| CloudProject {
                id: id.clone(),
                datasets: Vec::new(),
            })
            .collect(),
        (None, _) => Vec::new(),
    };

    node.detail = Some(count_label(projects.len(), "project", "projects"));
    node.children = projects
        .iter()
        .map(|project| project_node(entity.id, project))
        .collect();
    node
}

fn project_node(source_id: Uuid, project: &CloudProject) -> TreeNode {
    let datasets = project
        .datasets
        .iter()
        .map(|dataset| {
            let tables = dataset
                .tables
                .iter()
                .map(|table| {
                    let id = NodeId::CloudTable {
                        source_id,
                        project: project.id.clone(),
                        dataset: dataset.name.clone(),
                        table: table.name.clone(),
                    };
                    table_node(id, table, false, |column| NodeId::CloudColumn {
                        source_id,
                        project: project.id.clone(),
                        dataset: dataset.name.clone(),
                        table: table.name.clone(),
                        column: column.to_string(),
                    })
                })
                .collect();

            let mut node = TreeNode::new(
                NodeId::Dataset {
                    source_id,
                    project: project.id.clone(),
                    dataset: dataset.name.clone(),
                },
                NodeKind::Dataset,
                dataset.name.clone(),
            )
            .with_detail(count_label(dataset.tables.len(), "table", "tables"))
            .with_children(tables);
            node.actions = member_actions(NodeKind::Dataset, false);
            node
        })
        .collect();

    let mut node = TreeNode::new(
        NodeId::Project {
            source_id,
            project: project.id.clone(),
        },
        NodeKind::Project,
        project.id.clone(),
    )
    .with_children(datasets);
    node.actions = member_actions(NodeKind::Project, false);
    node
}

fn count_label(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", compact_count(n as u64), plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_urls_split_into_host_and_directory() {
        assert_eq!(
            split_remote("https://data.example.com/exports/2024/events.parquet"),
            ("data.example.com".to_string(), "/exports/2024".to_string())
        );
        assert_eq!(
            split_remote("https://cdn.example.com/top.csv"),
            ("cdn.example.com".to_string(), String::new())
        );
        assert_eq!(
            split_remote("not a url"),
            ("unknown".to_string(), String::new())
        );
    }

    #[test]
    fn sheet_detail_shows_what_has_been_loaded() {
        let mut sheet = SheetInfo::new("Q1", 0);
        assert_eq!(sheet_detail(&sheet), None);

        sheet.columns = Some(vec![
            datadeck_core::ColumnInfo::new("region", "VARCHAR", true),
            datadeck_core::ColumnInfo::new("spend", "DOUBLE", true),
        ]);
        assert_eq!(sheet_detail(&sheet).as_deref(), Some("2 columns"));

        sheet.row_count = Some(4_200);
        assert_eq!(sheet_detail(&sheet).as_deref(), Some("2 columns · 4.2K rows"));
    }

    #[test]
    fn count_labels_pluralize() {
        assert_eq!(count_label(1, "table", "tables"), "1 table");
        assert_eq!(count_label(0, "table", "tables"), "0 tables");
        assert_eq!(count_label(2500, "file", "files"), "2.5K files");
    }
}
