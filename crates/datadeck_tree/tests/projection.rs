use datadeck_core::{
    ColumnInfo, DataSourceEntity, ExternalSnapshots, FileFormat, SchemaInfo, SessionSnapshot,
    SourceDraft, SourceKind, SourceLocation, TableInfo, TableKind,
};
use datadeck_test_support::fixtures::{entity, local_csv, local_database, remote_parquet};
use datadeck_tree::{
    ExpansionState, NodeId, NodeKind, PrimaryBadge, Projection, SectionKind, SuffixBadge,
    TreeNode, build_sections, flatten, label_matches,
};

fn columns(names: &[&str]) -> Vec<ColumnInfo> {
    names
        .iter()
        .map(|n| ColumnInfo::new(*n, "VARCHAR", true))
        .collect()
}

fn attached_database(path: &str, alias: &str, schemas: Vec<SchemaInfo>) -> DataSourceEntity {
    let mut entity = entity(local_database(path));
    if let SourceKind::Database(db) = &mut entity.kind {
        db.attached = true;
        db.attached_alias = Some(alias.to_string());
        db.schemas = schemas;
    }
    entity
}

fn sales_database() -> DataSourceEntity {
    attached_database(
        "/data/sales.duckdb",
        "sales",
        vec![SchemaInfo::new(
            "main",
            vec![
                TableInfo::new(
                    "orders",
                    columns(&["id", "placed_at", "status", "total", "region"]),
                )
                .with_row_count(1_234),
            ],
        )],
    )
}

fn labels(nodes: &[TreeNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.label.as_str()).collect()
}

#[test]
fn attached_database_projects_schema_table_and_columns() {
    let projection = build_sections(&[sales_database()], &ExternalSnapshots::default(), "");

    assert_eq!(projection.sections.len(), 1);
    let section = &projection.sections[0];
    assert_eq!(section.kind, SectionKind::AttachedDatabases);
    assert_eq!(section.badge.as_deref(), Some("1"));

    let database = &section.nodes[0];
    assert_eq!(database.kind, NodeKind::Database);
    assert_eq!(database.label, "sales.duckdb");
    assert_eq!(database.detail.as_deref(), Some("1 table"));
    assert_eq!(
        database.suffixes,
        vec![SuffixBadge::Attached, SuffixBadge::ReadOnly]
    );
    assert_eq!(database.badge, None);

    let schema = &database.children[0];
    assert_eq!(database.children.len(), 1);
    assert_eq!(schema.kind, NodeKind::Schema);
    assert_eq!(schema.label, "main");

    let table = &schema.children[0];
    assert_eq!(schema.children.len(), 1);
    assert_eq!(table.kind, NodeKind::Table);
    assert_eq!(table.label, "orders");
    assert_eq!(table.detail.as_deref(), Some("1.2K rows"));
    assert_eq!(table.children.len(), 5);
    assert!(table.children.iter().all(|c| c.kind == NodeKind::Column));
    assert_eq!(table.children[1].detail.as_deref(), Some("VARCHAR"));
}

#[test]
fn projection_is_deterministic() {
    let entities = vec![
        sales_database(),
        entity(local_csv("/data/b.csv")),
        entity(local_csv("/data/a.csv")),
        entity(remote_parquet("https://data.example.com/x/events.parquet")),
    ];
    let snapshots = ExternalSnapshots::default();

    let first = build_sections(&entities, &snapshots, "");
    let second = build_sections(&entities, &snapshots, "");
    assert_eq!(first, second);

    let mut reversed = entities.clone();
    reversed.reverse();
    assert_eq!(build_sections(&reversed, &snapshots, ""), first);

    let local = first.section(SectionKind::LocalFiles).expect("local files");
    assert_eq!(labels(&local.nodes), vec!["a.csv", "b.csv"]);
}

#[test]
fn sections_follow_fixed_order_and_skip_empty_groups() {
    let entities = vec![
        entity(SourceDraft::cloud("warehouse", vec!["analytics".to_string()])),
        entity(local_csv("/data/a.csv").with_size(1536)),
        sales_database(),
    ];
    let snapshots = ExternalSnapshots {
        session: Some(SessionSnapshot {
            tables: vec![TableInfo::new("scratch", columns(&["x"]))],
        }),
        cloud: Vec::new(),
    };

    let projection = build_sections(&entities, &snapshots, "");
    let kinds: Vec<SectionKind> = projection.sections.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            SectionKind::Session,
            SectionKind::AttachedDatabases,
            SectionKind::LocalFiles,
            SectionKind::Cloud,
        ]
    );

    let local = projection.section(SectionKind::LocalFiles).expect("local");
    assert_eq!(local.badge.as_deref(), Some("1.5 KB"));

    let session = projection.section(SectionKind::Session).expect("session");
    assert_eq!(
        session.nodes[0].id,
        NodeId::SessionTable {
            schema: "main".to_string(),
            table: "scratch".to_string(),
        }
    );

    let cloud = projection.section(SectionKind::Cloud).expect("cloud");
    assert_eq!(labels(&cloud.nodes[0].children), vec!["analytics"]);
}

#[test]
fn remote_files_group_by_host_then_folder() {
    let entities = vec![
        entity(remote_parquet("https://data.example.com/exports/2024/events.parquet")),
        entity(remote_parquet("https://data.example.com/exports/2024/users.parquet")),
        entity(SourceDraft::flat_file(
            "top.csv",
            FileFormat::Csv,
            SourceLocation::remote("https://cdn.example.com/top.csv"),
        )),
    ];

    let projection = build_sections(&entities, &ExternalSnapshots::default(), "");
    let remote = projection.section(SectionKind::RemoteFiles).expect("remote");
    assert_eq!(remote.badge.as_deref(), Some("3"));
    assert_eq!(labels(&remote.nodes), vec!["cdn.example.com", "data.example.com"]);

    let cdn = &remote.nodes[0];
    assert_eq!(labels(&cdn.children), vec!["top.csv"]);
    assert_eq!(cdn.children[0].badge, Some(PrimaryBadge::Remote));

    let data = &remote.nodes[1];
    assert_eq!(data.detail.as_deref(), Some("2 files"));
    let folder = &data.children[0];
    assert_eq!(folder.kind, NodeKind::Folder);
    assert_eq!(folder.label, "exports/2024");
    assert_eq!(labels(&folder.children), vec!["events.parquet", "users.parquet"]);
}

#[test]
fn introspection_errors_take_the_primary_badge() {
    let mut broken = entity(remote_parquet("https://data.example.com/gone.parquet"));
    broken.introspection_error = Some("HTTP 404".to_string());

    let projection = build_sections(&[broken], &ExternalSnapshots::default(), "");
    let remote = projection.section(SectionKind::RemoteFiles).expect("remote");
    assert_eq!(
        remote.nodes[0].children[0].badge,
        Some(PrimaryBadge::Error("HTTP 404".to_string()))
    );
}

fn search_catalog() -> Vec<DataSourceEntity> {
    let mut orders_csv = entity(local_csv("/data/orders_2024.csv"));
    if let SourceKind::FlatFile(file) = &mut orders_csv.kind {
        file.columns = columns(&["id", "amount"]);
    }

    vec![
        attached_database(
            "/data/crm.duckdb",
            "crm",
            vec![
                SchemaInfo::new(
                    "main",
                    vec![
                        TableInfo::new("customers", columns(&["id", "name"])),
                        TableInfo::new("orders", columns(&["id", "status"])),
                    ],
                ),
                SchemaInfo::new(
                    "reporting",
                    vec![
                        TableInfo::new("daily", columns(&["day", "revenue"]))
                            .with_kind(TableKind::View),
                    ],
                ),
            ],
        ),
        orders_csv,
        entity(remote_parquet("https://data.example.com/exports/events.parquet")),
    ]
}

/// Every surviving node matches itself or has a surviving child, and every
/// node that has surviving children is auto-expanded.
fn assert_search_property(projection: &Projection, query: &str) {
    fn check(node: &TreeNode, query: &str, projection: &Projection) {
        assert!(
            label_matches(&node.label, query) || node.has_children(),
            "{} survived without a match",
            node.id
        );
        if node.has_children() {
            assert!(
                projection.auto_expand.contains(&node.id),
                "{} hides a match",
                node.id
            );
        }
        for child in &node.children {
            check(child, query, projection);
        }
    }

    for section in &projection.sections {
        assert!(projection.auto_expand.contains(&section.id()));
        for node in &section.nodes {
            check(node, query, projection);
        }
    }
}

#[test]
fn search_keeps_matches_and_expands_their_ancestors() {
    let entities = search_catalog();
    let projection = build_sections(&entities, &ExternalSnapshots::default(), "  ORDER ");
    assert_search_property(&projection, "order");

    let kinds: Vec<SectionKind> = projection.sections.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![SectionKind::AttachedDatabases, SectionKind::LocalFiles]
    );

    let database = &projection.sections[0].nodes[0];
    assert_eq!(labels(&database.children), vec!["main"]);
    assert_eq!(labels(&database.children[0].children), vec!["orders"]);
    assert!(database.children[0].children[0].children.is_empty());

    let mut expansion = ExpansionState::new();
    expansion.set_query("order");
    let rows = flatten(&projection, &expansion);
    let visible: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        visible,
        vec![
            "Attached databases",
            "crm.duckdb",
            "main",
            "orders",
            "Local files",
            "orders_2024.csv",
        ]
    );
}

#[test]
fn matching_table_hides_columns_that_do_not_match() {
    let entities = vec![attached_database(
        "/data/shop.duckdb",
        "shop",
        vec![SchemaInfo::new(
            "main",
            vec![TableInfo::new("orders", columns(&["id", "status"]))],
        )],
    )];

    let projection = build_sections(&entities, &ExternalSnapshots::default(), "order");
    assert_search_property(&projection, "order");

    let orders = NodeId::Table {
        source_id: entities[0].id,
        schema: "main".to_string(),
        table: "orders".to_string(),
    };
    let node = projection.find(&orders).expect("orders survives");
    assert!(node.children.is_empty());
    assert!(!projection.auto_expand.contains(&orders));

    let mut expansion = ExpansionState::new();
    expansion.set_query("order");
    let visible: Vec<String> = flatten(&projection, &expansion)
        .into_iter()
        .map(|r| r.label)
        .collect();
    assert_eq!(
        visible,
        vec!["Attached databases", "shop.duckdb", "main", "orders"]
    );
}

#[test]
fn search_reaches_columns_and_views() {
    let entities = search_catalog();

    for query in ["order", "id", "revenue", "amount", "status", "events", "zzz"] {
        let projection = build_sections(&entities, &ExternalSnapshots::default(), query);
        assert_search_property(&projection, query);
    }

    let projection = build_sections(&entities, &ExternalSnapshots::default(), "revenue");
    let daily = NodeId::Table {
        source_id: entities[0].id,
        schema: "reporting".to_string(),
        table: "daily".to_string(),
    };
    assert!(projection.auto_expand.contains(&daily));
    assert_eq!(projection.find(&daily).map(|n| n.kind), Some(NodeKind::View));

    assert!(build_sections(&entities, &ExternalSnapshots::default(), "zzz").is_empty());
}

#[test]
fn blank_query_returns_everything_collapsed() {
    let entities = search_catalog();
    let projection = build_sections(&entities, &ExternalSnapshots::default(), "   ");
    assert!(projection.auto_expand.is_empty());
    assert_eq!(projection.sections.len(), 3);

    let rows = flatten(&projection, &ExpansionState::new());
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().filter(|r| !r.is_section()).all(|r| !r.expanded));
}
