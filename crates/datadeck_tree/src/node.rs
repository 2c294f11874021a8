use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use datadeck_core::SourceId;
use serde::{Deserialize, Serialize};

use crate::{NodeAction, NodeId, PrimaryBadge, SuffixBadge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Section,
    Database,
    Schema,
    Table,
    View,
    Column,
    File,
    Folder,
    Connection,
    Project,
    Dataset,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::File => "file",
            Self::Folder => "folder",
            Self::Connection => "connection",
            Self::Project => "project",
            Self::Dataset => "dataset",
        }
    }
}

/// Top-level groups, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKind {
    Session,
    AttachedDatabases,
    LocalFiles,
    RemoteFiles,
    Cloud,
}

impl SectionKind {
    pub const ALL: [SectionKind; 5] = [
        Self::Session,
        Self::AttachedDatabases,
        Self::LocalFiles,
        Self::RemoteFiles,
        Self::Cloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::AttachedDatabases => "databases",
            Self::LocalFiles => "local",
            Self::RemoteFiles => "remote",
            Self::Cloud => "cloud",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Session => "Session tables",
            Self::AttachedDatabases => "Attached databases",
            Self::LocalFiles => "Local files",
            Self::RemoteFiles => "Remote files",
            Self::Cloud => "Cloud",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown section {:?}", s))
    }
}

/// One display node. Rebuilt wholesale on every projection; never edited in
/// place afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    /// Secondary text: a column type, a row count, a size.
    pub detail: Option<String>,
    pub badge: Option<PrimaryBadge>,
    /// Highest priority first.
    pub suffixes: Vec<SuffixBadge>,
    pub children: Vec<TreeNode>,
    /// Expansion used when nothing overrides it.
    pub expanded: bool,
    pub source: Option<SourceId>,
    pub actions: Vec<NodeAction>,
}

impl TreeNode {
    pub fn new(id: NodeId, kind: NodeKind, label: impl Into<String>) -> Self {
        let source = id.source_id();
        Self {
            id,
            kind,
            label: label.into(),
            detail: None,
            badge: None,
            suffixes: Vec::new(),
            children: Vec::new(),
            expanded: false,
            source,
            actions: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Pre-order search by id.
    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        if &self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub label: String,
    pub collapsed: bool,
    /// Aggregate count or size.
    pub badge: Option<String>,
    pub nodes: Vec<TreeNode>,
}

impl Section {
    pub fn id(&self) -> NodeId {
        NodeId::Section { section: self.kind }
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        self.nodes.iter().find_map(|n| n.find(id))
    }
}

/// Output of [`crate::build_sections`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub sections: Vec<Section>,
    /// Nodes (and sections) that must be open so search matches are visible.
    pub auto_expand: HashSet<NodeId>,
}

impl Projection {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn find(&self, id: &NodeId) -> Option<&TreeNode> {
        self.sections.iter().find_map(|s| s.find(id))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
