use datadeck_core::SourceId;
use datadeck_core::sanitize::drop_table_statement;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{NodeId, NodeKind, TreeNode};

/// Platform drag type for tree nodes.
pub const DRAG_MIME: &str = "application/x-datadeck-node";

/// Minimal description of a dragged node. Carries enough to act on the
/// drop without looking the node up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragPayload {
    pub kind: NodeKind,
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub label: String,
}

impl DragPayload {
    pub fn node_id(&self) -> Result<NodeId, DragPayloadError> {
        self.node_id
            .parse()
            .map_err(|_| DragPayloadError::InvalidNodeId(self.node_id.clone()))
    }
}

#[derive(Debug, Error)]
pub enum DragPayloadError {
    #[error("unexpected drag type {0:?}")]
    WrongMime(String),

    #[error("malformed drag payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("drag payload has an invalid node id {0:?}")]
    InvalidNodeId(String),
}

/// Builds the payload for a drag starting on `node`. Section headers are
/// not draggable.
pub fn drag_payload(node: &TreeNode) -> Option<DragPayload> {
    if node.kind == NodeKind::Section {
        return None;
    }

    let (schema, table) = match &node.id {
        NodeId::Table { schema, table, .. }
        | NodeId::Column { schema, table, .. }
        | NodeId::SessionTable { schema, table }
        | NodeId::SessionColumn { schema, table, .. } => {
            (Some(schema.clone()), Some(table.clone()))
        }
        NodeId::Schema { schema, .. } => (Some(schema.clone()), None),
        NodeId::Sheet { sheet, .. } | NodeId::SheetColumn { sheet, .. } => {
            (None, Some(sheet.clone()))
        }
        NodeId::Dataset { dataset, .. } => (Some(dataset.clone()), None),
        NodeId::CloudTable { dataset, table, .. } | NodeId::CloudColumn { dataset, table, .. } => {
            (Some(dataset.clone()), Some(table.clone()))
        }
        _ => (None, None),
    };

    Some(DragPayload {
        kind: node.kind,
        node_id: node.id.to_string(),
        source_id: node.source,
        schema,
        table,
        label: node.label.clone(),
    })
}

pub fn encode_payload(payload: &DragPayload) -> Result<String, DragPayloadError> {
    Ok(serde_json::to_string(payload)?)
}

pub fn decode_payload(mime: &str, data: &str) -> Result<DragPayload, DragPayloadError> {
    if mime != DRAG_MIME {
        return Err(DragPayloadError::WrongMime(mime.to_string()));
    }

    let payload: DragPayload = serde_json::from_str(data)?;
    payload.node_id()?;
    Ok(payload)
}

/// What a deletion drop target does with a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionAction {
    RemoveSource {
        id: SourceId,
    },
    DropSessionTable {
        schema: String,
        table: String,
        statement: String,
    },
}

/// Whole sources are removed from the catalog and session tables are
/// dropped. Anything else is not deletable by drop.
pub fn deletion_action(payload: &DragPayload) -> Option<DeletionAction> {
    match payload.node_id().ok()? {
        NodeId::Database { source_id }
        | NodeId::File { source_id }
        | NodeId::Connection { source_id } => Some(DeletionAction::RemoveSource { id: source_id }),
        NodeId::SessionTable { schema, table } => {
            let statement = drop_table_statement(Some(&schema), &table);
            Some(DeletionAction::DropSessionTable {
                schema,
                table,
                statement,
            })
        }
        _ => None,
    }
}
