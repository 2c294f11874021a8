use datadeck_core::DataSourceEntity;

use crate::NodeKind;

/// Gap kept between a menu and the viewport edge.
pub const MENU_MARGIN: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAction {
    /// Open a preview query over the table or file.
    Preview,
    /// Insert the node's qualified name into the editor.
    InsertName,
    CopyName,
    /// Re-run introspection.
    Refresh,
    /// Rebind a local file whose handle was lost.
    Restore,
    Remove,
    DropTable,
}

impl NodeAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Preview => "Preview",
            Self::InsertName => "Insert Name",
            Self::CopyName => "Copy Name",
            Self::Refresh => "Refresh",
            Self::Restore => "Restore File…",
            Self::Remove => "Remove",
            Self::DropTable => "Drop Table",
        }
    }

    /// Whether the menu should ask before running the action.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Remove | Self::DropTable)
    }
}

/// Actions for a node that represents a whole source.
pub fn source_actions(kind: NodeKind, entity: &DataSourceEntity) -> Vec<NodeAction> {
    let mut actions = Vec::new();

    if entity.restore_failed {
        actions.push(NodeAction::Restore);
    }

    match kind {
        NodeKind::File => {
            if !entity.restore_failed {
                actions.push(NodeAction::Preview);
            }
            actions.push(NodeAction::Refresh);
        }
        NodeKind::Database | NodeKind::Connection => actions.push(NodeAction::Refresh),
        _ => {}
    }

    actions.push(NodeAction::Remove);
    actions
}

/// Actions for nodes below a source, or for session tables.
pub fn member_actions(kind: NodeKind, session: bool) -> Vec<NodeAction> {
    match kind {
        NodeKind::Table | NodeKind::View => {
            let mut actions = vec![
                NodeAction::Preview,
                NodeAction::InsertName,
                NodeAction::CopyName,
            ];
            if session && kind == NodeKind::Table {
                actions.push(NodeAction::DropTable);
            }
            actions
        }
        NodeKind::Column => vec![NodeAction::InsertName, NodeAction::CopyName],
        NodeKind::Schema | NodeKind::Dataset | NodeKind::Project => vec![NodeAction::CopyName],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuSize {
    pub width: f32,
    pub height: f32,
}

/// Places a menu at `anchor`, shifted so it stays fully inside `viewport`
/// with [`MENU_MARGIN`] to spare. A menu larger than the viewport is pinned
/// to the top-left margin.
pub fn position_menu(anchor: MenuPoint, menu: MenuSize, viewport: MenuSize) -> MenuPoint {
    fn clamp_axis(start: f32, extent: f32, limit: f32) -> f32 {
        let max_start = limit - extent - MENU_MARGIN;
        start.min(max_start).max(MENU_MARGIN)
    }

    MenuPoint {
        x: clamp_axis(anchor.x, menu.width, viewport.width),
        y: clamp_axis(anchor.y, menu.height, viewport.height),
    }
}
