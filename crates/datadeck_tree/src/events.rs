use crate::{NodeAction, NodeId};

/// Keys the navigation machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Home,
    End,
}

/// Notifications emitted by [`crate::NavigationState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// Focus moved to a different node.
    NodeSelected(NodeId),

    /// The row at this index must be brought on screen.
    ScrollIntoView(usize),

    /// Expansion change requested for a node with children.
    ExpandRequested(NodeId),
    CollapseRequested(NodeId),

    MenuOpened(NodeId),
    MenuClosed,

    /// A context-menu entry was activated.
    ActionTriggered { node: NodeId, action: NodeAction },

    /// Enter on a node without actions, or a double click.
    DefaultAction(NodeId),

    /// Escape with no menu open.
    FocusCleared,
}
