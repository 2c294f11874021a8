mod badges;
mod builder;
mod context_menu;
mod drag_drop;
mod events;
mod expansion;
mod filter;
mod format;
mod navigation;
mod node;
mod node_id;
mod view;

pub use badges::{PrimaryBadge, SuffixBadge, primary_badge, suffix_badges, visible_suffixes};
pub use builder::{SESSION_SCHEMA, build_sections};
pub use context_menu::{
    MENU_MARGIN, MenuPoint, MenuSize, NodeAction, member_actions, position_menu, source_actions,
};
pub use drag_drop::{
    DRAG_MIME, DeletionAction, DragPayload, DragPayloadError, decode_payload, deletion_action,
    drag_payload, encode_payload,
};
pub use events::{NavEvent, NavKey};
pub use expansion::{ExpansionState, VisibleRow, flatten};
pub use filter::label_matches;
pub use format::{compact_count, format_bytes, rows_label};
pub use navigation::{MenuState, NavPhase, NavigationState};
pub use node::{NodeKind, Projection, Section, SectionKind, TreeNode};
pub use node_id::{NodeId, ParseNodeIdError};
pub use view::TreeView;
