use std::collections::{HashMap, HashSet};

use crate::{NodeAction, NodeId, NodeKind, PrimaryBadge, Projection, SuffixBadge, TreeNode};

/// Expansion flags kept outside the tree so they survive every rebuild.
///
/// Lookup order: search-time override, then search auto-expand, then the
/// user's persistent override, then the projection's default.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    overrides: HashMap<NodeId, bool>,
    search_overrides: HashMap<NodeId, bool>,
    query: String,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the active query. Toggles made during a search are dropped
    /// when the query changes.
    pub fn set_query(&mut self, query: &str) {
        let normalized = query.trim().to_lowercase();
        if normalized != self.query {
            self.search_overrides.clear();
            self.query = normalized;
        }
    }

    pub fn is_searching(&self) -> bool {
        !self.query.is_empty()
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        if self.is_searching() {
            self.search_overrides.insert(id, expanded);
        } else {
            self.overrides.insert(id, expanded);
        }
    }

    pub fn is_expanded(&self, id: &NodeId, default: bool, auto_expand: &HashSet<NodeId>) -> bool {
        if self.is_searching()
            && let Some(expanded) = self.search_overrides.get(id)
        {
            return *expanded;
        }
        if auto_expand.contains(id) {
            return true;
        }
        self.overrides.get(id).copied().unwrap_or(default)
    }

    /// Drops overrides for ids that no longer exist.
    pub fn retain(&mut self, keep: impl Fn(&NodeId) -> bool) {
        self.overrides.retain(|id, _| keep(id));
        self.search_overrides.retain(|id, _| keep(id));
    }
}

/// One line of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    pub detail: Option<String>,
    pub badge: Option<PrimaryBadge>,
    pub suffixes: Vec<SuffixBadge>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub actions: Vec<NodeAction>,
}

impl VisibleRow {
    pub fn is_section(&self) -> bool {
        self.kind == NodeKind::Section
    }
}

/// In-order list of rendered rows: section headers, then every node whose
/// ancestors are all expanded.
pub fn flatten(projection: &Projection, expansion: &ExpansionState) -> Vec<VisibleRow> {
    let mut rows = Vec::new();

    for section in &projection.sections {
        let id = section.id();
        let expanded = expansion.is_expanded(&id, !section.collapsed, &projection.auto_expand);
        rows.push(VisibleRow {
            id,
            kind: NodeKind::Section,
            label: section.label.clone(),
            detail: section.badge.clone(),
            badge: None,
            suffixes: Vec::new(),
            depth: 0,
            has_children: !section.nodes.is_empty(),
            expanded,
            actions: Vec::new(),
        });

        if expanded {
            for node in &section.nodes {
                push_visible(node, 1, projection, expansion, &mut rows);
            }
        }
    }

    rows
}

fn push_visible(
    node: &TreeNode,
    depth: usize,
    projection: &Projection,
    expansion: &ExpansionState,
    rows: &mut Vec<VisibleRow>,
) {
    let expanded = node.has_children()
        && expansion.is_expanded(&node.id, node.expanded, &projection.auto_expand);

    rows.push(VisibleRow {
        id: node.id.clone(),
        kind: node.kind,
        label: node.label.clone(),
        detail: node.detail.clone(),
        badge: node.badge.clone(),
        suffixes: node.suffixes.clone(),
        depth,
        has_children: node.has_children(),
        expanded,
        actions: node.actions.clone(),
    });

    if expanded {
        for child in &node.children {
            push_visible(child, depth + 1, projection, expansion, rows);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(host: &str) -> NodeId {
        NodeId::RemoteHost {
            host: host.to_string(),
        }
    }

    #[test]
    fn precedence_search_override_then_auto_then_override() {
        let mut state = ExpansionState::new();
        let auto: HashSet<NodeId> = [id("a")].into_iter().collect();

        assert!(!state.is_expanded(&id("a"), false, &HashSet::new()));
        assert!(state.is_expanded(&id("a"), false, &auto));

        state.set_expanded(id("a"), false);
        assert!(state.is_expanded(&id("a"), true, &auto));
        assert!(!state.is_expanded(&id("a"), true, &HashSet::new()));

        state.set_query("ord");
        state.set_expanded(id("a"), false);
        assert!(!state.is_expanded(&id("a"), true, &auto));

        state.set_query("orde");
        assert!(state.is_expanded(&id("a"), false, &auto));

        state.set_query("");
        assert!(!state.is_expanded(&id("a"), true, &HashSet::new()));
    }

    #[test]
    fn retain_forgets_stale_ids() {
        let mut state = ExpansionState::new();
        state.set_expanded(id("gone"), true);
        state.set_expanded(id("kept"), true);
        state.retain(|i| *i == id("kept"));

        assert!(!state.is_expanded(&id("gone"), false, &HashSet::new()));
        assert!(state.is_expanded(&id("kept"), false, &HashSet::new()));
    }
}
