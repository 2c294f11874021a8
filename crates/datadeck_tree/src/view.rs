use std::collections::HashSet;

use datadeck_core::{DataSourceEntity, ExternalSnapshots};

use crate::{
    ExpansionState, NavEvent, NavKey, NavigationState, NodeId, Projection, VisibleRow,
    build_sections, flatten,
};

/// Projection, expansion, flattened rows and focus kept in step.
///
/// Every input change goes through [`TreeView::update`]; keyboard input
/// through [`TreeView::handle_key`], which applies expand and collapse
/// requests itself before reporting the events.
#[derive(Debug, Default)]
pub struct TreeView {
    projection: Projection,
    expansion: ExpansionState,
    rows: Vec<VisibleRow>,
    nav: NavigationState,
}

impl TreeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(
        &mut self,
        entities: &[DataSourceEntity],
        snapshots: &ExternalSnapshots,
        query: &str,
    ) -> Vec<NavEvent> {
        self.expansion.set_query(query);
        self.projection = build_sections(entities, snapshots, query);

        // Overrides only need to outlive a search when their node still
        // exists somewhere in the unfiltered catalog.
        if !self.expansion.is_searching() {
            let live = collect_ids(&self.projection);
            self.expansion.retain(|id| live.contains(id));
        }

        let events = self.refresh_rows();
        log::debug!(
            "Tree rebuilt: {} sections, {} visible rows",
            self.projection.sections.len(),
            self.rows.len()
        );
        events
    }

    pub fn handle_key(&mut self, key: NavKey) -> Vec<NavEvent> {
        let events = self.nav.handle_key(key, &self.rows);

        let mut changed = false;
        for event in &events {
            match event {
                NavEvent::ExpandRequested(id) => {
                    self.expansion.set_expanded(id.clone(), true);
                    changed = true;
                }
                NavEvent::CollapseRequested(id) => {
                    self.expansion.set_expanded(id.clone(), false);
                    changed = true;
                }
                _ => {}
            }
        }

        if !changed {
            return events;
        }

        let mut events = events;
        events.extend(self.refresh_rows());
        events
    }

    /// Mouse toggle on a row's disclosure arrow.
    pub fn toggle(&mut self, index: usize) -> Vec<NavEvent> {
        let Some(row) = self.rows.get(index) else {
            return Vec::new();
        };
        if !row.has_children {
            return Vec::new();
        }

        self.expansion.set_expanded(row.id.clone(), !row.expanded);
        self.refresh_rows()
    }

    pub fn click(&mut self, index: usize) -> Vec<NavEvent> {
        self.nav.click(index, &self.rows)
    }

    pub fn double_click(&mut self, index: usize) -> Vec<NavEvent> {
        self.nav.double_click(index, &self.rows)
    }

    pub fn open_menu(&mut self, index: usize) -> Vec<NavEvent> {
        self.nav.open_menu(index, &self.rows)
    }

    pub fn container_focused(&mut self) -> Vec<NavEvent> {
        self.nav.container_focused(&self.rows)
    }

    pub fn rows(&self) -> &[VisibleRow] {
        &self.rows
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn navigation(&self) -> &NavigationState {
        &self.nav
    }

    pub fn focused(&self) -> Option<&VisibleRow> {
        self.nav.focused_row(&self.rows)
    }

    fn refresh_rows(&mut self) -> Vec<NavEvent> {
        self.rows = flatten(&self.projection, &self.expansion);
        self.nav.set_rows(&self.rows)
    }
}

fn collect_ids(projection: &Projection) -> HashSet<NodeId> {
    fn walk(node: &crate::TreeNode, ids: &mut HashSet<NodeId>) {
        ids.insert(node.id.clone());
        for child in &node.children {
            walk(child, ids);
        }
    }

    let mut ids = HashSet::new();
    for section in &projection.sections {
        ids.insert(section.id());
        for node in &section.nodes {
            walk(node, &mut ids);
        }
    }
    ids
}
