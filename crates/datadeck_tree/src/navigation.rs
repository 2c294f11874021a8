use crate::{NavEvent, NavKey, NodeId, VisibleRow};

/// An open context menu: the row it belongs to and the highlighted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuState {
    pub node_index: usize,
    pub action_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    Idle,
    NodeFocused(usize),
    MenuOpen(MenuState),
}

/// Keyboard and mouse focus over the flattened rows.
///
/// Holds indices only; callers pass the current rows to every operation
/// and call [`NavigationState::set_rows`] after each re-flatten.
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    focused: Option<usize>,
    focused_id: Option<NodeId>,
    row_count: usize,
    /// Set by Escape. Keeps a later container focus from grabbing row 0.
    cleared_by_user: bool,
    menu: Option<MenuState>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn focused_id(&self) -> Option<&NodeId> {
        self.focused_id.as_ref()
    }

    pub fn menu(&self) -> Option<MenuState> {
        self.menu
    }

    pub fn cleared_by_user(&self) -> bool {
        self.cleared_by_user
    }

    pub fn phase(&self) -> NavPhase {
        match (self.menu, self.focused) {
            (Some(menu), _) => NavPhase::MenuOpen(menu),
            (None, Some(index)) => NavPhase::NodeFocused(index),
            (None, None) => NavPhase::Idle,
        }
    }

    /// Repairs focus after the rows changed.
    ///
    /// Focus follows the previously focused node while it is still visible.
    /// When that node is gone the same position is kept, clamped to the new
    /// length, so deleting a row never drops focus.
    pub fn set_rows(&mut self, rows: &[VisibleRow]) -> Vec<NavEvent> {
        self.row_count = rows.len();

        let Some(previous) = self.focused else {
            self.menu = None;
            return Vec::new();
        };

        if rows.is_empty() {
            self.focused = None;
            self.focused_id = None;
            self.menu = None;
            return Vec::new();
        }

        let followed = self
            .focused_id
            .as_ref()
            .and_then(|id| rows.iter().position(|r| &r.id == id));
        let target = followed.unwrap_or_else(|| previous.min(rows.len() - 1));

        let mut events = Vec::new();
        if let Some(menu) = self.menu
            && (followed.is_none() || menu.node_index != target)
        {
            self.menu = None;
            events.push(NavEvent::MenuClosed);
        }

        let node_changed = followed.is_none();
        self.focused = Some(target);
        self.focused_id = Some(rows[target].id.clone());

        if node_changed {
            events.push(NavEvent::NodeSelected(rows[target].id.clone()));
        }
        if node_changed || target != previous {
            events.push(NavEvent::ScrollIntoView(target));
        }
        events
    }

    pub fn handle_key(&mut self, key: NavKey, rows: &[VisibleRow]) -> Vec<NavEvent> {
        if rows.is_empty() {
            return Vec::new();
        }
        let last = rows.len() - 1;

        if let Some(menu) = self.menu {
            return self.handle_menu_key(key, menu, rows);
        }

        match key {
            NavKey::Up => {
                let target = self.focused.map_or(last, |i| i.saturating_sub(1).min(last));
                self.focus_if_changed(target, rows)
            }
            NavKey::Down => {
                let target = self.focused.map_or(0, |i| (i + 1).min(last));
                self.focus_if_changed(target, rows)
            }
            NavKey::Home => self.focus_if_changed(0, rows),
            NavKey::End => self.focus_if_changed(last, rows),
            NavKey::Left => match self.focused_row(rows) {
                Some(row) if row.has_children && row.expanded => {
                    vec![NavEvent::CollapseRequested(row.id.clone())]
                }
                _ => Vec::new(),
            },
            NavKey::Right => match self.focused_row(rows) {
                Some(row) if row.has_children && !row.expanded => {
                    vec![NavEvent::ExpandRequested(row.id.clone())]
                }
                _ => Vec::new(),
            },
            NavKey::Enter => {
                let Some(index) = self.focused.filter(|i| *i < rows.len()) else {
                    return Vec::new();
                };
                let row = &rows[index];
                if row.actions.is_empty() {
                    return vec![NavEvent::DefaultAction(row.id.clone())];
                }
                self.menu = Some(MenuState {
                    node_index: index,
                    action_index: 0,
                });
                vec![NavEvent::MenuOpened(row.id.clone())]
            }
            NavKey::Escape => {
                if self.focused.is_none() {
                    return Vec::new();
                }
                self.focused = None;
                self.focused_id = None;
                self.cleared_by_user = true;
                vec![NavEvent::FocusCleared]
            }
        }
    }

    fn handle_menu_key(&mut self, key: NavKey, menu: MenuState, rows: &[VisibleRow]) -> Vec<NavEvent> {
        let Some(row) = rows.get(menu.node_index) else {
            self.menu = None;
            return vec![NavEvent::MenuClosed];
        };
        let last_action = row.actions.len().saturating_sub(1);

        let action_index = match key {
            NavKey::Up => menu.action_index.saturating_sub(1),
            NavKey::Down => (menu.action_index + 1).min(last_action),
            NavKey::Home => 0,
            NavKey::End => last_action,
            NavKey::Left | NavKey::Right => menu.action_index,
            NavKey::Escape => {
                self.menu = None;
                return vec![NavEvent::MenuClosed];
            }
            NavKey::Enter => {
                self.menu = None;
                let mut events = Vec::new();
                if let Some(action) = row.actions.get(menu.action_index) {
                    events.push(NavEvent::ActionTriggered {
                        node: row.id.clone(),
                        action: *action,
                    });
                }
                events.push(NavEvent::MenuClosed);
                return events;
            }
        };

        self.menu = Some(MenuState {
            action_index,
            ..menu
        });
        Vec::new()
    }

    /// Mouse focus. Closes any open menu.
    pub fn click(&mut self, index: usize, rows: &[VisibleRow]) -> Vec<NavEvent> {
        if index >= rows.len() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if self.menu.take().is_some() {
            events.push(NavEvent::MenuClosed);
        }
        events.extend(self.focus_if_changed(index, rows));
        events
    }

    pub fn double_click(&mut self, index: usize, rows: &[VisibleRow]) -> Vec<NavEvent> {
        let Some(row) = rows.get(index) else {
            return Vec::new();
        };

        let mut events = self.click(index, rows);
        events.push(NavEvent::DefaultAction(row.id.clone()));
        events
    }

    /// Right click: focus the row and open its menu if it has one.
    pub fn open_menu(&mut self, index: usize, rows: &[VisibleRow]) -> Vec<NavEvent> {
        let Some(row) = rows.get(index) else {
            return Vec::new();
        };

        let mut events = self.click(index, rows);
        if !row.actions.is_empty() {
            self.menu = Some(MenuState {
                node_index: index,
                action_index: 0,
            });
            events.push(NavEvent::MenuOpened(row.id.clone()));
        }
        events
    }

    /// The container received focus (e.g. via Tab). Row 0 is focused only
    /// when nothing is focused and the user did not clear focus themselves.
    pub fn container_focused(&mut self, rows: &[VisibleRow]) -> Vec<NavEvent> {
        if self.focused.is_some() || self.cleared_by_user || rows.is_empty() {
            return Vec::new();
        }
        self.move_to(0, rows)
    }

    pub fn focused_row<'a>(&self, rows: &'a [VisibleRow]) -> Option<&'a VisibleRow> {
        self.focused.and_then(|i| rows.get(i))
    }

    fn focus_if_changed(&mut self, index: usize, rows: &[VisibleRow]) -> Vec<NavEvent> {
        if self.focused == Some(index) {
            self.cleared_by_user = false;
            return Vec::new();
        }
        self.move_to(index, rows)
    }

    fn move_to(&mut self, index: usize, rows: &[VisibleRow]) -> Vec<NavEvent> {
        let Some(row) = rows.get(index) else {
            return Vec::new();
        };

        self.focused = Some(index);
        self.focused_id = Some(row.id.clone());
        self.cleared_by_user = false;

        vec![
            NavEvent::NodeSelected(row.id.clone()),
            NavEvent::ScrollIntoView(index),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeAction, NodeKind};

    fn row(name: &str, actions: Vec<NodeAction>) -> VisibleRow {
        VisibleRow {
            id: NodeId::RemoteHost {
                host: name.to_string(),
            },
            kind: NodeKind::Folder,
            label: name.to_string(),
            detail: None,
            badge: None,
            suffixes: Vec::new(),
            depth: 1,
            has_children: false,
            expanded: false,
            actions,
        }
    }

    fn rows(names: &[&str]) -> Vec<VisibleRow> {
        names.iter().map(|n| row(n, Vec::new())).collect()
    }

    #[test]
    fn arrows_clamp_instead_of_wrapping() {
        let rows = rows(&["a", "b", "c"]);
        let mut nav = NavigationState::new();

        assert_eq!(
            nav.handle_key(NavKey::Down, &rows),
            vec![
                NavEvent::NodeSelected(rows[0].id.clone()),
                NavEvent::ScrollIntoView(0)
            ]
        );
        assert!(nav.handle_key(NavKey::Up, &rows).is_empty());
        assert_eq!(nav.focused(), Some(0));

        nav.handle_key(NavKey::End, &rows);
        assert_eq!(nav.focused(), Some(2));
        assert!(nav.handle_key(NavKey::Down, &rows).is_empty());
        assert_eq!(nav.focused(), Some(2));
    }

    #[test]
    fn up_without_focus_selects_last() {
        let rows = rows(&["a", "b", "c"]);
        let mut nav = NavigationState::new();
        nav.handle_key(NavKey::Up, &rows);
        assert_eq!(nav.focused(), Some(2));
    }

    #[test]
    fn menu_navigation_and_activation() {
        let rows = vec![row("a", vec![NodeAction::Preview, NodeAction::Remove])];
        let mut nav = NavigationState::new();
        nav.click(0, &rows);

        assert_eq!(
            nav.handle_key(NavKey::Enter, &rows),
            vec![NavEvent::MenuOpened(rows[0].id.clone())]
        );
        nav.handle_key(NavKey::Down, &rows);
        nav.handle_key(NavKey::Down, &rows);
        assert_eq!(nav.menu().map(|m| m.action_index), Some(1));

        assert_eq!(
            nav.handle_key(NavKey::Enter, &rows),
            vec![
                NavEvent::ActionTriggered {
                    node: rows[0].id.clone(),
                    action: NodeAction::Remove,
                },
                NavEvent::MenuClosed
            ]
        );
        assert_eq!(nav.phase(), NavPhase::NodeFocused(0));
    }

    #[test]
    fn escape_closes_menu_before_clearing_focus() {
        let rows = vec![row("a", vec![NodeAction::Preview])];
        let mut nav = NavigationState::new();
        nav.click(0, &rows);
        nav.handle_key(NavKey::Enter, &rows);

        assert_eq!(
            nav.handle_key(NavKey::Escape, &rows),
            vec![NavEvent::MenuClosed]
        );
        assert_eq!(nav.focused(), Some(0));

        assert_eq!(
            nav.handle_key(NavKey::Escape, &rows),
            vec![NavEvent::FocusCleared]
        );
        assert_eq!(nav.phase(), NavPhase::Idle);
    }

    #[test]
    fn enter_without_actions_runs_default_action() {
        let rows = rows(&["a"]);
        let mut nav = NavigationState::new();
        nav.click(0, &rows);
        assert_eq!(
            nav.handle_key(NavKey::Enter, &rows),
            vec![NavEvent::DefaultAction(rows[0].id.clone())]
        );
    }

    #[test]
    fn container_focus_selects_first_row_only_once_untouched() {
        let rows = rows(&["a", "b"]);
        let mut nav = NavigationState::new();

        assert_eq!(
            nav.container_focused(&rows),
            vec![
                NavEvent::NodeSelected(rows[0].id.clone()),
                NavEvent::ScrollIntoView(0)
            ]
        );
        nav.handle_key(NavKey::Down, &rows);
        assert!(nav.container_focused(&rows).is_empty());
        assert_eq!(nav.focused(), Some(1));
    }

    #[test]
    fn focus_follows_node_when_rows_are_inserted_above() {
        let before = rows(&["b", "c"]);
        let mut nav = NavigationState::new();
        nav.click(1, &before);

        let after = rows(&["a", "b", "c"]);
        assert_eq!(nav.set_rows(&after), vec![NavEvent::ScrollIntoView(2)]);
        assert_eq!(nav.focused(), Some(2));
    }

    #[test]
    fn emptied_list_returns_to_idle() {
        let before = rows(&["a"]);
        let mut nav = NavigationState::new();
        nav.click(0, &before);
        assert!(nav.set_rows(&[]).is_empty());
        assert_eq!(nav.phase(), NavPhase::Idle);
    }
}
