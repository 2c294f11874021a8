use crate::{NodeId, TreeNode};

/// Filters `node` against a lowercase query.
///
/// A node survives when its own label matches or when at least one child
/// survives; in both cases only the surviving children are kept. Returns the
/// surviving node plus the ids of every kept node that still has children,
/// which the caller merges into its auto-expand set.
pub fn filter_node(node: &TreeNode, query_lower: &str) -> Option<(TreeNode, Vec<NodeId>)> {
    let mut expand = Vec::new();
    let mut surviving = Vec::new();

    for child in &node.children {
        if let Some((filtered, ids)) = filter_node(child, query_lower) {
            surviving.push(filtered);
            expand.extend(ids);
        }
    }

    if surviving.is_empty() && !label_matches(&node.label, query_lower) {
        return None;
    }

    if !surviving.is_empty() {
        expand.push(node.id.clone());
    }

    let filtered = TreeNode {
        id: node.id.clone(),
        kind: node.kind,
        label: node.label.clone(),
        detail: node.detail.clone(),
        badge: node.badge.clone(),
        suffixes: node.suffixes.clone(),
        children: surviving,
        expanded: node.expanded,
        source: node.source,
        actions: node.actions.clone(),
    };
    Some((filtered, expand))
}

pub fn label_matches(label: &str, query_lower: &str) -> bool {
    label.to_lowercase().contains(query_lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeKind;

    fn folder(name: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode::new(
            NodeId::RemoteHost {
                host: name.to_string(),
            },
            NodeKind::Folder,
            name,
        )
        .with_children(children)
    }

    fn leaf(name: &str) -> TreeNode {
        folder(name, Vec::new())
    }

    #[test]
    fn ancestors_of_matches_survive_and_expand() {
        let tree = folder(
            "root",
            vec![
                folder("alpha", vec![leaf("orders"), leaf("customers")]),
                folder("beta", vec![leaf("invoices")]),
            ],
        );

        let (filtered, expand) = filter_node(&tree, "order").expect("match below");
        assert_eq!(filtered.children.len(), 1);
        assert_eq!(filtered.children[0].label, "alpha");
        assert_eq!(filtered.children[0].children.len(), 1);
        assert_eq!(filtered.children[0].children[0].label, "orders");

        let labels: Vec<String> = expand.iter().map(|id| id.to_string()).collect();
        assert_eq!(labels, vec!["RH|alpha", "RH|root"]);
    }

    #[test]
    fn matching_node_keeps_only_matching_children() {
        let tree = folder("alpha", vec![leaf("one"), folder("two", vec![leaf("alpha_b")])]);
        let (filtered, expand) = filter_node(&tree, "ALPHA".to_lowercase().as_str()).expect("self");

        assert_eq!(filtered.label, "alpha");
        assert_eq!(filtered.children.len(), 1);
        assert_eq!(filtered.children[0].label, "two");
        assert_eq!(filtered.children[0].children[0].label, "alpha_b");

        let ids: Vec<String> = expand.iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["RH|two", "RH|alpha"]);
    }

    #[test]
    fn matching_leaf_parent_drops_unrelated_children() {
        let tree = folder("orders", vec![leaf("id"), leaf("status")]);
        let (filtered, expand) = filter_node(&tree, "order").expect("self");
        assert!(filtered.children.is_empty());
        assert!(expand.is_empty());
    }

    #[test]
    fn no_match_drops_the_node() {
        assert!(filter_node(&folder("alpha", vec![leaf("one")]), "zzz").is_none());
    }
}
