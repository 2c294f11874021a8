use datadeck_tree::{PrimaryBadge, VisibleRow, visible_suffixes};

/// One printable line: indentation, disclosure marker, label, detail and
/// badges.
pub fn render_row(row: &VisibleRow, max_suffixes: usize) -> String {
    let indent = "  ".repeat(row.depth);
    let marker = match (row.has_children, row.expanded) {
        (true, true) => "▾",
        (true, false) => "▸",
        (false, _) => " ",
    };

    let mut line = format!("{}{} {}", indent, marker, row.label);

    if let Some(detail) = &row.detail {
        if row.is_section() {
            line.push_str(&format!(" ({})", detail));
        } else {
            line.push_str(&format!("  {}", detail));
        }
    }

    match &row.badge {
        Some(PrimaryBadge::Error(message)) => line.push_str(&format!("  [error: {}]", message)),
        Some(PrimaryBadge::Remote) => line.push_str("  [remote]"),
        None => {}
    }

    for badge in visible_suffixes(&row.suffixes, max_suffixes) {
        line.push_str(&format!(" [{}]", badge.label()));
    }

    line
}
