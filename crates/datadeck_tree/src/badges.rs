//! Badges derived from entity flags. Nothing here is stored; every
//! projection recomputes them.

use datadeck_core::{DataSourceEntity, SourceKind};

/// The single leading badge. Error wins over remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryBadge {
    Error(String),
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuffixBadge {
    /// Dropped straight into memory; gone after a reload.
    ZeroCopy,
    Attached,
    ReadOnly,
    ReadWrite,
}

impl SuffixBadge {
    /// Higher survives longer when space runs out.
    pub fn priority(&self) -> u8 {
        match self {
            Self::ZeroCopy => 3,
            Self::Attached => 2,
            Self::ReadOnly | Self::ReadWrite => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ZeroCopy => "zero-copy",
            Self::Attached => "attached",
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
        }
    }
}

pub fn primary_badge(entity: &DataSourceEntity) -> Option<PrimaryBadge> {
    if let Some(error) = &entity.introspection_error {
        return Some(PrimaryBadge::Error(error.clone()));
    }
    if entity.restore_failed {
        let message = entity
            .restore_error
            .clone()
            .unwrap_or_else(|| "file needs to be restored".to_string());
        return Some(PrimaryBadge::Error(message));
    }
    if entity.is_remote() {
        return Some(PrimaryBadge::Remote);
    }
    None
}

/// Suffix badges ordered by descending priority.
pub fn suffix_badges(entity: &DataSourceEntity) -> Vec<SuffixBadge> {
    let mut badges = Vec::new();

    if entity.volatile {
        badges.push(SuffixBadge::ZeroCopy);
    }
    if let SourceKind::Database(db) = &entity.kind {
        if db.attached {
            badges.push(SuffixBadge::Attached);
        }
        badges.push(if entity.read_only {
            SuffixBadge::ReadOnly
        } else {
            SuffixBadge::ReadWrite
        });
    }

    badges.sort_by_key(|b| std::cmp::Reverse(b.priority()));
    badges
}

/// Keeps at most `max` badges, dropping the lowest priorities first.
pub fn visible_suffixes(badges: &[SuffixBadge], max: usize) -> Vec<SuffixBadge> {
    let mut sorted = badges.to_vec();
    sorted.sort_by_key(|b| std::cmp::Reverse(b.priority()));
    sorted.truncate(max);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use datadeck_core::{FileFormat, SourceDraft, SourceLocation};
    use uuid::Uuid;

    fn attached_db(read_only: bool) -> DataSourceEntity {
        let mut entity = SourceDraft::database("sales.duckdb", SourceLocation::local("sales.duckdb"))
            .with_read_only(read_only)
            .volatile()
            .into_entity(Uuid::new_v4(), Utc::now());
        if let SourceKind::Database(db) = &mut entity.kind {
            db.attached = true;
        }
        entity
    }

    #[test]
    fn error_beats_remote() {
        let mut entity = SourceDraft::flat_file(
            "a.parquet",
            FileFormat::Parquet,
            SourceLocation::remote("https://x.io/a.parquet"),
        )
        .into_entity(Uuid::new_v4(), Utc::now());
        assert_eq!(primary_badge(&entity), Some(PrimaryBadge::Remote));

        entity.introspection_error = Some("403".into());
        assert_eq!(
            primary_badge(&entity),
            Some(PrimaryBadge::Error("403".into()))
        );
    }

    #[test]
    fn suffixes_are_priority_ordered() {
        assert_eq!(
            suffix_badges(&attached_db(false)),
            vec![
                SuffixBadge::ZeroCopy,
                SuffixBadge::Attached,
                SuffixBadge::ReadWrite
            ]
        );
    }

    #[test]
    fn collapsing_drops_lowest_priority_first() {
        let badges = suffix_badges(&attached_db(true));
        assert_eq!(
            visible_suffixes(&badges, 2),
            vec![SuffixBadge::ZeroCopy, SuffixBadge::Attached]
        );
        assert_eq!(visible_suffixes(&badges, 1), vec![SuffixBadge::ZeroCopy]);
        assert!(visible_suffixes(&badges, 0).is_empty());
        assert_eq!(
            visible_suffixes(&[SuffixBadge::ReadOnly, SuffixBadge::Attached], 1),
            vec![SuffixBadge::Attached]
        );
    }
}
