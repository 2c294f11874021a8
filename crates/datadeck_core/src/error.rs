use crate::SourceId;
use thiserror::Error;

/// Errors raised by the catalog and its collaborators.
///
/// Messages are kept as owned strings so the error is `Clone`; a single
/// in-flight add is shared by every caller that asked for the same location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Database already attached: {0}")]
    AlreadyAttached(String),

    #[error("Source not found: {0}")]
    SourceNotFound(SourceId),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Query engine not ready for {0}")]
    EngineNotReady(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl CatalogError {
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed(message.into())
    }

    /// Whether the engine reported that the underlying file is gone.
    pub fn is_missing_file(&self) -> bool {
        match self {
            Self::FileNotFound(_) => true,
            Self::QueryFailed(message) => {
                let lower = message.to_lowercase();
                lower.contains("no files found")
                    || lower.contains("no such file")
                    || lower.contains("file does not exist")
                    || lower.contains("cannot open file")
            }
            _ => false,
        }
    }

    /// Whether an ATTACH failed only because the alias is already bound.
    pub fn is_already_attached(&self) -> bool {
        match self {
            Self::AlreadyAttached(_) => true,
            Self::QueryFailed(message) => {
                let lower = message.to_lowercase();
                lower.contains("already attached")
                    || (lower.contains("database with name") && lower.contains("already exists"))
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_file_messages() {
        assert!(CatalogError::FileNotFound("a.csv".into()).is_missing_file());
        assert!(
            CatalogError::query_failed("IO Error: No files found that match the pattern \"x.csv\"")
                .is_missing_file()
        );
        assert!(!CatalogError::query_failed("syntax error").is_missing_file());
        assert!(!CatalogError::Storage("No files found".into()).is_missing_file());
    }

    #[test]
    fn classifies_already_attached_messages() {
        assert!(CatalogError::AlreadyAttached("sales".into()).is_already_attached());
        assert!(
            CatalogError::query_failed("Binder Error: Database \"sales\" is already attached")
                .is_already_attached()
        );
        assert!(
            CatalogError::query_failed(
                "Catalog Error: database with name \"sales\" already exists"
            )
            .is_already_attached()
        );
        assert!(!CatalogError::query_failed("permission denied").is_already_attached());
    }
}
