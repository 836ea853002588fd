//! Typed errors for the snapshot store

use thiserror::Error;

/// Failures while loading or persisting snapshots
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot exists, or the latest one cannot be read back
    #[error("no snapshot available: {0}")]
    NotAvailable(String),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Whether creating a fresh baseline snapshot resolves the error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SnapshotError::NotAvailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_snapshot_is_recoverable() {
        assert!(SnapshotError::NotAvailable("empty store".into()).is_recoverable());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!SnapshotError::from(io).is_recoverable());
    }
}
