//! DocDrift - Structural documentation drift detection
//!
//! This library snapshots the structure of TypeScript, JavaScript, Python and
//! Rust code bases, builds cross-file call graphs, and detects when API changes
//! leave documentation sections out of date.

pub mod callgraph;
pub mod cli;
pub mod drift;
pub mod error;
pub mod extract;
pub mod llm;
pub mod repo;
pub mod snapshot;
pub mod storage;
pub mod syntax;

/// Re-export commonly used types
pub use callgraph::{CallGraph, CallGraphBuilder, CallGraphOptions};
pub use drift::{detect_drift, DriftDetectionResult, DriftDetector, DriftSeverity};
pub use error::SnapshotError;
pub use extract::{CodeExtractor, DocExtractor, FileStructure};
pub use repo::Project;
pub use snapshot::{DriftSnapshot, SnapshotStore};
pub use storage::Database;

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "docdrift";
