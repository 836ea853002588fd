//! Structural extraction module
//!
//! This module turns files into comparable structural models:
//! - Source files (tree-sitter, via the language-neutral syntax layer)
//! - Documentation files (Markdown parsing)
//! - The diff primitive comparing two models of one source file

pub mod code;
pub mod diff;
pub mod doc;
pub mod model;

pub use code::{cyclomatic_complexity, CodeExtractor, Language, ParsedFile};
pub use diff::{diff_structures, CodeDiff, DiffCategory, DiffKind, ImpactLevel};
pub use doc::{DocExtractor, DocumentationSection, DocumentationSnapshot};
pub use model::{
    ClassInfo, ExportInfo, FileStructure, FunctionSignature, ImportBinding, ImportInfo,
    InterfaceInfo, Parameter, PropertyInfo, TypeInfo,
};

use sha2::{Digest, Sha256};

/// Compute a stable hash for content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("").len(), 64);
    }
}
