//! Project discovery and file enumeration
//!
//! This module handles everything tied to the project on disk:
//! - Locating the project root and its `.docdrift/` state directory
//! - Loading configuration
//! - Enumerating source and documentation files
//! - Reading the git HEAD commit, when the project is a git work tree

mod config;

pub use config::{CallGraphConfig, LlmConfig, RepoConfig, STATE_DIR};

use anyhow::{Context, Result};
use git2::Repository as GitRepo;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory names never descended into
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "__pycache__"];

/// Markdown extensions treated as documentation
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "mdx"];

/// A project being analyzed
pub struct Project {
    /// Absolute path to the project root
    root: PathBuf,
    /// Project configuration
    config: RepoConfig,
}

impl Project {
    /// Open the project at the given path, loading `.docdrift/config.toml` if present
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let root = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve project path {:?}", path))?;
        let config = RepoConfig::load_or_default(&root)?;
        Ok(Self { root, config })
    }

    /// Build a project with an explicit configuration
    pub fn with_config<P: Into<PathBuf>>(root: P, config: RepoConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Get the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the project configuration
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Get the path to the .docdrift directory
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Directory holding snapshot files
    pub fn snapshot_dir(&self) -> PathBuf {
        self.state_dir().join("snapshots")
    }

    /// Path of the result history database
    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("docdrift.db")
    }

    /// Initialize the .docdrift directory if it doesn't exist
    pub fn init_state_dir(&self) -> Result<PathBuf> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir)
                .with_context(|| format!("Failed to create {:?}", state_dir))?;
        }
        Ok(state_dir)
    }

    /// Whether `.docdrift/` exists
    pub fn is_initialized(&self) -> bool {
        self.state_dir().is_dir()
    }

    /// Current HEAD commit hash, if the project is inside a git work tree
    pub fn head_commit(&self) -> Option<String> {
        let repo = match GitRepo::discover(&self.root) {
            Ok(repo) => repo,
            Err(e) => {
                debug!("No git repository at {:?}: {}", self.root, e);
                return None;
            }
        };
        let commit = repo.head().and_then(|head| head.peel_to_commit());
        match commit {
            Ok(commit) => Some(commit.id().to_string()),
            Err(e) => {
                debug!("Repository has no HEAD commit: {}", e);
                None
            }
        }
    }

    /// Path relative to the project root, with forward slashes
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Source directories that exist; the project root when none do
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let roots: Vec<PathBuf> = self
            .config
            .source_dirs
            .iter()
            .map(|dir| self.root.join(dir))
            .filter(|dir| dir.is_dir())
            .collect();

        if roots.is_empty() {
            vec![self.root.clone()]
        } else {
            roots
        }
    }

    /// All analyzable source files, absolute and sorted
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in self.source_roots() {
            files.extend(self.walk(&root, |path| self.config.is_source_file(path)));
        }
        files.sort();
        files.dedup();
        files
    }

    /// All documentation files, absolute and sorted
    pub fn doc_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let docs_dir = self.root.join(&self.config.docs_dir);
        if docs_dir.is_dir() {
            files.extend(self.walk(&docs_dir, is_doc_file));
        }

        // Root-level READMEs are always scanned
        if let Ok(entries) = std::fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_uppercase();
                if path.is_file() && name.starts_with("README") && is_doc_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        files.dedup();
        files
    }

    /// Whether a changed path matters to drift detection (watch mode)
    pub fn is_tracked(&self, path: &Path) -> bool {
        let relative = self.relative_path(path);
        if relative.starts_with(STATE_DIR) || self.config.should_ignore(&relative) {
            return false;
        }
        self.config.is_source_file(path) || is_doc_file(path)
    }

    fn walk(&self, dir: &Path, accept: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir).into_iter().filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_str().unwrap_or("");
            !(e.file_type().is_dir() && (name.starts_with('.') || SKIPPED_DIRS.contains(&name)))
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", dir, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.config.should_ignore(&self.relative_path(path)) {
                continue;
            }
            if accept(path) {
                files.push(path.to_path_buf());
            }
        }
        files
    }
}

fn is_doc_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DOC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("src/node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("docs/api")).unwrap();
        fs::write(root.join("src/main.ts"), "export function main() {}").unwrap();
        fs::write(root.join("src/nested/util.py"), "def util():\n    pass\n").unwrap();
        fs::write(root.join("src/node_modules/pkg/index.js"), "").unwrap();
        fs::write(root.join("src/notes.txt"), "").unwrap();
        fs::write(root.join("docs/api/guide.md"), "# Guide").unwrap();
        fs::write(root.join("README.md"), "# Readme").unwrap();
        fs::write(root.join("CHANGELOG.md"), "# Changes").unwrap();

        let project = Project::open(root).unwrap();
        (dir, project)
    }

    #[test]
    fn test_source_files() {
        let (_dir, project) = project();
        let files: Vec<String> = project
            .source_files()
            .iter()
            .map(|p| project.relative_path(p))
            .collect();

        assert_eq!(files, vec!["src/main.ts", "src/nested/util.py"]);
    }

    #[test]
    fn test_doc_files_include_root_readme() {
        let (_dir, project) = project();
        let files: Vec<String> = project
            .doc_files()
            .iter()
            .map(|p| project.relative_path(p))
            .collect();

        assert_eq!(files, vec!["README.md", "docs/api/guide.md"]);
    }

    #[test]
    fn test_source_roots_fall_back_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.source_roots(), vec![project.root().to_path_buf()]);
    }

    #[test]
    fn test_head_commit_outside_git() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert!(project.head_commit().is_none());
    }
}
