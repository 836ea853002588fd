//! Snapshot store
//!
//! A snapshot captures the structural model of every source file and every
//! documentation file of a project at one point in time. Snapshot files are
//! write-once and named by their UTC timestamp, so the newest one is simply
//! the highest-sorting file name.

use crate::error::SnapshotError;
use crate::extract::{CodeExtractor, DocExtractor, DocumentationSnapshot, FileStructure};
use crate::repo::Project;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_PREFIX: &str = "snapshot-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Filesystem-safe, lexicographically sortable timestamp
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3fZ";

/// Project structure at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSnapshot {
    pub project_path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    /// Source models keyed by absolute path
    pub files: BTreeMap<String, FileStructure>,
    /// Documentation models keyed by absolute path
    pub docs: BTreeMap<String, DocumentationSnapshot>,
}

impl DriftSnapshot {
    /// Capture the current state of a project
    ///
    /// Source files are extracted in parallel with one parser set per worker.
    /// Unreadable files are skipped; unparsable files keep an empty model.
    pub fn capture(project: &Project) -> Result<Self> {
        // Fail early when a grammar cannot be loaded at all
        CodeExtractor::new()?;

        let sources = project.source_files();
        let extracted: Vec<(String, FileStructure)> = sources
            .par_iter()
            .map_init(CodeExtractor::new, |extractor, path| {
                let extractor = extractor.as_mut().ok()?;
                match extractor.extract_path(path) {
                    Ok(structure) => Some((path.to_string_lossy().to_string(), structure)),
                    Err(e) => {
                        warn!("Skipping source file {:?}: {}", path, e);
                        None
                    }
                }
            })
            .flatten()
            .collect();

        let mut files = BTreeMap::new();
        for (path, structure) in extracted {
            files.insert(path, structure);
        }

        let doc_extractor = DocExtractor::new();
        let mut docs = BTreeMap::new();
        for path in project.doc_files() {
            match doc_extractor.extract_path(&path) {
                Ok(doc) => {
                    docs.insert(path.to_string_lossy().to_string(), doc);
                }
                Err(e) => warn!("Skipping documentation file {:?}: {}", path, e),
            }
        }

        info!(
            "Captured snapshot: {} source files, {} documentation files",
            files.len(),
            docs.len()
        );

        Ok(Self {
            project_path: project.root().to_string_lossy().to_string(),
            timestamp: Utc::now(),
            git_commit: project.head_commit(),
            files,
            docs,
        })
    }

    /// File name this snapshot is stored under
    pub fn file_name(&self) -> String {
        format!(
            "{}{}{}",
            SNAPSHOT_PREFIX,
            self.timestamp.format(TIMESTAMP_FORMAT),
            SNAPSHOT_SUFFIX
        )
    }
}

/// Directory of persisted snapshots
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the project's state directory
    pub fn for_project(project: &Project) -> Self {
        Self::new(project.snapshot_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the project and persist the snapshot
    pub fn create(&self, project: &Project) -> Result<DriftSnapshot> {
        let snapshot = DriftSnapshot::capture(project)?;
        self.save(&snapshot)?;
        Ok(snapshot)
    }

    /// Persist a snapshot; an existing file is never overwritten
    pub fn save(&self, snapshot: &DriftSnapshot) -> Result<PathBuf, SnapshotError> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(snapshot.file_name());
        let json = serde_json::to_string_pretty(snapshot)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.write_all(json.as_bytes())?;

        info!("Saved snapshot {:?}", path);
        Ok(path)
    }

    /// Snapshot file names, oldest first
    pub fn list_snapshots(&self) -> Result<Vec<String>, SnapshotError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .filter(|name| name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Load a snapshot by file name
    pub fn load(&self, name: &str) -> Result<DriftSnapshot, SnapshotError> {
        let path = self.dir.join(name);
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| {
            warn!("Malformed snapshot {:?}: {}", path, e);
            SnapshotError::NotAvailable(format!("{} is malformed: {}", name, e))
        })
    }

    /// Load the most recent snapshot
    pub fn load_latest(&self) -> Result<DriftSnapshot, SnapshotError> {
        let names = self.list_snapshots()?;
        let latest = names.last().ok_or_else(|| {
            SnapshotError::NotAvailable(format!("no snapshots in {:?}", self.dir))
        })?;
        debug!("Loading latest snapshot {}", latest);

        match self.load(latest) {
            Err(SnapshotError::Io(e)) => {
                warn!("Cannot read snapshot {}: {}", latest, e);
                Err(SnapshotError::NotAvailable(format!("{} is unreadable: {}", latest, e)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::RepoConfig;
    use chrono::TimeZone;
    use std::fs;

    fn project() -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("src/math.ts"), "export function add(a: number, b: number): number { return a + b; }\n").unwrap();
        fs::write(root.join("src/util.py"), "def helper():\n    pass\n").unwrap();
        fs::write(root.join("docs/api.md"), "# API\n\nSee `add` in [math](../src/math.ts).\n").unwrap();

        let project = Project::open(root).unwrap();
        (dir, project)
    }

    fn snapshot_at(millis: i64) -> DriftSnapshot {
        DriftSnapshot {
            project_path: "/p".to_string(),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
            git_commit: None,
            files: BTreeMap::new(),
            docs: BTreeMap::new(),
        }
    }

    #[test]
    fn test_capture_project() {
        let (_dir, project) = project();
        let snapshot = DriftSnapshot::capture(&project).unwrap();

        assert_eq!(snapshot.files.len(), 2);
        let math = snapshot
            .files
            .iter()
            .find(|(path, _)| path.ends_with("math.ts"))
            .map(|(_, s)| s)
            .unwrap();
        assert!(math.function("add").unwrap().is_exported);

        assert_eq!(snapshot.docs.len(), 1);
        let doc = snapshot.docs.values().next().unwrap();
        assert!(doc.references_file("src/math.ts"));
        assert!(snapshot.git_commit.is_none());
    }

    #[test]
    fn test_capture_skips_unreadable_source() {
        let (dir, project) = project();
        fs::write(dir.path().join("src/broken.ts"), [0xff, 0xfe, 0x00]).unwrap();

        let snapshot = DriftSnapshot::capture(&project).unwrap();

        assert_eq!(snapshot.files.len(), 2);
        assert!(snapshot.files.keys().all(|path| !path.ends_with("broken.ts")));
        assert!(snapshot.files.keys().any(|path| path.ends_with("util.py")));
    }

    #[test]
    fn test_file_name_embeds_sortable_timestamp() {
        let snapshot = snapshot_at(1_700_000_000_123);
        assert_eq!(snapshot.file_name(), "snapshot-2023-11-14T22-13-20.123Z.json");
    }

    #[test]
    fn test_save_and_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"));

        let older = snapshot_at(1_700_000_000_000);
        let mut newer = snapshot_at(1_700_000_100_000);
        newer.git_commit = Some("abc123".to_string());
        store.save(&newer).unwrap();
        store.save(&older).unwrap();

        assert_eq!(store.list_snapshots().unwrap().len(), 2);
        assert_eq!(store.load_latest().unwrap(), newer);
    }

    #[test]
    fn test_saved_snapshot_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let snapshot = snapshot_at(1_700_000_000_000);

        store.save(&snapshot).unwrap();
        assert!(matches!(store.save(&snapshot), Err(SnapshotError::Io(_))));
    }

    #[test]
    fn test_missing_or_malformed_snapshot_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("none"));
        let err = store.load_latest().unwrap_err();
        assert!(err.is_recoverable());

        let store = SnapshotStore::new(dir.path());
        fs::write(dir.path().join("snapshot-2030-01-01T00-00-00.000Z.json"), "{ not json").unwrap();
        let err = store.load_latest().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_store_for_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::with_config(dir.path(), RepoConfig::default());

        let store = SnapshotStore::for_project(&project);
        let snapshot = store.create(&project).unwrap();

        assert!(store.dir().ends_with(".docdrift/snapshots"));
        assert_eq!(store.list_snapshots().unwrap(), vec![snapshot.file_name()]);
    }
}
