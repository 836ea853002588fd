//! Database schema definition

/// SQL schema for the DocDrift history database
pub const SCHEMA: &str = r#"
-- Last detection run
CREATE TABLE IF NOT EXISTS scan_state (
    id INTEGER PRIMARY KEY,
    commit_hash TEXT,
    scanned_at TEXT NOT NULL
);

-- One row per drifted source file per detection run
CREATE TABLE IF NOT EXISTS drift_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    severity TEXT NOT NULL,
    drift_count INTEGER NOT NULL,
    effort TEXT NOT NULL,
    requires_manual_review INTEGER NOT NULL DEFAULT 0,
    result_json TEXT NOT NULL,
    commit_hash TEXT,
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_drift_results_file ON drift_results(file_path);
CREATE INDEX IF NOT EXISTS idx_drift_results_severity ON drift_results(severity);
CREATE INDEX IF NOT EXISTS idx_drift_results_detected ON drift_results(detected_at);

-- Suggestions and their review status
CREATE TABLE IF NOT EXISTS suggestions (
    id TEXT PRIMARY KEY,
    result_id INTEGER NOT NULL,
    file_path TEXT NOT NULL,
    doc_file TEXT NOT NULL,
    section_heading TEXT NOT NULL,
    symbol_name TEXT NOT NULL,
    original_content TEXT NOT NULL,
    suggested_content TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    confidence REAL NOT NULL,
    auto_applicable INTEGER NOT NULL DEFAULT 0,
    feedback_score REAL,
    status TEXT NOT NULL DEFAULT 'Pending',
    created_at TEXT NOT NULL,
    resolved_at TEXT,
    FOREIGN KEY (result_id) REFERENCES drift_results(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_suggestions_status ON suggestions(status);
CREATE INDEX IF NOT EXISTS idx_suggestions_doc ON suggestions(doc_file);
"#;
