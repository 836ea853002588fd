//! SQLite storage layer for DocDrift
//!
//! This module handles persistent storage of:
//! - Drift detection results, one row per drifted file per run
//! - Suggestions and their review status
//! - The commit of the last detection run

mod schema;

pub use schema::SCHEMA;

use crate::drift::{DriftDetectionResult, DriftSuggestion};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Review status of a stored suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionStatus {
    /// Awaiting review
    Pending,
    /// Written into the documentation
    Applied,
    /// Dismissed by the user
    Ignored,
}

impl std::fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestionStatus::Pending => write!(f, "Pending"),
            SuggestionStatus::Applied => write!(f, "Applied"),
            SuggestionStatus::Ignored => write!(f, "Ignored"),
        }
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SuggestionStatus::Pending),
            "Applied" => Ok(SuggestionStatus::Applied),
            "Ignored" => Ok(SuggestionStatus::Ignored),
            other => Err(anyhow::anyhow!("unknown suggestion status '{}'", other)),
        }
    }
}

/// A suggestion as recorded in the history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSuggestion {
    /// Source file whose drift produced the suggestion
    pub file_path: String,
    pub suggestion: DriftSuggestion,
    pub status: SuggestionStatus,
    pub created_at: String,
}

/// Database connection wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    // ==================== Scan State ====================

    /// Commit recorded by the last detection run
    pub fn get_last_scan_commit(&self) -> Result<Option<String>> {
        let result: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT commit_hash FROM scan_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to get last scan commit")?;

        Ok(result.flatten())
    }

    fn set_last_scan_commit(&self, commit: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO scan_state (id, commit_hash, scanned_at) VALUES (1, ?1, datetime('now'))",
                params![commit],
            )
            .context("Failed to set last scan commit")?;
        Ok(())
    }

    // ==================== Drift Results ====================

    /// Record one detection run; returns the number of suggestions stored
    pub fn record_results(
        &self,
        results: &[DriftDetectionResult],
        commit: Option<&str>,
    ) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to start transaction")?;
        let mut stored = 0;

        for result in results {
            tx.execute(
                r#"
                INSERT INTO drift_results (
                    file_path, severity, drift_count, effort, requires_manual_review,
                    result_json, commit_hash, detected_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
                "#,
                params![
                    result.file_path,
                    result.severity.to_string(),
                    result.drifts.len() as i64,
                    result.impact.effort.to_string(),
                    result.impact.requires_manual_review,
                    serde_json::to_string(result)?,
                    commit,
                ],
            )
            .context("Failed to insert drift result")?;
            let result_id = tx.last_insert_rowid();

            for suggestion in &result.suggestions {
                tx.execute(
                    r#"
                    INSERT INTO suggestions (
                        id, result_id, file_path, doc_file, section_heading, symbol_name,
                        original_content, suggested_content, reasoning, confidence,
                        auto_applicable, feedback_score, status, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, datetime('now'))
                    "#,
                    params![
                        suggestion.id,
                        result_id,
                        result.file_path,
                        suggestion.doc_file,
                        suggestion.section_heading,
                        suggestion.symbol_name,
                        suggestion.original_content,
                        suggestion.suggested_content,
                        suggestion.reasoning,
                        suggestion.confidence,
                        suggestion.auto_applicable,
                        suggestion.feedback_score,
                        SuggestionStatus::Pending.to_string(),
                    ],
                )
                .context("Failed to insert suggestion")?;
                stored += 1;
            }
        }

        self.set_last_scan_commit(commit)?;
        tx.commit().context("Failed to commit detection results")?;

        Ok(stored)
    }

    /// Drop pending suggestions superseded by a newer run
    pub fn clear_pending_suggestions(&self) -> Result<usize> {
        let count = self
            .conn
            .execute("DELETE FROM suggestions WHERE status = 'Pending'", [])
            .context("Failed to clear pending suggestions")?;
        Ok(count)
    }

    // ==================== Suggestions ====================

    /// Pending suggestions, most confident first
    pub fn get_pending_suggestions(&self) -> Result<Vec<StoredSuggestion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE status = 'Pending' ORDER BY confidence DESC, created_at",
            SELECT_SUGGESTION
        ))?;

        let rows = stmt.query_map([], SuggestionRow::from_row)?;

        let mut suggestions = Vec::new();
        for row in rows {
            match row?.into_suggestion() {
                Ok(suggestion) => suggestions.push(suggestion),
                Err(e) => tracing::warn!("Skipping malformed suggestion row: {}", e),
            }
        }
        Ok(suggestions)
    }

    /// Suggestion by full id or unique id prefix
    pub fn get_suggestion(&self, id: &str) -> Result<Option<StoredSuggestion>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} WHERE id = ?1 OR id LIKE ?1 || '%' ORDER BY id = ?1 DESC LIMIT 2",
            SELECT_SUGGESTION
        ))?;

        let rows: Vec<SuggestionRow> = stmt
            .query_map(params![id], SuggestionRow::from_row)?
            .collect::<rusqlite::Result<_>>()
            .context("Failed to get suggestion")?;

        let mut rows = rows.into_iter();
        match (rows.next(), rows.next()) {
            (None, _) => Ok(None),
            (Some(first), None) => Ok(Some(first.into_suggestion()?)),
            (Some(first), Some(_)) if first.id == id => Ok(Some(first.into_suggestion()?)),
            _ => anyhow::bail!("Suggestion id prefix '{}' is ambiguous", id),
        }
    }

    /// Update a suggestion's status; false when no such suggestion exists
    pub fn update_suggestion_status(&self, id: &str, status: SuggestionStatus) -> Result<bool> {
        let resolved = status != SuggestionStatus::Pending;
        let count = self
            .conn
            .execute(
                "UPDATE suggestions SET status = ?1, resolved_at = CASE WHEN ?2 THEN datetime('now') ELSE NULL END WHERE id = ?3",
                params![status.to_string(), resolved, id],
            )
            .context("Failed to update suggestion status")?;
        Ok(count > 0)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(DatabaseStats {
            drift_results: count("SELECT COUNT(*) FROM drift_results")?,
            suggestions: count("SELECT COUNT(*) FROM suggestions")?,
            pending_suggestions: count("SELECT COUNT(*) FROM suggestions WHERE status = 'Pending'")?,
            applied_suggestions: count("SELECT COUNT(*) FROM suggestions WHERE status = 'Applied'")?,
            ignored_suggestions: count("SELECT COUNT(*) FROM suggestions WHERE status = 'Ignored'")?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub drift_results: usize,
    pub suggestions: usize,
    pub pending_suggestions: usize,
    pub applied_suggestions: usize,
    pub ignored_suggestions: usize,
}

const SELECT_SUGGESTION: &str = r#"
    SELECT id, file_path, doc_file, section_heading, symbol_name, original_content,
           suggested_content, reasoning, confidence, auto_applicable, feedback_score,
           status, created_at
    FROM suggestions"#;

// Internal row type for database mapping
struct SuggestionRow {
    id: String,
    file_path: String,
    doc_file: String,
    section_heading: String,
    symbol_name: String,
    original_content: String,
    suggested_content: String,
    reasoning: String,
    confidence: f64,
    auto_applicable: bool,
    feedback_score: Option<f64>,
    status: String,
    created_at: String,
}

impl SuggestionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_path: row.get(1)?,
            doc_file: row.get(2)?,
            section_heading: row.get(3)?,
            symbol_name: row.get(4)?,
            original_content: row.get(5)?,
            suggested_content: row.get(6)?,
            reasoning: row.get(7)?,
            confidence: row.get(8)?,
            auto_applicable: row.get(9)?,
            feedback_score: row.get(10)?,
            status: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_suggestion(self) -> Result<StoredSuggestion> {
        Ok(StoredSuggestion {
            file_path: self.file_path,
            status: self.status.parse()?,
            created_at: self.created_at,
            suggestion: DriftSuggestion {
                id: self.id,
                doc_file: self.doc_file,
                section_heading: self.section_heading,
                symbol_name: self.symbol_name,
                original_content: self.original_content,
                suggested_content: self.suggested_content,
                reasoning: self.reasoning,
                confidence: self.confidence,
                auto_applicable: self.auto_applicable,
                feedback_score: self.feedback_score,
            },
        })
    }
}
