//! Drift detection engine
//!
//! This module detects when documentation no longer matches code by:
//! - Diffing the structural models of each file across two snapshots
//! - Mapping each change's impact level to a drift severity
//! - Locating the documentation sections that describe the changed symbol
//! - Proposing a concrete edit for every affected section

mod detector;
mod rules;
mod suggest;

pub use detector::{detect_drift, DriftDetector};
pub use rules::{estimate_effort, requires_manual_review, severity_for};
pub use suggest::{apply_feedback, DriftSuggestion, FeedbackSource, SuggestionGenerator};

use crate::extract::{CodeDiff, ImpactLevel};
use serde::{Deserialize, Serialize};

/// Severity level of a drift, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    /// Internal change unlikely to affect readers
    Low,
    /// Visibility or additive change
    Medium,
    /// Behavioral contract change (async-ness)
    High,
    /// Public API broke
    Critical,
}

impl std::fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftSeverity::Critical => write!(f, "critical"),
            DriftSeverity::High => write!(f, "high"),
            DriftSeverity::Medium => write!(f, "medium"),
            DriftSeverity::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for DriftSeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(DriftSeverity::Critical),
            "high" => Ok(DriftSeverity::High),
            "medium" => Ok(DriftSeverity::Medium),
            "low" => Ok(DriftSeverity::Low),
            other => Err(anyhow::anyhow!("unknown severity '{}'", other)),
        }
    }
}

/// Effort needed to bring documentation back in sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortEstimate {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for EffortEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffortEstimate::Low => write!(f, "low"),
            EffortEstimate::Medium => write!(f, "medium"),
            EffortEstimate::High => write!(f, "high"),
        }
    }
}

/// A documentation section a drift points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedSection {
    pub doc_file: String,
    pub heading: String,
    pub start_line: usize,
}

/// One structural change and the documentation it invalidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationDrift {
    /// Source file the change happened in
    pub file_path: String,
    pub diff: CodeDiff,
    pub severity: DriftSeverity,
    pub description: String,
    /// Documentation files referencing the file or the symbol
    pub affected_docs: Vec<String>,
    pub affected_sections: Vec<AffectedSection>,
}

/// Summary of a file's drifts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub breaking: usize,
    pub major: usize,
    pub minor: usize,
    pub patch: usize,
    pub affected_doc_files: Vec<String>,
    pub effort: EffortEstimate,
    pub requires_manual_review: bool,
}

impl ImpactAnalysis {
    pub fn from_drifts(drifts: &[DocumentationDrift]) -> Self {
        let count = |level: ImpactLevel| {
            drifts
                .iter()
                .filter(|d| d.diff.impact_level == level)
                .count()
        };

        let mut affected_doc_files: Vec<String> = drifts
            .iter()
            .flat_map(|d| d.affected_docs.iter().cloned())
            .collect();
        affected_doc_files.sort();
        affected_doc_files.dedup();

        Self {
            breaking: count(ImpactLevel::Breaking),
            major: count(ImpactLevel::Major),
            minor: count(ImpactLevel::Minor),
            patch: count(ImpactLevel::Patch),
            affected_doc_files,
            effort: estimate_effort(drifts),
            requires_manual_review: requires_manual_review(drifts),
        }
    }
}

/// Drift found in one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftDetectionResult {
    pub file_path: String,
    pub drifts: Vec<DocumentationDrift>,
    /// Highest severity among the drifts
    pub severity: DriftSeverity,
    pub suggestions: Vec<DriftSuggestion>,
    pub impact: ImpactAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(DriftSeverity::Critical > DriftSeverity::High);
        assert!(DriftSeverity::High > DriftSeverity::Medium);
        assert!(DriftSeverity::Medium > DriftSeverity::Low);
        assert_eq!("HIGH".parse::<DriftSeverity>().unwrap(), DriftSeverity::High);
        assert!("severe".parse::<DriftSeverity>().is_err());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&DriftSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(DriftSeverity::Low.to_string(), "low");
    }
}
