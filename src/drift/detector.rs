//! Main drift detection engine
//!
//! Coordinates all drift detection activities:
//! - Structural diffing of each file present in both snapshots
//! - Severity classification
//! - Locating affected documentation and generating suggestions

use super::{
    severity_for, AffectedSection, DocumentationDrift, DriftDetectionResult, DriftSeverity,
    ImpactAnalysis, SuggestionGenerator,
};
use crate::extract::{diff_structures, CodeDiff, DocumentationSection, DocumentationSnapshot, FileStructure};
use crate::snapshot::DriftSnapshot;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Documentation touched by one diff: doc file path and its affected sections
type Affected<'a> = (&'a str, Vec<&'a DocumentationSection>);

/// Compares snapshots and turns structural changes into drifts
#[derive(Debug, Default)]
pub struct DriftDetector {
    generator: SuggestionGenerator,
}

impl DriftDetector {
    pub fn new() -> Self {
        Self {
            generator: SuggestionGenerator::new(),
        }
    }

    /// Drift for every file of `new` that also exists in `old`, sorted by path
    ///
    /// Files absent from `old` have nothing to diff against and are skipped.
    pub fn detect(&self, old: &DriftSnapshot, new: &DriftSnapshot) -> Vec<DriftDetectionResult> {
        let mut results: Vec<DriftDetectionResult> = new
            .files
            .par_iter()
            .filter_map(|(path, new_structure)| match old.files.get(path) {
                Some(old_structure) => self.detect_file(path, old_structure, new_structure, &new.docs),
                None => {
                    debug!("Skipping {} (not in baseline snapshot)", path);
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        info!(
            "Drift detection: {} of {} files drifted",
            results.len(),
            new.files.len()
        );
        results
    }

    /// Drift for one file, `None` when its structure did not change
    pub fn detect_file(
        &self,
        path: &str,
        old: &FileStructure,
        new: &FileStructure,
        docs: &BTreeMap<String, DocumentationSnapshot>,
    ) -> Option<DriftDetectionResult> {
        if old.hash == new.hash {
            return None;
        }
        let diffs = diff_structures(old, new);
        if diffs.is_empty() {
            return None;
        }

        let mut drifts = Vec::with_capacity(diffs.len());
        let mut suggestions = Vec::new();

        for diff in diffs {
            let affected = affected_documentation(path, &diff, docs);

            let mut affected_sections = Vec::new();
            for (doc_file, sections) in &affected {
                for section in sections {
                    affected_sections.push(AffectedSection {
                        doc_file: doc_file.to_string(),
                        heading: section.heading.clone(),
                        start_line: section.start_line,
                    });
                    suggestions.extend(self.generator.suggest(&diff, doc_file, section));
                }
            }

            drifts.push(DocumentationDrift {
                file_path: path.to_string(),
                severity: severity_for(diff.impact_level),
                description: format!(
                    "{} {} `{}`: {}",
                    diff.kind, diff.category, diff.symbol_name, diff.details
                ),
                affected_docs: affected.iter().map(|(doc, _)| doc.to_string()).collect(),
                affected_sections,
                diff,
            });
        }

        let severity = drifts
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(DriftSeverity::Low);
        let impact = ImpactAnalysis::from_drifts(&drifts);

        debug!("{}: {} drifts, severity {}", path, drifts.len(), severity);
        Some(DriftDetectionResult {
            file_path: path.to_string(),
            drifts,
            severity,
            suggestions,
            impact,
        })
    }
}

/// Compare two snapshots with the default detector
pub fn detect_drift(old: &DriftSnapshot, new: &DriftSnapshot) -> Vec<DriftDetectionResult> {
    DriftDetector::new().detect(old, new)
}

/// Documents referencing the changed file or symbol
///
/// A document matched only through the file path contributes its first section.
fn affected_documentation<'a>(
    path: &str,
    diff: &CodeDiff,
    docs: &'a BTreeMap<String, DocumentationSnapshot>,
) -> Vec<Affected<'a>> {
    let mut affected = Vec::new();
    for (doc_file, doc) in docs {
        let sections = doc.sections_referencing(&diff.symbol_name);
        if !sections.is_empty() {
            affected.push((doc_file.as_str(), sections));
        } else if doc.references_file(path) {
            affected.push((doc_file.as_str(), doc.sections.iter().take(1).collect()));
        }
    }
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::EffortEstimate;
    use crate::extract::{CodeExtractor, DiffKind, DocExtractor, ImpactLevel};
    use chrono::Utc;
    use std::path::Path;

    fn snapshot(files: &[(&str, &str)], docs: &[(&str, &str)]) -> DriftSnapshot {
        let mut extractor = CodeExtractor::new().unwrap();
        let doc_extractor = DocExtractor::new();
        DriftSnapshot {
            project_path: "/p".to_string(),
            timestamp: Utc::now(),
            git_commit: None,
            files: files
                .iter()
                .map(|(path, src)| (path.to_string(), extractor.extract_file(Path::new(path), src)))
                .collect(),
            docs: docs
                .iter()
                .map(|(path, md)| (path.to_string(), doc_extractor.extract_file(Path::new(path), md)))
                .collect(),
        }
    }

    const DOC: &str = "# Math\n\nIntro.\n\n## Adding\n\nUse `add` to sum numbers.\n";

    #[test]
    fn test_identical_snapshots_have_no_drift() {
        let s = snapshot(
            &[("/p/src/math.ts", "export function add(a, b) { return a + b; }\n")],
            &[("/p/docs/math.md", DOC)],
        );
        assert!(detect_drift(&s, &s).is_empty());
    }

    #[test]
    fn test_exported_parameter_change_is_critical() {
        let old = snapshot(
            &[("/p/src/math.ts", "export function add(a, b) { return a + b; }\n")],
            &[("/p/docs/math.md", DOC)],
        );
        let new = snapshot(
            &[("/p/src/math.ts", "export function add(a, b, c) { return a + b + c; }\n")],
            &[("/p/docs/math.md", DOC)],
        );

        let results = detect_drift(&old, &new);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.severity, DriftSeverity::Critical);
        assert_eq!(result.drifts[0].diff.impact_level, ImpactLevel::Breaking);
        assert_eq!(result.drifts[0].affected_docs, vec!["/p/docs/math.md"]);
        assert_eq!(result.drifts[0].affected_sections[0].heading, "Adding");

        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].section_heading, "Adding");
        assert!(!result.suggestions[0].auto_applicable);

        assert_eq!(result.impact.breaking, 1);
        assert_eq!(result.impact.effort, EffortEstimate::High);
        assert!(result.impact.requires_manual_review);
    }

    #[test]
    fn test_new_files_are_skipped() {
        let old = snapshot(&[], &[]);
        let new = snapshot(&[("/p/src/new.ts", "export function fresh() {}\n")], &[]);

        assert!(detect_drift(&old, &new).is_empty());
    }

    #[test]
    fn test_file_reference_selects_first_section() {
        let doc = "# Utilities\n\nSee [the helpers](../src/util.ts).\n\n## Other\n\nText.\n";
        let old = snapshot(&[("/p/src/util.ts", "function helper() {}\n")], &[("/p/docs/util.md", doc)]);
        let new = snapshot(&[("/p/src/util.ts", "\n")], &[("/p/docs/util.md", doc)]);

        let results = detect_drift(&old, &new);
        let drift = &results[0].drifts[0];
        assert_eq!(drift.diff.kind, DiffKind::Removed);
        assert_eq!(drift.diff.impact_level, ImpactLevel::Minor);
        assert_eq!(drift.severity, DriftSeverity::Medium);
        assert_eq!(drift.affected_sections[0].heading, "Utilities");
        assert_eq!(results[0].impact.effort, EffortEstimate::Low);
        assert!(!results[0].impact.requires_manual_review);
    }

    #[test]
    fn test_undocumented_drift_needs_review() {
        let old = snapshot(&[("/p/src/a.ts", "function a() {}\n")], &[]);
        let new = snapshot(&[("/p/src/a.ts", "function a() {}\nfunction b() {}\n")], &[]);

        let results = detect_drift(&old, &new);
        assert_eq!(results[0].severity, DriftSeverity::Low);
        assert!(results[0].suggestions.is_empty());
        assert!(results[0].impact.requires_manual_review);
    }

    #[test]
    fn test_results_sorted_by_path() {
        let old = snapshot(
            &[("/p/src/b.ts", "function b() {}\n"), ("/p/src/a.ts", "function a() {}\n")],
            &[],
        );
        let new = snapshot(&[("/p/src/b.ts", "\n"), ("/p/src/a.ts", "\n")], &[]);

        let paths: Vec<String> = detect_drift(&old, &new)
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        assert_eq!(paths, vec!["/p/src/a.ts", "/p/src/b.ts"]);
    }
}
