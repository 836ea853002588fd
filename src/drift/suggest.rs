//! Suggestion generation
//!
//! Every (diff, affected section) pair yields one proposed rewrite of the
//! section. Confidence and auto-applicability are fixed per diff kind; an
//! external feedback source may attach its own score next to them.

use crate::extract::{CodeDiff, DiffKind, DocumentationSection, ImpactLevel};
use serde::{Deserialize, Serialize};
use similar::TextDiff;

const REMOVED_CONFIDENCE: f64 = 0.8;
const ADDED_CONFIDENCE: f64 = 0.6;
const MODIFIED_CONFIDENCE: f64 = 0.7;

/// A proposed documentation edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSuggestion {
    pub id: String,
    pub doc_file: String,
    pub section_heading: String,
    pub symbol_name: String,
    /// Section content the suggestion was computed from
    pub original_content: String,
    pub suggested_content: String,
    pub reasoning: String,
    pub confidence: f64,
    pub auto_applicable: bool,
    /// Score from an external feedback source, independent of `confidence`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_score: Option<f64>,
}

impl DriftSuggestion {
    /// Unified diff from the original to the suggested content
    pub fn unified_diff(&self) -> String {
        TextDiff::from_lines(&self.original_content, &self.suggested_content)
            .unified_diff()
            .context_radius(3)
            .header(&self.doc_file, &format!("{} (suggested)", self.doc_file))
            .to_string()
    }
}

/// External signal (issue trackers, review history) scoring suggestions
pub trait FeedbackSource {
    /// Score for a suggestion, or `None` when the source knows nothing about it
    fn score(&self, suggestion: &DriftSuggestion) -> Option<f64>;
}

/// Attach feedback scores without touching the static confidence
pub fn apply_feedback(suggestions: &mut [DriftSuggestion], source: &dyn FeedbackSource) {
    for suggestion in suggestions {
        suggestion.feedback_score = source.score(suggestion);
    }
}

/// Builds suggestions for drifts
#[derive(Debug, Default)]
pub struct SuggestionGenerator;

impl SuggestionGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Suggestion for one diff against one section; `None` for unchanged diffs
    pub fn suggest(
        &self,
        diff: &CodeDiff,
        doc_file: &str,
        section: &DocumentationSection,
    ) -> Option<DriftSuggestion> {
        let name = &diff.symbol_name;
        let original = section.content.clone();

        let (suggested, reasoning, confidence, auto_applicable) = match diff.kind {
            DiffKind::Removed => {
                let struck = replace_symbol(&original, name, |s| format!("~~{}~~", s));
                let note = format!(
                    "> **Deprecated:** `{}` was removed from the code and should no longer be documented.",
                    name
                );
                (
                    insert_note(&struck, &note),
                    format!(
                        "The {} `{}` no longer exists ({}).",
                        diff.category, name, diff.details
                    ),
                    REMOVED_CONFIDENCE,
                    false,
                )
            }
            DiffKind::Added => {
                let level = (section.level.max(1) + 1).min(6) as usize;
                let mut stub = format!("{}\n\n{} `{}`\n\n", original.trim_end(), "#".repeat(level), name);
                if let Some(signature) = &diff.new_signature {
                    stub.push_str(&format!("```\n{}\n```\n\n", signature));
                }
                stub.push_str(&format!("_Describe the new {} `{}`._\n", diff.category, name));
                (
                    stub,
                    format!(
                        "The {} `{}` was added and is not documented yet.",
                        diff.category, name
                    ),
                    ADDED_CONFIDENCE,
                    false,
                )
            }
            DiffKind::Modified => {
                let substituted = match (&diff.old_signature, &diff.new_signature) {
                    (Some(old), Some(new)) if original.contains(old.as_str()) => {
                        original.replace(old.as_str(), new)
                    }
                    _ => original.clone(),
                };
                let note = format!("> **Updated:** `{}` changed: {}.", name, diff.details);
                (
                    insert_note(&substituted, &note),
                    format!(
                        "The {} `{}` changed ({} impact): {}.",
                        diff.category, name, diff.impact_level, diff.details
                    ),
                    MODIFIED_CONFIDENCE,
                    diff.impact_level == ImpactLevel::Patch,
                )
            }
            DiffKind::Unchanged => return None,
        };

        Some(DriftSuggestion {
            id: uuid::Uuid::new_v4().to_string(),
            doc_file: doc_file.to_string(),
            section_heading: section.heading.clone(),
            symbol_name: name.clone(),
            original_content: original,
            suggested_content: suggested,
            reasoning,
            confidence,
            auto_applicable,
            feedback_score: None,
        })
    }
}

/// Place a note right below the section heading line, or at the top
fn insert_note(content: &str, note: &str) -> String {
    match content.split_once('\n') {
        Some((first, rest)) if first.trim_start().starts_with('#') => {
            format!("{}\n\n{}\n{}", first, note, rest)
        }
        _ if content.trim_start().starts_with('#') => format!("{}\n\n{}\n", content, note),
        _ => format!("{}\n\n{}", note, content),
    }
}

/// Rewrite whole-word occurrences of `name`; a code span holding exactly `name` is rewritten whole
fn replace_symbol(text: &str, name: &str, rewrite: impl Fn(&str) -> String) -> String {
    if name.is_empty() {
        return text.to_string();
    }

    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(name) {
        let before = rest[..pos].chars().next_back();
        let after = rest[pos + name.len()..].chars().next();
        let whole_word = !before.map(is_ident).unwrap_or(false) && !after.map(is_ident).unwrap_or(false);

        if !whole_word {
            out.push_str(&rest[..pos + name.len()]);
        } else if before == Some('`') && after == Some('`') {
            out.push_str(&rest[..pos - 1]);
            out.push_str(&rewrite(&format!("`{}`", name)));
            rest = &rest[pos + name.len() + 1..];
            continue;
        } else {
            out.push_str(&rest[..pos]);
            out.push_str(&rewrite(name));
        }
        rest = &rest[pos + name.len()..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DiffCategory;

    fn section(content: &str) -> DocumentationSection {
        DocumentationSection {
            heading: "add".to_string(),
            level: 2,
            content: content.to_string(),
            start_line: 1,
            end_line: 4,
            referenced_functions: vec!["add".to_string()],
            referenced_types: Vec::new(),
            code_block_symbols: Vec::new(),
        }
    }

    fn diff(kind: DiffKind, impact: ImpactLevel) -> CodeDiff {
        CodeDiff {
            kind,
            category: DiffCategory::Function,
            symbol_name: "add".to_string(),
            details: "parameters changed".to_string(),
            old_signature: Some("add(a, b)".to_string()),
            new_signature: Some("add(a, b, c)".to_string()),
            impact_level: impact,
        }
    }

    #[test]
    fn test_removed_symbol_is_struck_through() {
        let generator = SuggestionGenerator::new();
        let s = generator
            .suggest(
                &diff(DiffKind::Removed, ImpactLevel::Breaking),
                "docs/api.md",
                &section("## add\n\nCall `add` to sum; see address book.\n"),
            )
            .unwrap();

        assert!(s.suggested_content.starts_with("## ~~add~~\n\n> **Deprecated:**"));
        assert!(s.suggested_content.contains("Call ~~`add`~~ to sum"));
        assert!(s.suggested_content.contains("address book"));
        assert_eq!(s.confidence, 0.8);
        assert!(!s.auto_applicable);
    }

    #[test]
    fn test_added_symbol_gets_stub() {
        let generator = SuggestionGenerator::new();
        let s = generator
            .suggest(
                &diff(DiffKind::Added, ImpactLevel::Minor),
                "docs/api.md",
                &section("## Math\n\nHelpers.\n"),
            )
            .unwrap();

        assert!(s.suggested_content.contains("### `add`"));
        assert!(s.suggested_content.contains("add(a, b, c)"));
        assert_eq!(s.confidence, 0.6);
        assert!(!s.auto_applicable);
    }

    #[test]
    fn test_modified_signature_is_substituted() {
        let generator = SuggestionGenerator::new();
        let content = "## add\n\n```\nadd(a, b)\n```\n";

        let s = generator
            .suggest(&diff(DiffKind::Modified, ImpactLevel::Breaking), "docs/api.md", &section(content))
            .unwrap();
        assert!(s.suggested_content.contains("add(a, b, c)"));
        assert!(s.suggested_content.contains("> **Updated:**"));
        assert_eq!(s.confidence, 0.7);
        assert!(!s.auto_applicable);

        let s = generator
            .suggest(&diff(DiffKind::Modified, ImpactLevel::Patch), "docs/api.md", &section(content))
            .unwrap();
        assert!(s.auto_applicable);
    }

    #[test]
    fn test_unchanged_yields_nothing() {
        let generator = SuggestionGenerator::new();
        assert!(generator
            .suggest(&diff(DiffKind::Unchanged, ImpactLevel::Patch), "a.md", &section("x"))
            .is_none());
    }

    #[test]
    fn test_feedback_does_not_touch_confidence() {
        struct Fixed;
        impl FeedbackSource for Fixed {
            fn score(&self, _: &DriftSuggestion) -> Option<f64> {
                Some(-0.25)
            }
        }

        let generator = SuggestionGenerator::new();
        let mut suggestions = vec![generator
            .suggest(&diff(DiffKind::Removed, ImpactLevel::Breaking), "a.md", &section("## add\n"))
            .unwrap()];
        apply_feedback(&mut suggestions, &Fixed);

        assert_eq!(suggestions[0].feedback_score, Some(-0.25));
        assert_eq!(suggestions[0].confidence, 0.8);
    }

    #[test]
    fn test_unified_diff() {
        let generator = SuggestionGenerator::new();
        let s = generator
            .suggest(&diff(DiffKind::Modified, ImpactLevel::Patch), "docs/api.md", &section("## add\n\nadd(a, b)\n"))
            .unwrap();

        let patch = s.unified_diff();
        assert!(patch.contains("--- docs/api.md"));
        assert!(patch.contains("-add(a, b)"));
        assert!(patch.contains("+add(a, b, c)"));
    }
}
