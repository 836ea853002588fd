//! Fixed drift classification rules
//!
//! Severity is a pure function of impact level; effort and manual review
//! are aggregate rules over all drifts of one file.

use super::{DocumentationDrift, DriftSeverity, EffortEstimate};
use crate::extract::ImpactLevel;

/// More high-severity drifts than this make the effort high
const HIGH_DRIFTS_FOR_HIGH_EFFORT: usize = 5;

/// More drifts than this make the effort at least medium
const DRIFTS_FOR_MEDIUM_EFFORT: usize = 10;

/// Severity of a drift caused by a change of the given impact
pub fn severity_for(impact: ImpactLevel) -> DriftSeverity {
    match impact {
        ImpactLevel::Breaking => DriftSeverity::Critical,
        ImpactLevel::Major => DriftSeverity::High,
        ImpactLevel::Minor => DriftSeverity::Medium,
        ImpactLevel::Patch => DriftSeverity::Low,
    }
}

pub fn estimate_effort(drifts: &[DocumentationDrift]) -> EffortEstimate {
    let critical = drifts
        .iter()
        .any(|d| d.severity == DriftSeverity::Critical);
    let high = drifts
        .iter()
        .filter(|d| d.severity == DriftSeverity::High)
        .count();

    if critical || high > HIGH_DRIFTS_FOR_HIGH_EFFORT {
        EffortEstimate::High
    } else if high > 0 || drifts.len() > DRIFTS_FOR_MEDIUM_EFFORT {
        EffortEstimate::Medium
    } else {
        EffortEstimate::Low
    }
}

/// Critical or high drifts need a human, as do drifts no document points at
pub fn requires_manual_review(drifts: &[DocumentationDrift]) -> bool {
    drifts
        .iter()
        .any(|d| d.severity >= DriftSeverity::High || d.affected_docs.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{CodeDiff, DiffCategory, DiffKind};

    fn drift(impact: ImpactLevel, documented: bool) -> DocumentationDrift {
        DocumentationDrift {
            file_path: "src/a.ts".to_string(),
            diff: CodeDiff {
                kind: DiffKind::Modified,
                category: DiffCategory::Function,
                symbol_name: "f".to_string(),
                details: String::new(),
                old_signature: None,
                new_signature: None,
                impact_level: impact,
            },
            severity: severity_for(impact),
            description: String::new(),
            affected_docs: if documented {
                vec!["docs/a.md".to_string()]
            } else {
                Vec::new()
            },
            affected_sections: Vec::new(),
        }
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_for(ImpactLevel::Breaking), DriftSeverity::Critical);
        assert_eq!(severity_for(ImpactLevel::Major), DriftSeverity::High);
        assert_eq!(severity_for(ImpactLevel::Minor), DriftSeverity::Medium);
        assert_eq!(severity_for(ImpactLevel::Patch), DriftSeverity::Low);
    }

    #[test]
    fn test_effort_estimate() {
        assert_eq!(estimate_effort(&[]), EffortEstimate::Low);
        assert_eq!(
            estimate_effort(&[drift(ImpactLevel::Breaking, true)]),
            EffortEstimate::High
        );
        assert_eq!(
            estimate_effort(&[drift(ImpactLevel::Major, true)]),
            EffortEstimate::Medium
        );

        let six_high: Vec<_> = (0..6).map(|_| drift(ImpactLevel::Major, true)).collect();
        assert_eq!(estimate_effort(&six_high), EffortEstimate::High);

        let eleven_patch: Vec<_> = (0..11).map(|_| drift(ImpactLevel::Patch, true)).collect();
        assert_eq!(estimate_effort(&eleven_patch), EffortEstimate::Medium);

        let ten_minor: Vec<_> = (0..10).map(|_| drift(ImpactLevel::Minor, true)).collect();
        assert_eq!(estimate_effort(&ten_minor), EffortEstimate::Low);
    }

    #[test]
    fn test_manual_review() {
        assert!(!requires_manual_review(&[drift(ImpactLevel::Minor, true)]));
        assert!(requires_manual_review(&[drift(ImpactLevel::Major, true)]));
        assert!(requires_manual_review(&[drift(ImpactLevel::Patch, false)]));
    }
}
