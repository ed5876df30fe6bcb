//! Validation diagnostics and the report surfaced to agents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use a2e_core::OperationId;

/// How aggressively the validator blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Warnings are promoted to errors.
    Strict,
    /// Errors and warnings are both reported; only errors block.
    #[default]
    Moderate,
    /// Warnings are suppressed from the report.
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub operation_id: Option<OperationId>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            operation_id: None,
            suggestion: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            operation_id: None,
            suggestion: None,
        }
    }

    pub fn for_operation(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Per-kind and per-operation issue counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub by_kind: BTreeMap<String, usize>,
    pub by_operation: BTreeMap<String, usize>,
}

/// The validation report: `{valid, errors, warnings, issues, summary}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: usize,
    pub warnings: usize,
    pub issues: Vec<Diagnostic>,
    pub summary: ReportSummary,
}

impl ValidationReport {
    /// Apply the level knob and assemble the report.
    pub fn from_diagnostics(mut issues: Vec<Diagnostic>, level: ValidationLevel) -> Self {
        match level {
            ValidationLevel::Strict => {
                for issue in &mut issues {
                    issue.severity = Severity::Error;
                }
            }
            ValidationLevel::Moderate => {}
            ValidationLevel::Lenient => {
                issues.retain(|issue| issue.severity == Severity::Error);
            }
        }

        let errors = issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .count();
        let warnings = issues.len() - errors;

        let mut summary = ReportSummary::default();
        for issue in &issues {
            let kind = issue
                .message
                .split(':')
                .next()
                .unwrap_or("Other")
                .trim()
                .to_string();
            *summary.by_kind.entry(kind).or_default() += 1;
            if let Some(op) = &issue.operation_id {
                *summary.by_operation.entry(op.to_string()).or_default() += 1;
            }
        }

        Self {
            valid: errors == 0,
            errors,
            warnings,
            issues,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<Diagnostic> {
        vec![
            Diagnostic::error("Duplicate operation ID: fetch")
                .for_operation(OperationId::new("fetch").unwrap()),
            Diagnostic::warning("Endpoint GET /users not found in API 'user-api' definition"),
        ]
    }

    #[test]
    fn moderate_reports_both_but_only_errors_block() {
        let report = ValidationReport::from_diagnostics(sample(), ValidationLevel::Moderate);
        assert!(!report.valid);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 1);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn strict_promotes_warnings_to_errors() {
        let report = ValidationReport::from_diagnostics(sample(), ValidationLevel::Strict);
        assert_eq!(report.errors, 2);
        assert_eq!(report.warnings, 0);
    }

    #[test]
    fn lenient_suppresses_warnings() {
        let report = ValidationReport::from_diagnostics(sample(), ValidationLevel::Lenient);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.warnings, 0);
        assert!(!report.valid);
    }

    #[test]
    fn warning_only_report_is_valid() {
        let issues = vec![Diagnostic::warning("Loop operation 'scan' has a large bound")];
        let report = ValidationReport::from_diagnostics(issues, ValidationLevel::Moderate);
        assert!(report.valid);
        assert_eq!(report.warnings, 1);
    }

    #[test]
    fn summary_counts_by_kind_and_operation() {
        let report = ValidationReport::from_diagnostics(sample(), ValidationLevel::Moderate);
        assert_eq!(report.summary.by_kind.get("Duplicate operation ID"), Some(&1));
        assert_eq!(report.summary.by_operation.get("fetch"), Some(&1));
    }
}
