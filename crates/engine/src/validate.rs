//! Declarative cell validation.
//!
//! Rules are declared per column (plus a per-cell `required` metadata flag)
//! and evaluated in declaration order. Evaluation never short-circuits: a
//! cell can accumulate multiple violations, each bucketed by the rule's
//! declared severity. Validation itself never fails: a rule that cannot be
//! evaluated (bad regex, unknown custom rule) is converted into an error
//! issue instead of being silently swallowed.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::column::Column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// The check a rule performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RuleKind {
    /// Content must be non-blank.
    Required,
    /// Content must look like an email address.
    Email,
    /// Content must be an http(s) URL.
    Url,
    /// Content must match the regex.
    Pattern { regex: String },
    /// Numeric content must fall within the bounds (inclusive).
    Range { min: Option<f64>, max: Option<f64> },
    /// Character count must fall within the bounds (inclusive).
    Length { min: Option<usize>, max: Option<usize> },
    /// Named rule resolved through a [`CustomRuleRegistry`].
    Custom { name: String },
}

impl RuleKind {
    /// Short identifier used in issue reports.
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Email => "email",
            RuleKind::Url => "url",
            RuleKind::Pattern { .. } => "pattern",
            RuleKind::Range { .. } => "range",
            RuleKind::Length { .. } => "length",
            RuleKind::Custom { .. } => "custom",
        }
    }
}

/// A validation rule attached to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub kind: RuleKind,
    pub severity: Severity,
    /// Message shown on violation; a default is derived from the kind.
    pub message: Option<String>,
    /// Skip this rule for blank content. `Required` ignores this flag.
    pub ignore_blank: bool,
}

impl ValidationRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            message: None,
            ignore_blank: true,
        }
    }

    pub fn required() -> Self {
        Self::new(RuleKind::Required)
    }

    pub fn email() -> Self {
        Self::new(RuleKind::Email)
    }

    pub fn url() -> Self {
        Self::new(RuleKind::Url)
    }

    pub fn pattern(regex: impl Into<String>) -> Self {
        Self::new(RuleKind::Pattern { regex: regex.into() })
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(RuleKind::Range { min, max })
    }

    pub fn length(min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(RuleKind::Length { min, max })
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(RuleKind::Custom { name: name.into() })
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_ignore_blank(mut self, ignore: bool) -> Self {
        self.ignore_blank = ignore;
        self
    }
}

/// One violation (or evaluation failure) from one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Label of the rule that produced this issue.
    pub rule: String,
    pub severity: Severity,
    pub message: String,
}

/// The outcome of validating one cell.
///
/// `is_valid` is true iff `errors` is empty; warnings and infos never
/// affect validity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub infos: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Info => self.infos.push(issue),
        }
    }

    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.infos.len()
    }
}

/// Resolver for named custom rules, injected by the host application.
pub trait CustomRuleRegistry {
    /// `Ok(true)` = passes, `Ok(false)` = violation, `Err` = the rule
    /// itself could not be evaluated.
    fn evaluate(&self, name: &str, content: &str) -> Result<bool, String>;
}

/// Registry that knows no custom rules; every custom rule becomes an
/// evaluation failure.
pub struct NoCustomRules;

impl CustomRuleRegistry for NoCustomRules {
    fn evaluate(&self, name: &str, _content: &str) -> Result<bool, String> {
        Err(format!("unknown custom rule `{name}`"))
    }
}

/// Validate one cell against its column's rules.
pub fn validate_cell(cell: &Cell, column: &Column) -> ValidationReport {
    validate_cell_with(cell, column, &NoCustomRules)
}

/// Validate one cell, resolving custom rules through `registry`.
pub fn validate_cell_with(cell: &Cell, column: &Column, registry: &dyn CustomRuleRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    let content = cell.content.as_str();
    let blank = content.trim().is_empty();

    // Per-cell required flag behaves like a leading Required rule.
    let cell_required = cell.metadata.as_ref().is_some_and(|m| m.required);
    if cell_required && blank {
        report.push(ValidationIssue {
            rule: "required".to_string(),
            severity: Severity::Error,
            message: "value is required".to_string(),
        });
    }

    for rule in &column.rules {
        evaluate_rule(rule, content, blank, registry, &mut report);
    }

    report.is_valid = report.errors.is_empty();
    report
}

fn evaluate_rule(
    rule: &ValidationRule,
    content: &str,
    blank: bool,
    registry: &dyn CustomRuleRegistry,
    report: &mut ValidationReport,
) {
    let required = matches!(rule.kind, RuleKind::Required);
    if blank && !required && rule.ignore_blank {
        return;
    }

    let outcome: Result<bool, String> = match &rule.kind {
        RuleKind::Required => Ok(!blank),
        RuleKind::Email => Ok(is_email(content)),
        RuleKind::Url => Ok(is_url(content)),
        RuleKind::Pattern { regex } => match Regex::new(regex) {
            Ok(re) => Ok(re.is_match(content)),
            Err(e) => Err(format!("invalid pattern `{regex}`: {e}")),
        },
        RuleKind::Range { min, max } => match content.trim().parse::<f64>() {
            Ok(n) => Ok(min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m)),
            Err(_) => Ok(false),
        },
        RuleKind::Length { min, max } => {
            let len = content.chars().count();
            Ok(min.map_or(true, |m| len >= m) && max.map_or(true, |m| len <= m))
        }
        RuleKind::Custom { name } => registry.evaluate(name, content),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => report.push(ValidationIssue {
            rule: rule.kind.label().to_string(),
            severity: rule.severity,
            message: rule
                .message
                .clone()
                .unwrap_or_else(|| default_message(&rule.kind)),
        }),
        // Rule-evaluation failures are never swallowed: they surface as
        // errors regardless of the rule's declared severity.
        Err(reason) => report.push(ValidationIssue {
            rule: rule.kind.label().to_string(),
            severity: Severity::Error,
            message: format!("rule could not be evaluated: {reason}"),
        }),
    }
}

fn default_message(kind: &RuleKind) -> String {
    match kind {
        RuleKind::Required => "value is required".to_string(),
        RuleKind::Email => "not a valid email address".to_string(),
        RuleKind::Url => "not a valid URL".to_string(),
        RuleKind::Pattern { regex } => format!("does not match pattern `{regex}`"),
        RuleKind::Range { min, max } => match (min, max) {
            (Some(min), Some(max)) => format!("must be between {min} and {max}"),
            (Some(min), None) => format!("must be at least {min}"),
            (None, Some(max)) => format!("must be at most {max}"),
            (None, None) => "out of range".to_string(),
        },
        RuleKind::Length { min, max } => match (min, max) {
            (Some(min), Some(max)) => format!("length must be between {min} and {max}"),
            (Some(min), None) => format!("length must be at least {min}"),
            (None, Some(max)) => format!("length must be at most {max}"),
            (None, None) => "invalid length".to_string(),
        },
        RuleKind::Custom { name } => format!("failed custom rule `{name}`"),
    }
}

fn is_email(content: &str) -> bool {
    // One @, non-empty local part, dot in the domain. Deliberately loose.
    let Some((local, domain)) = content.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !content.trim().contains(char::is_whitespace)
        && content.trim().matches('@').count() == 1
}

fn is_url(content: &str) -> bool {
    let trimmed = content.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}
