//! Findings collected while checking saved chips.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A finding that should be reported to users.
pub trait Diagnostic: Display {
    /// How serious the finding is.
    fn severity(&self) -> Severity;

    /// How to resolve the finding, if there is a known fix.
    fn help(&self) -> Option<String> {
        None
    }
}

/// How serious a finding is.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    /// The chip still loads, but probably not as intended.
    Warning,
    /// The chip will fail to load.
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Findings in the order they were found.
#[derive(Clone, Debug)]
pub struct IssueSet<T> {
    issues: Vec<T>,
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self { issues: Vec::new() }
    }
}

impl<T> IssueSet<T> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over the findings.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.issues.iter()
    }

    /// The number of findings.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if nothing was found.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Records a finding.
    pub fn add(&mut self, issue: T) {
        self.issues.push(issue);
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity() == severity)
            .count()
    }

    /// The number of errors.
    pub fn num_errors(&self) -> usize {
        self.count(Severity::Error)
    }

    /// The number of warnings.
    pub fn num_warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Returns `true` if any finding is an error.
    pub fn has_error(&self) -> bool {
        self.issues.iter().any(|i| i.severity() == Severity::Error)
    }
}
