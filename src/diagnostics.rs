//! Issue types and the issue sink

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity level for issues
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational finding
    #[default]
    Info,
    /// Minor style problem
    Minor,
    /// Likely defect
    Major,
    /// The project cannot work as-is
    Blocker,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocker" => Ok(Severity::Blocker),
            "major" => Ok(Severity::Major),
            "minor" => Ok(Severity::Minor),
            "info" => Ok(Severity::Info),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl Severity {
    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Major => "major",
            Severity::Minor => "minor",
            Severity::Info => "info",
        }
    }

    /// Get colored display name for terminal output
    pub fn colored(&self) -> String {
        match self {
            Severity::Blocker => "\x1b[1;35mblocker\x1b[0m".to_string(),
            Severity::Major => "\x1b[1;31mmajor\x1b[0m".to_string(),
            Severity::Minor => "\x1b[1;33mminor\x1b[0m".to_string(),
            Severity::Info => "\x1b[1;36minfo\x1b[0m".to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resource an issue is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The project descriptor file
    Project(String),
    /// A workflow document
    Workflow(String),
}

impl Target {
    pub fn identifier(&self) -> &str {
        match self {
            Target::Project(id) | Target::Workflow(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Project(_) => "project",
            Target::Workflow(_) => "workflow",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// A reported finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Key of the rule that reported this issue
    pub rule_key: String,
    /// Effective severity
    pub severity: Severity,
    /// Resource the issue is attached to
    pub target: Target,
    pub message: String,
    /// Line of the offending element, when there is one
    pub line: Option<usize>,
}

impl Issue {
    /// Create a new issue
    pub fn new(
        rule_key: impl Into<String>,
        severity: Severity,
        target: Target,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            severity,
            target,
            message: message.into(),
            line: None,
        }
    }

    /// Attach a source line
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// A rule that failed internally on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_key: String,
    pub target: Target,
    pub message: String,
}

/// Append-only collection of issues
#[derive(Debug, Default, Clone)]
pub struct IssueSink {
    issues: Vec<Issue>,
}

impl IssueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    /// All issues in report order
    pub fn all(&self) -> &[Issue] {
        &self.issues
    }

    /// Move every issue of `other` to the end of this sink
    pub fn extend(&mut self, other: IssueSink) {
        self.issues.extend(other.issues);
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}
