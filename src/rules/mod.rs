//! Rule kinds and the built-in rule catalogue
//!
//! Every rule is one of a closed set of kinds. A kind is a pure function of
//! the project, the workflow under analysis (for workflow-scoped rules) and
//! the run's property overrides; it reports findings through the sink it is
//! handed and returns [`RuleError`] when it cannot evaluate.

mod emptiness;
mod existence;
mod naming;

use crate::diagnostics::{Issue, IssueSink, Severity, Target};
use crate::parser::WorkflowDocument;
use crate::project::Project;
use crate::query::{Namespaces, Query, QueryError};
use crate::registry::{CheckDescriptor, CheckScope, PropertyOverrides, RegistryError};
use thiserror::Error;

/// Key of the entry-workflow existence rule
pub const MAIN_WORKFLOW_EXISTS: &str = "main-workflow-exists";
/// Key of the empty catch block rule
pub const EMPTY_CATCH: &str = "empty-catch";
/// Key of the variable naming rule
pub const VARIABLE_NAMING: &str = "variable-naming-convention";

/// Minimum number of child elements a body needs
pub const MIN_CHILDREN_PROPERTY: &str = "minChildren";
/// Naming convention regular expression
pub const FORMAT_PROPERTY: &str = "format";

pub const DEFAULT_VARIABLE_FORMAT: &str = r"^[a-z][\w\d]*$";

#[derive(Error, Debug)]
pub enum RuleError {
    #[error(transparent)]
    Property(#[from] RegistryError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("Invalid value '{value}' for property '{property}'")]
    InvalidProperty { property: String, value: String },
    #[error("<{element}> at line {line} has no '{attribute}' attribute")]
    MissingAttribute {
        element: String,
        attribute: String,
        line: usize,
    },
    #[error("'{attribute}' value '{value}' at line {line} has no '{delimiter}' delimiter")]
    MissingDelimiter {
        attribute: String,
        value: String,
        delimiter: char,
        line: usize,
    },
    #[error("Workflow-scoped rule invoked without a workflow")]
    WorkflowRequired,
}

/// What a rule does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// The descriptor's entry workflow must resolve to a loaded workflow
    Existence,
    /// Matched blocks must have a populated body
    StructuralEmptiness(EmptinessSpec),
    /// An attribute of matched elements must satisfy the `format` property
    NamingPattern(NamingSpec),
}

/// Parameters of a structural-emptiness rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptinessSpec {
    /// Query for the blocks to inspect, evaluated over the whole document
    pub container: String,
    /// Query for the bodies, relative to each container
    pub body: String,
    /// Container attribute used to name the block in messages
    pub label_attribute: String,
    /// Body attribute holding a colon-delimited type reference
    pub type_attribute: Option<String>,
    /// Noun for the body in messages (e.g., "Catch block")
    pub subject: String,
    /// Noun for the type reference in messages (e.g., "exception type")
    pub type_label: String,
}

/// Parameters of a naming-pattern rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingSpec {
    pub selector: String,
    pub attribute: String,
    /// Noun for the named element in messages (e.g., "Variable")
    pub subject: String,
    /// Used when the `format` property is blank
    pub default_format: String,
}

/// Everything one rule invocation may look at
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub project: &'a Project,
    /// Workflow under analysis (workflow-scoped rules only)
    pub workflow: Option<&'a WorkflowDocument>,
    pub check: &'a CheckDescriptor,
    pub overrides: &'a PropertyOverrides,
    pub namespaces: &'a Namespaces,
    /// Effective severity for this run
    pub severity: Severity,
}

impl<'a> CheckContext<'a> {
    /// Effective value of one of the rule's properties
    pub fn property(&self, key: &str) -> Result<String, RuleError> {
        Ok(self.check.property_value(key, self.overrides)?)
    }

    pub fn query(&self, text: &str) -> Result<Query, RuleError> {
        Ok(Query::parse(text, self.namespaces)?)
    }

    pub fn workflow(&self) -> Result<&'a WorkflowDocument, RuleError> {
        self.workflow.ok_or(RuleError::WorkflowRequired)
    }

    /// Issue against the workflow under analysis
    pub fn issue(&self, message: impl Into<String>) -> Result<Issue, RuleError> {
        let workflow = self.workflow()?;
        Ok(Issue::new(
            self.check.key.as_str(),
            self.severity,
            Target::Workflow(workflow.identifier().to_string()),
            message,
        ))
    }

    /// Issue against the project descriptor
    pub fn project_issue(&self, message: impl Into<String>) -> Issue {
        Issue::new(
            self.check.key.as_str(),
            self.severity,
            Target::Project(self.project.descriptor_identifier().to_string()),
            message,
        )
    }
}

/// Run the rule described by `ctx.check`
pub fn execute(ctx: &CheckContext<'_>, sink: &mut IssueSink) -> Result<(), RuleError> {
    match &ctx.check.kind {
        RuleKind::Existence => existence::check(ctx, sink),
        RuleKind::StructuralEmptiness(spec) => emptiness::check(spec, ctx, sink),
        RuleKind::NamingPattern(spec) => naming::check(spec, ctx, sink),
    }
}

/// The built-in rules, in registration order
pub fn builtin_checks() -> Vec<CheckDescriptor> {
    vec![
        CheckDescriptor::new(
            MAIN_WORKFLOW_EXISTS,
            "Main workflow should exist",
            CheckScope::Project,
            Severity::Blocker,
            RuleKind::Existence,
        )
        .with_description("Verifies that the main workflow declared in project.json exists and is valid."),
        CheckDescriptor::new(
            EMPTY_CATCH,
            "Catch blocks should not be empty",
            CheckScope::Workflow,
            Severity::Major,
            RuleKind::StructuralEmptiness(EmptinessSpec {
                container: "//xa:TryCatch".to_string(),
                body: "xa:TryCatch.Catches/xa:Catch/xa:ActivityAction".to_string(),
                label_attribute: "DisplayName".to_string(),
                type_attribute: Some("TypeArguments".to_string()),
                subject: "Catch block".to_string(),
                type_label: "exception type".to_string(),
            }),
        )
        .with_description("Checks that the catch blocks of Try Catch activities are not empty.")
        .with_property(
            MIN_CHILDREN_PROPERTY,
            "2",
            "Minimum number of child elements of a catch action (argument plus handler).",
        ),
        CheckDescriptor::new(
            VARIABLE_NAMING,
            "Variables should follow naming convention",
            CheckScope::Workflow,
            Severity::Minor,
            RuleKind::NamingPattern(NamingSpec {
                selector: "//xa:Variable".to_string(),
                attribute: "Name".to_string(),
                subject: "Variable".to_string(),
                default_format: DEFAULT_VARIABLE_FORMAT.to_string(),
            }),
        )
        .with_description("Checks that workflow variables follow naming conventions.")
        .with_property(
            FORMAT_PROPERTY,
            DEFAULT_VARIABLE_FORMAT,
            "Naming convention for variables, as a regular expression.",
        ),
    ]
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_builtin_checks_have_unique_keys() {
        let checks = builtin_checks();
        let mut keys: Vec<&str> = checks.iter().map(|c| c.key.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), checks.len());
    }

    #[test]
    fn test_builtin_queries_compile() {
        let ns = Namespaces::xaml();
        for check in builtin_checks() {
            match &check.kind {
                RuleKind::Existence => {}
                RuleKind::StructuralEmptiness(spec) => {
                    assert!(Query::parse(&spec.container, &ns).is_ok());
                    assert!(Query::parse(&spec.body, &ns).is_ok());
                }
                RuleKind::NamingPattern(spec) => {
                    assert!(Query::parse(&spec.selector, &ns).is_ok());
                }
            }
        }
    }

    #[test]
    fn test_context_issue_targets() {
        let project = project(&[("Flows/Setup.xaml", "<Activity />")]);
        let checks = builtin_checks();
        let overrides = PropertyOverrides::new();
        let namespaces = Namespaces::xaml();

        let ctx = CheckContext {
            project: &project,
            workflow: project.workflows().first(),
            check: &checks[1],
            overrides: &overrides,
            namespaces: &namespaces,
            severity: Severity::Info,
        };

        let issue = ctx.issue("msg").unwrap();
        assert_eq!(issue.target, Target::Workflow("Flows/Setup.xaml".to_string()));
        assert_eq!(issue.rule_key, EMPTY_CATCH);
        assert_eq!(issue.severity, Severity::Info);

        let issue = ctx.project_issue("msg");
        assert_eq!(issue.target, Target::Project("project.json".to_string()));
    }

    #[test]
    fn test_workflow_rule_without_workflow() {
        let project = project(&[("Main.xaml", "<Activity />")]);
        let err = run_rule(VARIABLE_NAMING, &project, None, &PropertyOverrides::new()).unwrap_err();
        assert!(matches!(err, RuleError::WorkflowRequired));
    }

    #[test]
    fn test_unknown_property_is_rule_error() {
        let project = project(&[("Main.xaml", "<Activity />")]);
        let checks = builtin_checks();
        let overrides = PropertyOverrides::new();
        let namespaces = Namespaces::xaml();
        let ctx = CheckContext {
            project: &project,
            workflow: None,
            check: &checks[0],
            overrides: &overrides,
            namespaces: &namespaces,
            severity: Severity::Blocker,
        };

        assert!(matches!(
            ctx.property(FORMAT_PROPERTY),
            Err(RuleError::Property(RegistryError::UnknownProperty { .. }))
        ));
    }
}
