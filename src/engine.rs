//! Check runner - orchestrates one analysis pass over a project

use crate::config::Config;
use crate::diagnostics::{Issue, IssueSink, RuleFailure, Severity, Target};
use crate::parser::WorkflowDocument;
use crate::project::{LoadFailure, Project, ProjectLoadError, DESCRIPTOR_FILE_NAME};
use crate::query::Namespaces;
use crate::registry::{CheckDescriptor, CheckRegistry, RegistryError};
use crate::rules::{self, CheckContext};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Lifecycle of a [`CheckRunner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ProjectLoaded,
    ProjectChecksRun,
    WorkflowChecksRun,
    Complete,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::ProjectLoaded => "project loaded",
            RunState::ProjectChecksRun => "project checks run",
            RunState::WorkflowChecksRun => "workflow checks run",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to load project: {0}")]
    Load(#[from] ProjectLoadError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] RegistryError),
    #[error("Runner is not idle (state: {0})")]
    NotIdle(RunState),
}

/// Statistics about a report
#[derive(Debug, Default, Clone)]
pub struct AnalysisStatistics {
    /// Count per rule key
    pub per_rule: HashMap<String, usize>,
    /// Count per severity
    pub per_severity: HashMap<Severity, usize>,
}

impl AnalysisStatistics {
    /// Record an issue
    pub fn record(&mut self, issue: &Issue) {
        *self.per_rule.entry(issue.rule_key.clone()).or_insert(0) += 1;
        *self.per_severity.entry(issue.severity).or_insert(0) += 1;
    }

    pub fn count(&self, severity: Severity) -> usize {
        *self.per_severity.get(&severity).unwrap_or(&0)
    }
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub project_name: String,
    /// Issues in execution order
    pub issues: Vec<Issue>,
    /// Rule invocations that failed internally
    pub rule_failures: Vec<RuleFailure>,
    /// Workflows that could not be parsed
    pub load_failures: Vec<LoadFailure>,
    /// Number of workflows rules ran against
    pub workflows_analyzed: usize,
    /// Number of rule invocations
    pub executions: usize,
}

impl AnalysisReport {
    /// Count of per-rule internal failures
    pub fn failure_count(&self) -> usize {
        self.rule_failures.len()
    }

    /// No issues and no diagnostics of any kind
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.rule_failures.is_empty() && self.load_failures.is_empty()
    }

    /// Issues attached to one resource
    pub fn issues_for<'a>(&'a self, identifier: &'a str) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues
            .iter()
            .filter(move |i| i.target.identifier() == identifier)
    }

    pub fn statistics(&self) -> AnalysisStatistics {
        let mut stats = AnalysisStatistics::default();
        for issue in &self.issues {
            stats.record(issue);
        }
        stats
    }
}

/// Runs every enabled check of a registry over one project, once
pub struct CheckRunner<'a> {
    registry: &'a CheckRegistry,
    config: Config,
    namespaces: Namespaces,
    state: RunState,
}

impl<'a> CheckRunner<'a> {
    /// Create a runner; `config` carries this run's property overrides
    pub fn new(registry: &'a CheckRegistry, config: Config) -> Self {
        Self {
            registry,
            config,
            namespaces: Namespaces::xaml(),
            state: RunState::Idle,
        }
    }

    /// Replace the prefix table rule queries are compiled against
    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run with the descriptor identified as `project.json`
    pub fn run<I, S, T>(
        &mut self,
        descriptor_text: &str,
        workflows: I,
    ) -> Result<AnalysisReport, RunError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        self.run_at(DESCRIPTOR_FILE_NAME, descriptor_text, workflows)
    }

    /// Load the project, then run project checks and workflow checks
    pub fn run_at<I, S, T>(
        &mut self,
        descriptor_identifier: &str,
        descriptor_text: &str,
        workflows: I,
    ) -> Result<AnalysisReport, RunError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        if self.state != RunState::Idle {
            return Err(RunError::NotIdle(self.state));
        }

        if let Err(e) = self.registry.validate_overrides(&self.config.properties) {
            self.transition(RunState::Failed);
            return Err(e.into());
        }

        let project = match Project::load_at(descriptor_identifier, descriptor_text, workflows) {
            Ok(project) => project,
            Err(e) => {
                self.transition(RunState::Failed);
                return Err(e.into());
            }
        };
        self.transition(RunState::ProjectLoaded);

        let mut report = AnalysisReport {
            project_name: project.name().to_string(),
            issues: Vec::new(),
            rule_failures: Vec::new(),
            load_failures: project.load_failures().to_vec(),
            workflows_analyzed: 0,
            executions: 0,
        };
        let mut sink = IssueSink::new();

        for check in self.registry.project_checks() {
            if self.config.is_rule_enabled(&check.key) {
                self.invoke(check, &project, None, &mut sink, &mut report);
            }
        }
        self.transition(RunState::ProjectChecksRun);

        let workflow_checks: Vec<&CheckDescriptor> = self
            .registry
            .workflow_checks()
            .filter(|check| self.config.is_rule_enabled(&check.key))
            .collect();

        for workflow in project.workflows() {
            let path = Path::new(workflow.identifier());
            for check in &workflow_checks {
                if self.config.is_rule_enabled_for_file(&check.key, path) {
                    self.invoke(check, &project, Some(workflow), &mut sink, &mut report);
                }
            }
            report.workflows_analyzed += 1;
        }
        self.transition(RunState::WorkflowChecksRun);

        report.issues = sink.into_issues();
        self.transition(RunState::Complete);

        info!(
            "Analyzed {}: {} workflow(s), {} issue(s), {} rule failure(s), {} load failure(s)",
            report.project_name,
            report.workflows_analyzed,
            report.issues.len(),
            report.rule_failures.len(),
            report.load_failures.len()
        );

        Ok(report)
    }

    fn transition(&mut self, next: RunState) {
        debug!("Runner state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run one check on one target. Issues are only kept when the check succeeds.
    fn invoke(
        &self,
        check: &CheckDescriptor,
        project: &Project,
        workflow: Option<&WorkflowDocument>,
        sink: &mut IssueSink,
        report: &mut AnalysisReport,
    ) {
        let ctx = CheckContext {
            project,
            workflow,
            check,
            overrides: &self.config.properties,
            namespaces: &self.namespaces,
            severity: self.config.get_severity(&check.key, check.severity),
        };

        let mut local = IssueSink::new();
        report.executions += 1;

        match rules::execute(&ctx, &mut local) {
            Ok(()) => sink.extend(local),
            Err(e) => {
                let target = match workflow {
                    Some(wf) => Target::Workflow(wf.identifier().to_string()),
                    None => Target::Project(project.descriptor_identifier().to_string()),
                };
                warn!("Rule {} failed on {}: {}", check.key, target, e);
                report.rule_failures.push(RuleFailure {
                    rule_key: check.key.clone(),
                    target,
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PerFileIgnores;
    use crate::registry::{CheckScope, PropertyOverrides};
    use crate::rules::{
        NamingSpec, RuleKind, EMPTY_CATCH, FORMAT_PROPERTY, MAIN_WORKFLOW_EXISTS, VARIABLE_NAMING,
    };

    const DESCRIPTOR: &str = r#"{"name": "Demo", "main": "Main.xaml"}"#;

    fn workflow(variables: &[&str], empty_catch: bool) -> String {
        let variables: String = variables
            .iter()
            .map(|n| format!(r#"<Variable x:TypeArguments="x:Int32" Name="{}" />"#, n))
            .collect();
        let try_catch = if empty_catch {
            r#"<TryCatch DisplayName="Try"><TryCatch.Catches><Catch x:TypeArguments="s:Exception"><ActivityAction x:TypeArguments="s:Exception" /></Catch></TryCatch.Catches></TryCatch>"#
        } else {
            ""
        };
        format!(
            r#"<Activity xmlns="http://schemas.microsoft.com/netfx/2009/xaml/activities" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml"><Sequence><Sequence.Variables>{}</Sequence.Variables>{}</Sequence></Activity>"#,
            variables, try_catch
        )
    }

    fn run(registry: &CheckRegistry, config: Config, workflows: &[(&str, String)]) -> AnalysisReport {
        CheckRunner::new(registry, config)
            .run(DESCRIPTOR, workflows.iter().map(|(id, src)| (*id, src.as_str())))
            .unwrap()
    }

    fn keys(report: &AnalysisReport) -> Vec<(String, String)> {
        report
            .issues
            .iter()
            .map(|i| (i.target.identifier().to_string(), i.rule_key.clone()))
            .collect()
    }

    #[test]
    fn test_demo_scenario() {
        let registry = CheckRegistry::builtin().unwrap();
        let report = run(
            &registry,
            Config::default(),
            &[
                ("Main.xaml", workflow(&["count"], false)),
                ("Setup.xaml", workflow(&["Count"], false)),
            ],
        );

        assert_eq!(report.project_name, "Demo");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].rule_key, VARIABLE_NAMING);
        assert_eq!(report.issues[0].target, Target::Workflow("Setup.xaml".to_string()));
        assert!(report.issues[0].message.contains("'Count'"));
        assert_eq!(report.failure_count(), 0);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_execution_order_is_workflow_major() {
        let registry = CheckRegistry::builtin().unwrap();
        let report = run(
            &registry,
            Config::default(),
            &[
                ("A.xaml", workflow(&["Bad"], true)),
                ("B.xaml", workflow(&["Worse"], true)),
            ],
        );

        let expected: Vec<(String, String)> = vec![
            ("project.json", MAIN_WORKFLOW_EXISTS),
            ("A.xaml", EMPTY_CATCH),
            ("A.xaml", VARIABLE_NAMING),
            ("B.xaml", EMPTY_CATCH),
            ("B.xaml", VARIABLE_NAMING),
        ]
        .into_iter()
        .map(|(t, r)| (t.to_string(), r.to_string()))
        .collect();
        assert_eq!(keys(&report), expected);

        // 1 project check + 2 workflows x 2 workflow checks
        assert_eq!(report.executions, 5);
        assert_eq!(report.workflows_analyzed, 2);
    }

    #[test]
    fn test_runs_are_idempotent() {
        let registry = CheckRegistry::builtin().unwrap();
        let workflows = [
            ("Main.xaml", workflow(&["Upper", "lower"], true)),
            ("Other.xaml", workflow(&["ALL"], false)),
        ];

        let first = run(&registry, Config::default(), &workflows);
        let second = run(&registry, Config::default(), &workflows);
        assert_eq!(first, second);
    }

    #[test]
    fn test_overrides_do_not_leak_between_runs() {
        let registry = CheckRegistry::builtin().unwrap();
        let workflows = [("Main.xaml", workflow(&["Count", "Total"], false))];

        let mut pascal = Config::default();
        pascal.properties =
            PropertyOverrides::new().with(VARIABLE_NAMING, FORMAT_PROPERTY, r"^[A-Z][\w\d]*$");

        assert!(run(&registry, pascal, &workflows).issues.is_empty());
        assert_eq!(run(&registry, Config::default(), &workflows).issues.len(), 2);
    }

    #[test]
    fn test_rule_failure_is_isolated() {
        let mut registry = CheckRegistry::new();
        registry
            .register(
                CheckDescriptor::new(
                    "broken",
                    "Broken",
                    CheckScope::Workflow,
                    Severity::Minor,
                    RuleKind::NamingPattern(NamingSpec {
                        selector: "//xa:Variable".to_string(),
                        attribute: "Missing".to_string(),
                        subject: "Variable".to_string(),
                        default_format: ".".to_string(),
                    }),
                )
                .with_property(FORMAT_PROPERTY, "", ""),
            )
            .unwrap();
        for check in rules::builtin_checks() {
            registry.register(check).unwrap();
        }

        let report = run(
            &registry,
            Config::default(),
            &[
                ("Main.xaml", workflow(&["Bad"], false)),
                ("Empty.xaml", workflow(&[], false)),
            ],
        );

        // Fails where there are variables, succeeds (no matches) where there are none
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.rule_failures[0].rule_key, "broken");
        assert_eq!(
            report.rule_failures[0].target,
            Target::Workflow("Main.xaml".to_string())
        );
        // Later rules still ran on the same workflow
        assert_eq!(keys(&report), vec![("Main.xaml".to_string(), VARIABLE_NAMING.to_string())]);
        assert_eq!(report.executions, 1 + 2 * 3);
    }

    #[test]
    fn test_failed_rule_discards_partial_issues() {
        let mut registry = CheckRegistry::new();
        registry
            .register(
                CheckDescriptor::new(
                    "partial",
                    "Partial",
                    CheckScope::Workflow,
                    Severity::Minor,
                    RuleKind::NamingPattern(NamingSpec {
                        selector: "//xa:Variable".to_string(),
                        attribute: "Name".to_string(),
                        subject: "Variable".to_string(),
                        default_format: "^[a-z]".to_string(),
                    }),
                )
                .with_property(FORMAT_PROPERTY, "", ""),
            )
            .unwrap();

        // First variable is reported, second has no Name and faults the rule
        let source = workflow(&["Bad"], false).replace(
            "</Sequence.Variables>",
            r#"<Variable x:TypeArguments="x:Int32" /></Sequence.Variables>"#,
        );
        let report = run(&registry, Config::default(), &[("Main.xaml", source)]);

        assert!(report.issues.is_empty());
        assert_eq!(report.failure_count(), 1);
    }

    #[test]
    fn test_malformed_workflow_partial_failure() {
        let registry = CheckRegistry::builtin().unwrap();
        let report = run(
            &registry,
            Config::default(),
            &[
                ("Main.xaml", workflow(&["Bad"], false)),
                ("Broken.xaml", "<Activity><Sequence></Activity>".to_string()),
            ],
        );

        assert_eq!(report.load_failures.len(), 1);
        assert_eq!(report.load_failures[0].identifier, "Broken.xaml");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.workflows_analyzed, 1);
    }

    #[test]
    fn test_bad_descriptor_fails_run() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut runner = CheckRunner::new(&registry, Config::default());

        let result = runner.run(r#"{"name": "Demo"}"#, vec![("Main.xaml", "<Activity />")]);
        assert!(matches!(result, Err(RunError::Load(_))));
        assert_eq!(runner.state(), RunState::Failed);
    }

    #[test]
    fn test_unknown_override_fails_run() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut config = Config::default();
        config.properties = PropertyOverrides::new().with(VARIABLE_NAMING, "fromat", "x");
        let mut runner = CheckRunner::new(&registry, config);

        let result = runner.run(DESCRIPTOR, vec![("Main.xaml", "<Activity />")]);
        assert!(matches!(
            result,
            Err(RunError::Config(RegistryError::UnknownProperty { .. }))
        ));
        assert_eq!(runner.state(), RunState::Failed);
    }

    #[test]
    fn test_runner_is_single_pass() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut runner = CheckRunner::new(&registry, Config::default());
        assert_eq!(runner.state(), RunState::Idle);

        runner.run(DESCRIPTOR, vec![("Main.xaml", "<Activity />")]).unwrap();
        assert_eq!(runner.state(), RunState::Complete);

        let again = runner.run(DESCRIPTOR, vec![("Main.xaml", "<Activity />")]);
        assert!(matches!(again, Err(RunError::NotIdle(RunState::Complete))));
    }

    #[test]
    fn test_disabled_rules_not_executed() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut config = Config::default();
        config.disabled_rules = vec![VARIABLE_NAMING.to_string()];

        let report = run(&registry, config, &[("Main.xaml", workflow(&["Bad"], true))]);
        assert_eq!(keys(&report), vec![("Main.xaml".to_string(), EMPTY_CATCH.to_string())]);
        assert_eq!(report.executions, 2);
    }

    #[test]
    fn test_per_file_ignores() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut config = Config::default();
        config.per_file_ignores =
            PerFileIgnores::new([("Tests/*.xaml", vec![VARIABLE_NAMING.to_string()])]).unwrap();

        let report = run(
            &registry,
            config,
            &[
                ("Main.xaml", workflow(&["Bad"], false)),
                ("Tests/Case.xaml", workflow(&["Bad"], false)),
            ],
        );
        assert_eq!(keys(&report), vec![("Main.xaml".to_string(), VARIABLE_NAMING.to_string())]);
    }

    #[test]
    fn test_severity_override() {
        let registry = CheckRegistry::builtin().unwrap();
        let mut config = Config::default();
        config
            .severity_overrides
            .insert(VARIABLE_NAMING.to_string(), Severity::Major);

        let report = run(&registry, config, &[("Main.xaml", workflow(&["Bad"], false))]);
        assert_eq!(report.issues[0].severity, Severity::Major);
    }

    #[test]
    fn test_clean_report_and_statistics() {
        let registry = CheckRegistry::builtin().unwrap();
        let report = run(&registry, Config::default(), &[("Main.xaml", workflow(&["ok"], false))]);
        assert!(report.is_clean());

        let report = run(
            &registry,
            Config::default(),
            &[("Setup.xaml", workflow(&["A", "B"], true))],
        );
        let stats = report.statistics();
        assert_eq!(stats.count(Severity::Minor), 2);
        assert_eq!(stats.count(Severity::Major), 1);
        assert_eq!(stats.count(Severity::Blocker), 1);
        assert_eq!(stats.per_rule.get(VARIABLE_NAMING), Some(&2));
        assert_eq!(report.issues_for("Setup.xaml").count(), 3);
    }
}
