//! Output formatters for analysis reports

use crate::diagnostics::Severity;
use crate::engine::AnalysisReport;
use crate::registry::CheckRegistry;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Render a report in human-readable text format
pub fn format_text(report: &AnalysisReport, color: bool) -> String {
    let mut out = String::new();

    for issue in &report.issues {
        let severity = if color {
            issue.severity.colored()
        } else {
            issue.severity.as_str().to_string()
        };

        // Header: severity[rule-key]: message
        let _ = writeln!(out, "{}[{}]: {}", severity, issue.rule_key, issue.message);

        // Location: --> target[:line]
        let arrow = if color { "\x1b[1;34m-->\x1b[0m" } else { "-->" };
        match issue.line {
            Some(line) => {
                let _ = writeln!(out, "  {} {}:{}", arrow, issue.target, line);
            }
            None => {
                let _ = writeln!(out, "  {} {}", arrow, issue.target);
            }
        }
        out.push('\n');
    }

    let error = if color { "\x1b[1;31merror\x1b[0m" } else { "error" };
    for failure in &report.rule_failures {
        let _ = writeln!(
            out,
            "{}: rule '{}' failed on {}: {}",
            error, failure.rule_key, failure.target, failure.message
        );
    }
    for failure in &report.load_failures {
        let _ = writeln!(
            out,
            "{}: could not load {}: {}",
            error, failure.identifier, failure.message
        );
    }
    if !report.rule_failures.is_empty() || !report.load_failures.is_empty() {
        out.push('\n');
    }

    let _ = writeln!(out, "{}", summary_line(report));
    out
}

fn summary_line(report: &AnalysisReport) -> String {
    let workflow_word = if report.workflows_analyzed == 1 {
        "workflow"
    } else {
        "workflows"
    };

    if report.issues.is_empty() {
        return format!(
            "No issues found in {} ({} {})",
            report.project_name, report.workflows_analyzed, workflow_word
        );
    }

    let stats = report.statistics();
    let counts: Vec<String> = [
        Severity::Blocker,
        Severity::Major,
        Severity::Minor,
        Severity::Info,
    ]
    .iter()
    .filter(|s| stats.count(**s) > 0)
    .map(|s| format!("{} {}", stats.count(*s), s))
    .collect();

    format!(
        "Found {} issue{} ({}) in {} ({} {})",
        report.issues.len(),
        if report.issues.len() == 1 { "" } else { "s" },
        counts.join(", "),
        report.project_name,
        report.workflows_analyzed,
        workflow_word
    )
}

/// Print a report in text format
pub fn print_text(report: &AnalysisReport, color: bool) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = handle.write_all(format_text(report, color).as_bytes());
}

/// JSON output format
#[derive(Serialize)]
struct JsonOutput<'a> {
    project: &'a str,
    issues: Vec<JsonIssue<'a>>,
    rule_failures: Vec<JsonFailure<'a>>,
    load_failures: Vec<JsonFailure<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonIssue<'a> {
    rule_key: &'a str,
    severity: Severity,
    target: &'a str,
    target_kind: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    rule_key: Option<&'a str>,
    target: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    blocker: usize,
    major: usize,
    minor: usize,
    info: usize,
    rule_failures: usize,
    load_failures: usize,
    workflows: usize,
    executions: usize,
}

/// Format a report as a JSON string
pub fn format_json(report: &AnalysisReport) -> serde_json::Result<String> {
    let stats = report.statistics();

    let output = JsonOutput {
        project: &report.project_name,
        issues: report
            .issues
            .iter()
            .map(|i| JsonIssue {
                rule_key: &i.rule_key,
                severity: i.severity,
                target: i.target.identifier(),
                target_kind: i.target.kind(),
                message: &i.message,
                line: i.line,
            })
            .collect(),
        rule_failures: report
            .rule_failures
            .iter()
            .map(|f| JsonFailure {
                rule_key: Some(&f.rule_key),
                target: f.target.identifier(),
                message: &f.message,
            })
            .collect(),
        load_failures: report
            .load_failures
            .iter()
            .map(|f| JsonFailure {
                rule_key: None,
                target: &f.identifier,
                message: &f.message,
            })
            .collect(),
        summary: JsonSummary {
            total: report.issues.len(),
            blocker: stats.count(Severity::Blocker),
            major: stats.count(Severity::Major),
            minor: stats.count(Severity::Minor),
            info: stats.count(Severity::Info),
            rule_failures: report.rule_failures.len(),
            load_failures: report.load_failures.len(),
            workflows: report.workflows_analyzed,
            executions: report.executions,
        },
    };

    serde_json::to_string_pretty(&output)
}

/// Print a report in JSON format
pub fn print_json(report: &AnalysisReport) -> io::Result<()> {
    let json = format_json(report)?;
    println!("{}", json);
    Ok(())
}

/// Describe every registered rule and its properties
pub fn format_rules(registry: &CheckRegistry) -> String {
    let mut out = String::new();

    for check in registry.iter() {
        let _ = writeln!(
            out,
            "{} ({}, {}): {}",
            check.key, check.scope, check.severity, check.name
        );
        if !check.description.is_empty() {
            let _ = writeln!(out, "    {}", check.description);
        }
        for property in &check.properties {
            let _ = writeln!(
                out,
                "    {} = {:?}  {}",
                property.key, property.default_value, property.description
            );
        }
    }

    out
}
