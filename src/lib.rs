//! xaml-lint: A rule engine for XAML automation workflow projects
//!
//! This library loads a project (a `project.json` descriptor plus its XAML
//! workflows), runs project-scoped and workflow-scoped rules over it, and
//! collects the issues they report.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod loader;
pub mod output;
pub mod parser;
pub mod project;
pub mod query;
pub mod registry;
pub mod rules;

pub use config::{CliOptions, Config, ConfigError, PerFileIgnores};
pub use diagnostics::{Issue, IssueSink, RuleFailure, Severity, Target};
pub use engine::{AnalysisReport, CheckRunner, RunError, RunState};
pub use loader::{LoaderError, ProjectFiles, ProjectLoader};
pub use parser::{Node, ParseError, WorkflowDocument};
pub use project::{LoadFailure, Project, ProjectDescriptor, ProjectLoadError};
pub use query::{Namespaces, Query, QueryError, SearchScope};
pub use registry::{CheckDescriptor, CheckRegistry, CheckScope, PropertyOverrides, RegistryError};
pub use rules::{RuleError, RuleKind};
