//! Project model - a descriptor plus the workflow documents it owns

use crate::parser::WorkflowDocument;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default identifier of the project descriptor
pub const DESCRIPTOR_FILE_NAME: &str = "project.json";

#[derive(Error, Debug)]
pub enum ProjectLoadError {
    #[error("Failed to parse project descriptor {identifier}: {source}")]
    InvalidDescriptor {
        identifier: String,
        source: serde_json::Error,
    },
    #[error("Project descriptor {identifier} is missing required field '{field}'")]
    MissingField {
        identifier: String,
        field: &'static str,
    },
    #[error("Project contains no workflow files")]
    NoWorkflows,
}

/// Contents of `project.json` that the engine cares about
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDescriptor {
    #[serde(default)]
    pub name: String,
    /// Relative path of the entry workflow
    #[serde(default, rename = "main")]
    pub main_workflow_path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_version: Option<String>,
}

impl ProjectDescriptor {
    /// Parse descriptor JSON; unknown fields are ignored
    pub fn parse(identifier: &str, text: &str) -> Result<Self, ProjectLoadError> {
        let descriptor: Self =
            serde_json::from_str(text).map_err(|source| ProjectLoadError::InvalidDescriptor {
                identifier: identifier.to_string(),
                source,
            })?;

        if descriptor.name.trim().is_empty() {
            return Err(ProjectLoadError::MissingField {
                identifier: identifier.to_string(),
                field: "name",
            });
        }
        if descriptor.main_workflow_path.trim().is_empty() {
            return Err(ProjectLoadError::MissingField {
                identifier: identifier.to_string(),
                field: "main",
            });
        }

        Ok(descriptor)
    }
}

/// A workflow file that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub identifier: String,
    pub message: String,
}

/// A loaded project
#[derive(Debug, Clone)]
pub struct Project {
    descriptor: ProjectDescriptor,
    descriptor_identifier: String,
    workflows: Vec<WorkflowDocument>,
    load_failures: Vec<LoadFailure>,
}

impl Project {
    /// Load a project whose descriptor is identified as `project.json`
    pub fn load<I, S, T>(descriptor_text: &str, workflows: I) -> Result<Self, ProjectLoadError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        Self::load_at(DESCRIPTOR_FILE_NAME, descriptor_text, workflows)
    }

    /// Load a project from descriptor text and `(identifier, source)` workflow pairs.
    ///
    /// Workflows that fail to parse are recorded as load failures; the rest
    /// of the project still loads.
    pub fn load_at<I, S, T>(
        descriptor_identifier: &str,
        descriptor_text: &str,
        workflows: I,
    ) -> Result<Self, ProjectLoadError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: AsRef<str>,
    {
        let descriptor = ProjectDescriptor::parse(descriptor_identifier, descriptor_text)?;

        let mut documents = Vec::new();
        let mut load_failures = Vec::new();
        let mut inputs = 0;

        for (identifier, source) in workflows {
            inputs += 1;
            let identifier = identifier.into();
            match WorkflowDocument::parse(identifier.clone(), source.as_ref()) {
                Ok(doc) => {
                    debug!("Parsed {} ({} elements)", identifier, doc.element_count());
                    documents.push(doc);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", identifier, e);
                    load_failures.push(LoadFailure {
                        identifier,
                        message: e.to_string(),
                    });
                }
            }
        }

        if inputs == 0 {
            return Err(ProjectLoadError::NoWorkflows);
        }

        Ok(Self {
            descriptor,
            descriptor_identifier: descriptor_identifier.to_string(),
            workflows: documents,
            load_failures,
        })
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn descriptor_identifier(&self) -> &str {
        &self.descriptor_identifier
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Parsed workflows in the order they were supplied
    pub fn workflows(&self) -> &[WorkflowDocument] {
        &self.workflows
    }

    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.load_failures
    }

    /// Find a workflow by logical name (`x:Class`), file stem or file name
    pub fn workflow_named(&self, name: &str) -> Option<&WorkflowDocument> {
        self.workflows.iter().find(|wf| {
            wf.name() == name || wf.file_stem() == name || wf.file_name() == name
        })
    }

    /// Find a workflow whose identifier ends with `path` (whole components)
    pub fn workflow_with_path(&self, path: &str) -> Option<&WorkflowDocument> {
        self.workflows
            .iter()
            .find(|wf| path_ends_with(wf.identifier(), path))
    }

    /// Name lookup first, then path suffix lookup
    pub fn resolve_workflow(&self, name_or_path: &str) -> Option<&WorkflowDocument> {
        self.workflow_named(name_or_path)
            .or_else(|| self.workflow_with_path(name_or_path))
    }

    /// The load failure for a workflow path, if that file failed to parse
    pub fn load_failure_for(&self, path: &str) -> Option<&LoadFailure> {
        self.load_failures
            .iter()
            .find(|f| path_ends_with(&f.identifier, path))
    }
}

fn path_components(path: &str) -> Vec<&str> {
    path.split(|c| c == '/' || c == '\\')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

fn path_ends_with(path: &str, suffix: &str) -> bool {
    let suffix = path_components(suffix);
    !suffix.is_empty() && path_components(path).ends_with(&suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "name": "Demo",
        "description": "Demo project",
        "main": "Main.xaml",
        "dependencies": { "UiPath.System.Activities": "[23.4.0]" },
        "projectVersion": "1.0.2"
    }"#;

    fn workflow(class: &str) -> String {
        format!(
            r#"<Activity x:Class="{}" xmlns="http://schemas.microsoft.com/netfx/2009/xaml/activities" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml"><Sequence /></Activity>"#,
            class
        )
    }

    #[test]
    fn test_parse_descriptor_ignores_extra_fields() {
        let descriptor = ProjectDescriptor::parse("project.json", DESCRIPTOR).unwrap();
        assert_eq!(descriptor.name, "Demo");
        assert_eq!(descriptor.main_workflow_path, "Main.xaml");
        assert_eq!(descriptor.description.as_deref(), Some("Demo project"));
        assert_eq!(descriptor.project_version.as_deref(), Some("1.0.2"));
    }

    #[test]
    fn test_descriptor_missing_main() {
        let err = ProjectDescriptor::parse("project.json", r#"{"name": "Demo"}"#).unwrap_err();
        assert!(matches!(err, ProjectLoadError::MissingField { field: "main", .. }));
    }

    #[test]
    fn test_descriptor_blank_name() {
        let err =
            ProjectDescriptor::parse("project.json", r#"{"name": " ", "main": "Main.xaml"}"#)
                .unwrap_err();
        assert!(matches!(err, ProjectLoadError::MissingField { field: "name", .. }));
    }

    #[test]
    fn test_descriptor_not_json() {
        let err = ProjectDescriptor::parse("project.json", "name: Demo").unwrap_err();
        assert!(matches!(err, ProjectLoadError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("project.json"));
    }

    #[test]
    fn test_load_requires_workflows() {
        let none: Vec<(String, String)> = Vec::new();
        let err = Project::load(DESCRIPTOR, none).unwrap_err();
        assert!(matches!(err, ProjectLoadError::NoWorkflows));
    }

    #[test]
    fn test_load_preserves_order() {
        let project = Project::load(
            DESCRIPTOR,
            vec![
                ("Main.xaml", workflow("Main")),
                ("Flows/Setup.xaml", workflow("Setup")),
            ],
        )
        .unwrap();

        assert_eq!(project.name(), "Demo");
        assert_eq!(project.descriptor_identifier(), DESCRIPTOR_FILE_NAME);
        let ids: Vec<&str> = project.workflows().iter().map(|w| w.identifier()).collect();
        assert_eq!(ids, vec!["Main.xaml", "Flows/Setup.xaml"]);
        assert!(project.load_failures().is_empty());
    }

    #[test]
    fn test_malformed_workflow_is_isolated() {
        let project = Project::load(
            DESCRIPTOR,
            vec![
                ("Main.xaml", workflow("Main")),
                ("Broken.xaml", "<Activity><Sequence></Activity>".to_string()),
                ("Other.xaml", workflow("Other")),
            ],
        )
        .unwrap();

        assert_eq!(project.workflows().len(), 2);
        assert_eq!(project.load_failures().len(), 1);
        assert_eq!(project.load_failures()[0].identifier, "Broken.xaml");
        assert!(project.load_failure_for("Broken.xaml").is_some());
        assert!(project.load_failure_for("Main.xaml").is_none());
    }

    #[test]
    fn test_all_workflows_malformed_still_loads() {
        let project = Project::load(DESCRIPTOR, vec![("Main.xaml", "<Activity>")]).unwrap();
        assert!(project.workflows().is_empty());
        assert_eq!(project.load_failures().len(), 1);
    }

    #[test]
    fn test_workflow_named() {
        let project = Project::load(
            DESCRIPTOR,
            vec![
                ("Flows/InitAllSettings.xaml", workflow("InitSettings")),
                ("Plain.xaml", "<Activity />".to_string()),
            ],
        )
        .unwrap();

        assert!(project.workflow_named("InitSettings").is_some());
        assert!(project.workflow_named("InitAllSettings").is_some());
        assert!(project.workflow_named("Plain").is_some());
        assert!(project.workflow_named("plain").is_none()); // case-sensitive
        assert!(project.workflow_named("Missing").is_none());
    }

    #[test]
    fn test_workflow_named_by_file_name() {
        let project = Project::load(DESCRIPTOR, vec![("Flows/Main.xaml", workflow("Entry"))]).unwrap();

        let found = project.workflow_named("Main.xaml").unwrap();
        assert_eq!(found.identifier(), "Flows/Main.xaml");
        assert!(project.workflow_named("Flows/Main.xaml").is_none());
        assert!(project.workflow_named("Missing").is_none());
    }

    #[test]
    fn test_workflow_with_path() {
        let project = Project::load(
            DESCRIPTOR,
            vec![("Flows/Sub/Setup.xaml", workflow("Setup"))],
        )
        .unwrap();

        assert!(project.workflow_with_path("Setup.xaml").is_some());
        assert!(project.workflow_with_path("Sub/Setup.xaml").is_some());
        assert!(project.workflow_with_path(r"Flows\Sub\Setup.xaml").is_some());
        assert!(project.workflow_with_path("./Flows/Sub/Setup.xaml").is_some());
        assert!(project.workflow_with_path("etup.xaml").is_none());
        assert!(project.workflow_with_path("Other/Setup.xaml").is_none());
        assert!(project.workflow_with_path("").is_none());
    }

    #[test]
    fn test_resolve_first_supplied_match() {
        let project = Project::load(
            DESCRIPTOR,
            vec![
                ("A/Main.xaml", workflow("Entry")),
                ("B/Other.xaml", workflow("Main.xaml")),
            ],
        )
        .unwrap();

        // A/Main.xaml matches by file name and comes first
        let resolved = project.resolve_workflow("Main.xaml").unwrap();
        assert_eq!(resolved.identifier(), "A/Main.xaml");

        let resolved = project.resolve_workflow("Other").unwrap();
        assert_eq!(resolved.identifier(), "B/Other.xaml");

        let resolved = project.resolve_workflow("A/Main.xaml").unwrap();
        assert_eq!(resolved.identifier(), "A/Main.xaml");

        assert!(project.resolve_workflow("Nope.xaml").is_none());
    }
}
