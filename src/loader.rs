//! Project loader - reads a project directory from disk

use crate::config::Config;
use crate::project::DESCRIPTOR_FILE_NAME;
use log::debug;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Project descriptor not found: {0}")]
    NotFound(PathBuf),
    #[error("Invalid workflow pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("Failed to scan project directory: {0}")]
    Scan(#[from] glob::GlobError),
}

/// Raw inputs of one project, ready for the check runner
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    /// Project directory
    pub root: PathBuf,
    pub descriptor_identifier: String,
    pub descriptor: String,
    /// `(identifier, source)` pairs, sorted by identifier. Identifiers are
    /// relative to `root` and `/`-separated.
    pub workflows: Vec<(String, String)>,
}

/// Loads a project descriptor and its workflow files
pub struct ProjectLoader<'a> {
    /// Project directory or descriptor path
    path: PathBuf,
    config: Option<&'a Config>,
}

impl<'a> ProjectLoader<'a> {
    /// Create a loader for a project directory or a `project.json` path
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            config: None,
        }
    }

    /// Honor the config's `exclude` patterns
    pub fn with_config(mut self, config: &'a Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn load(&self) -> Result<ProjectFiles, LoaderError> {
        let (root, descriptor_path) = if self.path.is_file() {
            let root = self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (root, self.path.clone())
        } else {
            (self.path.clone(), self.path.join(DESCRIPTOR_FILE_NAME))
        };

        if !descriptor_path.is_file() {
            return Err(LoaderError::NotFound(descriptor_path));
        }
        let descriptor = read_text(&descriptor_path)?;
        let descriptor_identifier = relative_identifier(&root, &descriptor_path);

        let pattern = format!(
            "{}/**/*.xaml",
            glob::Pattern::escape(&root.to_string_lossy())
        );

        let mut workflows = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }

            let identifier = relative_identifier(&root, &path);
            if is_hidden(&identifier) {
                debug!("Skipping hidden workflow {}", identifier);
                continue;
            }
            if self
                .config
                .is_some_and(|config| config.is_file_excluded(Path::new(&identifier)))
            {
                debug!("Excluded {}", identifier);
                continue;
            }

            workflows.push((identifier, read_text(&path)?));
        }
        workflows.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(
            "Loaded {} workflow file(s) from {}",
            workflows.len(),
            root.display()
        );

        Ok(ProjectFiles {
            root,
            descriptor_identifier,
            descriptor,
            workflows,
        })
    }
}

/// Read a file, replacing invalid UTF-8 so the parser reports it
fn read_text(path: &Path) -> Result<String, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn relative_identifier(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Studio keeps caches and settings under dot-directories
fn is_hidden(identifier: &str) -> bool {
    identifier.split('/').any(|part| part.starts_with('.'))
}
