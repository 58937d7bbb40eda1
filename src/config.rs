//! Configuration handling for xaml-lint

use crate::diagnostics::Severity;
use crate::registry::PropertyOverrides;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file names, in lookup order
pub const CONFIG_FILE_NAMES: [&str; 5] = [
    ".xamllintrc.json",
    ".xamllintrc.yaml",
    ".xamllintrc.yml",
    "xamllint.json",
    "xamllint.yaml",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse JSON config: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("Failed to parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(#[from] globset::Error),
    #[error("Invalid severity '{severity}' for rule '{rule}'")]
    InvalidSeverity { rule: String, severity: String },
    #[error("Invalid property override '{0}' (expected RULE.PROPERTY=VALUE)")]
    InvalidOverride(String),
}

/// Configuration for one analysis run
#[derive(Debug, Clone)]
pub struct Config {
    /// Only run these rules (if Some)
    pub enabled_rules: Option<Vec<String>>,
    /// Skip these rules
    pub disabled_rules: Vec<String>,
    /// Per-run rule property values
    pub properties: PropertyOverrides,
    /// Workflow patterns to exclude from loading
    pub exclude_patterns: GlobSet,
    /// Per-file rule ignores (workflow pattern -> disabled rules)
    pub per_file_ignores: PerFileIgnores,
    /// Severity overrides per rule
    pub severity_overrides: HashMap<String, Severity>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled_rules: None,
            disabled_rules: Vec::new(),
            properties: PropertyOverrides::new(),
            exclude_patterns: GlobSet::empty(),
            per_file_ignores: PerFileIgnores::default(),
            severity_overrides: HashMap::new(),
        }
    }
}

/// Workflow patterns mapped to the rules skipped for matching workflows
#[derive(Debug, Clone)]
pub struct PerFileIgnores {
    patterns: GlobSet,
    /// Ignored rules, indexed like `patterns`
    rules: Vec<Vec<String>>,
}

impl Default for PerFileIgnores {
    fn default() -> Self {
        Self {
            patterns: GlobSet::empty(),
            rules: Vec::new(),
        }
    }
}

impl PerFileIgnores {
    /// Compile `(pattern, rules)` entries into a single glob set
    pub fn new<I, P>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (P, Vec<String>)>,
        P: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut rules = Vec::new();
        for (pattern, ignored) in entries {
            builder.add(Glob::new(pattern.as_ref())?);
            rules.push(ignored);
        }

        Ok(Self {
            patterns: builder.build()?,
            rules,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `rule_key` is ignored for the workflow at `file_path`
    pub fn is_ignored(&self, rule_key: &str, file_path: &Path) -> bool {
        self.patterns
            .matches(file_path)
            .into_iter()
            .any(|index| self.rules[index].iter().any(|r| r == rule_key))
    }
}

/// CLI options to merge into config
#[derive(Debug, Default)]
pub struct CliOptions {
    /// Rules to enable (replaces config if set)
    pub enabled_rules: Option<Vec<String>>,
    /// Rules to disable (adds to config)
    pub disabled_rules: Vec<String>,
    /// Property values (override the config file)
    pub properties: PropertyOverrides,
}

/// Configuration file format (.xamllintrc.json or .xamllintrc.yaml)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    /// Rules to enable (if specified, only these run)
    #[serde(default)]
    pub select: Vec<String>,

    /// Rules to ignore/disable
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Severity overrides: {"rule-key": "minor"}
    #[serde(default)]
    pub severity: HashMap<String, String>,

    /// Rule properties: {"rule-key": {"property": "value"}}
    #[serde(default)]
    pub properties: PropertyOverrides,

    /// Workflow patterns to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Per-file rule ignores: {"Tests/**": ["variable-naming-convention"]}
    #[serde(default)]
    pub per_file_ignores: HashMap<String, Vec<String>>,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config_file: ConfigFile = if path.extension().is_some_and(|e| e == "yaml" || e == "yml")
        {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Self::from_config_file(config_file)
    }

    /// Try to find and load config from `start_dir` or any parent
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut current = start_dir.to_path_buf();
        loop {
            for name in &CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = Self::from_file(&config_path)?;
                    return Ok(Some((config_path, config)));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Find the config for a project directory or `project.json` path
    pub fn discover(project_path: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let start_dir = if project_path.is_file() {
            project_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
        } else {
            project_path
        };

        Self::find_and_load(start_dir)
    }

    /// Build config from a ConfigFile
    pub fn from_config_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut exclude_builder = GlobSetBuilder::new();
        for pattern in &file.exclude {
            exclude_builder.add(Glob::new(pattern)?);
        }
        let exclude_patterns = exclude_builder.build()?;

        let mut severity_overrides = HashMap::new();
        for (rule, sev) in &file.severity {
            let severity: Severity = sev.parse().map_err(|_| ConfigError::InvalidSeverity {
                rule: rule.clone(),
                severity: sev.clone(),
            })?;
            severity_overrides.insert(rule.clone(), severity);
        }

        let per_file_ignores = PerFileIgnores::new(file.per_file_ignores)?;

        Ok(Self {
            enabled_rules: if file.select.is_empty() {
                None
            } else {
                Some(file.select)
            },
            disabled_rules: file.ignore,
            properties: file.properties,
            exclude_patterns,
            per_file_ignores,
            severity_overrides,
        })
    }

    /// Merge CLI options into this config (CLI takes precedence)
    pub fn merge_cli(&mut self, opts: CliOptions) {
        if opts.enabled_rules.is_some() {
            self.enabled_rules = opts.enabled_rules;
        }

        self.disabled_rules.extend(opts.disabled_rules);
        self.properties.merge(opts.properties);
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_key: &str) -> bool {
        if self.disabled_rules.iter().any(|r| r == rule_key) {
            return false;
        }

        if let Some(ref enabled) = self.enabled_rules {
            return enabled.iter().any(|r| r == rule_key);
        }

        true
    }

    /// Check if a rule is enabled for a specific workflow
    pub fn is_rule_enabled_for_file(&self, rule_key: &str, file_path: &Path) -> bool {
        if !self.is_rule_enabled(rule_key) {
            return false;
        }

        !self.per_file_ignores.is_ignored(rule_key, file_path)
    }

    /// Check if a workflow file should be excluded
    pub fn is_file_excluded(&self, file_path: &Path) -> bool {
        self.exclude_patterns.is_match(file_path)
    }

    /// Get effective severity for a rule (considering overrides)
    pub fn get_severity(&self, rule_key: &str, default: Severity) -> Severity {
        self.severity_overrides
            .get(rule_key)
            .copied()
            .unwrap_or(default)
    }
}

/// Parse a `RULE.PROPERTY=VALUE` override
pub fn parse_override(text: &str) -> Result<(String, String, String), ConfigError> {
    let invalid = || ConfigError::InvalidOverride(text.to_string());

    let (key, value) = text.split_once('=').ok_or_else(invalid)?;
    let (rule, property) = key.trim().split_once('.').ok_or_else(invalid)?;
    if rule.is_empty() || property.is_empty() {
        return Err(invalid());
    }

    Ok((rule.to_string(), property.to_string(), value.to_string()))
}
