//! Check registry - rule descriptors, property schemas and per-run overrides

use crate::diagnostics::Severity;
use crate::rules::{self, RuleKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Rule '{0}' is already registered")]
    DuplicateRule(String),
    #[error("Unknown rule '{0}'")]
    UnknownRule(String),
    #[error("Rule '{rule}' has no property '{property}'")]
    UnknownProperty { rule: String, property: String },
}

/// Whether a rule runs once per project or once per workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckScope {
    Project,
    Workflow,
}

impl fmt::Display for CheckScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckScope::Project => write!(f, "project"),
            CheckScope::Workflow => write!(f, "workflow"),
        }
    }
}

/// A configurable rule property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub key: String,
    pub default_value: String,
    pub description: String,
}

/// Static description of a registered rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDescriptor {
    /// Unique rule key (e.g., "empty-catch")
    pub key: String,
    /// Human-readable name
    pub name: String,
    /// Detailed description
    pub description: String,
    /// Default severity
    pub severity: Severity,
    pub scope: CheckScope,
    /// Declared properties, in declaration order
    pub properties: Vec<PropertyDef>,
    /// What the rule does
    pub kind: RuleKind,
}

impl CheckDescriptor {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        scope: CheckScope,
        severity: Severity,
        kind: RuleKind,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            severity,
            scope,
            properties: Vec::new(),
            kind,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a property with its default value
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        default_value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.properties.push(PropertyDef {
            key: key.into(),
            default_value: default_value.into(),
            description: description.into(),
        });
        self
    }

    pub fn property(&self, key: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// Override for this rule if present, else the declared default
    pub fn property_value(
        &self,
        key: &str,
        overrides: &PropertyOverrides,
    ) -> Result<String, RegistryError> {
        let def = self
            .property(key)
            .ok_or_else(|| RegistryError::UnknownProperty {
                rule: self.key.clone(),
                property: key.to_string(),
            })?;

        Ok(overrides
            .get(&self.key, key)
            .unwrap_or(&def.default_value)
            .to_string())
    }
}

/// Per-run property values: rule key -> (property key -> value)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyOverrides(BTreeMap<String, BTreeMap<String, String>>);

impl PropertyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        rule: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.0
            .entry(rule.into())
            .or_default()
            .insert(property.into(), value.into());
    }

    pub fn with(
        mut self,
        rule: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set(rule, property, value);
        self
    }

    pub fn get(&self, rule: &str, property: &str) -> Option<&str> {
        self.0
            .get(rule)
            .and_then(|props| props.get(property))
            .map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|props| props.is_empty())
    }

    /// Iterate `(rule, property, value)` triples
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.0.iter().flat_map(|(rule, props)| {
            props
                .iter()
                .map(move |(prop, value)| (rule.as_str(), prop.as_str(), value.as_str()))
        })
    }

    /// Apply every value of `other` on top of this set
    pub fn merge(&mut self, other: PropertyOverrides) {
        for (rule, props) in other.0 {
            self.0.entry(rule).or_default().extend(props);
        }
    }
}

/// The catalogue of available rules, in registration order
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<CheckDescriptor>,
}

impl CheckRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in rules
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for check in rules::builtin_checks() {
            registry.register(check)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, check: CheckDescriptor) -> Result<(), RegistryError> {
        if self.get(&check.key).is_some() {
            return Err(RegistryError::DuplicateRule(check.key));
        }
        self.checks.push(check);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CheckDescriptor> {
        self.checks.iter().find(|c| c.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckDescriptor> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn project_checks(&self) -> impl Iterator<Item = &CheckDescriptor> {
        self.checks.iter().filter(|c| c.scope == CheckScope::Project)
    }

    pub fn workflow_checks(&self) -> impl Iterator<Item = &CheckDescriptor> {
        self.checks.iter().filter(|c| c.scope == CheckScope::Workflow)
    }

    /// Resolve a property value for one run
    pub fn effective_property(
        &self,
        rule: &str,
        property: &str,
        overrides: &PropertyOverrides,
    ) -> Result<String, RegistryError> {
        self.get(rule)
            .ok_or_else(|| RegistryError::UnknownRule(rule.to_string()))?
            .property_value(property, overrides)
    }

    /// Reject overrides that name unknown rules or undeclared properties
    pub fn validate_overrides(&self, overrides: &PropertyOverrides) -> Result<(), RegistryError> {
        for (rule, property, _) in overrides.iter() {
            let check = self
                .get(rule)
                .ok_or_else(|| RegistryError::UnknownRule(rule.to_string()))?;
            if check.property(property).is_none() {
                return Err(RegistryError::UnknownProperty {
                    rule: rule.to_string(),
                    property: property.to_string(),
                });
            }
        }
        Ok(())
    }
}
