//! Structural queries over workflow element trees
//!
//! A query is a small subset of a path language:
//!
//! - `xa:Variable` - element name, optionally qualified by a declared prefix
//! - `*` / `xa:*` - any element (in a namespace)
//! - `A/B` - `B` elements that are direct children of matching `A` elements
//! - `//B` or `A//B` - `B` elements at any depth
//!
//! Prefixes are resolved against a [`Namespaces`] table when the query is
//! compiled, so matching is by namespace URI and never by the literal prefix
//! used in a workflow file. An unqualified name matches that local name in any
//! namespace.

use crate::parser::Node;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Workflow Foundation activities (the default namespace of XAML workflows)
pub const XAML_ACTIVITIES: &str = "http://schemas.microsoft.com/netfx/2009/xaml/activities";
/// XAML language namespace (`x:Class`, `x:TypeArguments`, ...)
pub const XAML_LANGUAGE: &str = "http://schemas.microsoft.com/winfx/2006/xaml";
/// Designer view state
pub const ACTIVITIES_PRESENTATION: &str =
    "http://schemas.microsoft.com/netfx/2010/xaml/activities/presentation";
/// UiPath activity pack
pub const UIPATH_ACTIVITIES: &str = "http://schemas.uipath.com/workflow/activities";

/// Step syntax: optional `prefix:` then a name or `*`
static STEP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([A-Za-z_][\w.\-]*):)?([A-Za-z_][\w.\-]*|\*)$").unwrap()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Query is empty")]
    Empty,
    #[error("Invalid step '{step}' in query '{query}'")]
    InvalidStep { query: String, step: String },
    #[error("Undeclared namespace prefix '{prefix}' in query '{query}'")]
    UnknownPrefix { query: String, prefix: String },
}

/// Where a query started from a node is allowed to look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// Only the subtree rooted at the starting node
    #[default]
    Subtree,
    /// The whole document, regardless of the starting node
    Document,
}

/// Prefix to namespace URI table used when compiling queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    prefixes: BTreeMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes commonly used by rules over XAML workflows
    pub fn xaml() -> Self {
        Self::new()
            .with("xa", XAML_ACTIVITIES)
            .with("x", XAML_LANGUAGE)
            .with("sap2010", ACTIVITIES_PRESENTATION)
            .with("ui", UIPATH_ACTIVITIES)
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.insert(prefix, uri);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// Namespace URI (None = any namespace)
    namespace: Option<String>,
    /// Local name (None = wildcard)
    name: Option<String>,
}

impl Step {
    fn matches(&self, node: &Node) -> bool {
        if let Some(ref name) = self.name {
            if &node.tag != name {
                return false;
            }
        }
        match self.namespace {
            Some(ref uri) => node.namespace.as_deref() == Some(uri.as_str()),
            None => true,
        }
    }

    /// Collect matches below `context`. `include_self` lets a descendant step
    /// match the context node itself.
    fn collect<'a>(&self, context: &'a Node, include_self: bool, out: &mut Vec<&'a Node>) {
        match self.axis {
            Axis::Child => out.extend(context.children.iter().filter(|c| self.matches(c))),
            Axis::DescendantOrSelf => out.extend(
                context
                    .descendants()
                    .skip(if include_self { 0 } else { 1 })
                    .filter(|n| self.matches(n)),
            ),
        }
    }
}

/// A compiled structural query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    steps: Vec<Step>,
}

impl Query {
    /// Compile a query, resolving prefixes against `namespaces`
    pub fn parse(text: &str, namespaces: &Namespaces) -> Result<Self, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::Empty);
        }

        let mut steps = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            let axis = if let Some(tail) = rest.strip_prefix("//") {
                rest = tail;
                Axis::DescendantOrSelf
            } else {
                rest = rest.strip_prefix('/').unwrap_or(rest);
                Axis::Child
            };

            let end = rest.find('/').unwrap_or(rest.len());
            let (step, tail) = rest.split_at(end);
            steps.push(Self::parse_step(text, step, axis, namespaces)?);
            rest = tail;
        }

        Ok(Self {
            text: text.to_string(),
            steps,
        })
    }

    fn parse_step(
        query: &str,
        step: &str,
        axis: Axis,
        namespaces: &Namespaces,
    ) -> Result<Step, QueryError> {
        let caps = STEP_REGEX
            .captures(step)
            .ok_or_else(|| QueryError::InvalidStep {
                query: query.to_string(),
                step: step.to_string(),
            })?;

        let namespace = match caps.get(1) {
            Some(prefix) => Some(
                namespaces
                    .resolve(prefix.as_str())
                    .ok_or_else(|| QueryError::UnknownPrefix {
                        query: query.to_string(),
                        prefix: prefix.as_str().to_string(),
                    })?
                    .to_string(),
            ),
            None => None,
        };

        let name = match &caps[2] {
            "*" => None,
            name => Some(name.to_string()),
        };

        Ok(Step {
            axis,
            namespace,
            name,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Evaluate against the subtree rooted at `node`.
    ///
    /// A leading name step matches children of `node`; a leading `//` matches
    /// `node` itself or anything below it.
    pub fn select<'a>(&self, node: &'a Node) -> Vec<&'a Node> {
        let mut first = Vec::new();
        if let Some(step) = self.steps.first() {
            step.collect(node, true, &mut first);
        }
        self.continue_from(first)
    }

    /// Evaluate from the document node that owns `root`.
    ///
    /// A leading name step matches the root element itself.
    pub(crate) fn select_document<'a>(&self, root: &'a Node) -> Vec<&'a Node> {
        let mut first = Vec::new();
        if let Some(step) = self.steps.first() {
            match step.axis {
                Axis::Child => {
                    if step.matches(root) {
                        first.push(root);
                    }
                }
                Axis::DescendantOrSelf => step.collect(root, true, &mut first),
            }
        }
        self.continue_from(first)
    }

    fn continue_from<'a>(&self, mut current: Vec<&'a Node>) -> Vec<&'a Node> {
        sort_document_order(&mut current);

        for step in self.steps.iter().skip(1) {
            if current.is_empty() {
                break;
            }
            let mut next = Vec::new();
            for node in &current {
                step.collect(node, false, &mut next);
            }
            sort_document_order(&mut next);
            current = next;
        }

        current
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn sort_document_order(nodes: &mut Vec<&Node>) {
    nodes.sort_by_key(|n| n.order);
    nodes.dedup_by_key(|n| n.order);
}
