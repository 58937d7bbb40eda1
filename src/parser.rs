//! XAML parser - parses workflow files into a queryable element tree

use crate::query::{Query, SearchScope, XAML_LANGUAGE};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("Failed to parse XML: {0}")]
    ParseXml(#[from] roxmltree::Error),
}

/// A parsed workflow document
#[derive(Debug, Clone)]
pub struct WorkflowDocument {
    /// Path or URI the document was loaded from
    identifier: String,
    /// The root element
    root: Node,
    /// Number of elements in the tree
    element_count: usize,
}

/// An XML attribute with its resolved namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Local name (e.g., "TypeArguments" for `x:TypeArguments`)
    pub name: String,
    /// Namespace URI, if the attribute was prefixed
    pub namespace: Option<String>,
    /// Attribute value
    pub value: String,
}

/// A workflow XML element
#[derive(Debug, Clone)]
pub struct Node {
    /// Local element name (e.g., "TryCatch", "Variable")
    pub tag: String,
    /// Resolved namespace URI
    pub namespace: Option<String>,
    /// Attributes in source order
    pub attributes: Vec<Attribute>,
    /// Child elements in document order
    pub children: Vec<Node>,
    /// Source location
    pub line: usize,
    pub column: usize,
    /// Pre-order position within the owning document
    pub(crate) order: usize,
}

impl WorkflowDocument {
    /// Parse a workflow file, using its path as the identifier
    pub fn parse_file(path: &Path) -> Result<Self, ParseError> {
        let source = fs::read_to_string(path)?;
        Self::parse(path.to_string_lossy(), &source)
    }

    /// Parse workflow XML from a string
    pub fn parse(identifier: impl Into<String>, source: &str) -> Result<Self, ParseError> {
        let doc = roxmltree::Document::parse(source)?;

        fn build(node: roxmltree::Node, next: &mut usize) -> Node {
            let order = *next;
            *next += 1;

            let pos = node.document().text_pos_at(node.range().start);

            let attributes = node
                .attributes()
                .map(|a| Attribute {
                    name: a.name().to_string(),
                    namespace: a.namespace().map(str::to_string),
                    value: a.value().to_string(),
                })
                .collect();

            let children = node
                .children()
                .filter(|child| child.is_element())
                .map(|child| build(child, next))
                .collect();

            Node {
                tag: node.tag_name().name().to_string(),
                namespace: node.tag_name().namespace().map(str::to_string),
                attributes,
                children,
                line: pos.row as usize,
                column: pos.col as usize,
                order,
            }
        }

        let mut element_count = 0;
        let root = build(doc.root_element(), &mut element_count);

        Ok(Self {
            identifier: identifier.into(),
            root,
            element_count,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Logical workflow name: the root's `x:Class` when declared, else the file stem
    pub fn name(&self) -> &str {
        self.root
            .attr_ns(XAML_LANGUAGE, "Class")
            .filter(|class| !class.is_empty())
            .unwrap_or_else(|| self.file_stem())
    }

    /// Last path segment of the identifier (either separator style)
    pub fn file_name(&self) -> &str {
        self.identifier
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.identifier)
    }

    /// File name without its extension
    pub fn file_stem(&self) -> &str {
        let file_name = self.file_name();
        match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file_name,
        }
    }

    /// Evaluate a query from the document root
    pub fn select(&self, query: &Query) -> Vec<&Node> {
        query.select_document(&self.root)
    }

    /// Evaluate a query with an explicit search scope.
    ///
    /// `Subtree` only looks below `node`; `Document` ignores `node` and
    /// searches the whole document.
    pub fn select_from<'a>(&'a self, node: &'a Node, query: &Query, scope: SearchScope) -> Vec<&'a Node> {
        match scope {
            SearchScope::Subtree => query.select(node),
            SearchScope::Document => query.select_document(&self.root),
        }
    }

    /// Iterate over all elements in document order
    pub fn iter(&self) -> Descendants<'_> {
        self.root.descendants()
    }
}

impl Node {
    /// Get an attribute value by local name (first match)
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Get an attribute value by namespace URI and local name
    pub fn attr_ns(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == Some(namespace))
            .map(|a| a.value.as_str())
    }

    /// Check if element has an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Check the element's local name and namespace
    pub fn is(&self, namespace: &str, tag: &str) -> bool {
        self.tag == tag && self.namespace.as_deref() == Some(namespace)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.attr("DisplayName")
    }

    /// This element and everything below it, in document order
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Pre-order iterator over an element subtree
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
