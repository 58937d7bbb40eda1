//! Structural emptiness: matched blocks whose body has too few children

use super::{CheckContext, EmptinessSpec, RuleError, MIN_CHILDREN_PROPERTY};
use crate::diagnostics::IssueSink;
use crate::parser::Node;
use crate::query::SearchScope;

const TYPE_DELIMITER: char = ':';

pub(super) fn check(
    spec: &EmptinessSpec,
    ctx: &CheckContext<'_>,
    sink: &mut IssueSink,
) -> Result<(), RuleError> {
    let workflow = ctx.workflow()?;

    let raw = ctx.property(MIN_CHILDREN_PROPERTY)?;
    let min_children: usize = raw.trim().parse().map_err(|_| RuleError::InvalidProperty {
        property: MIN_CHILDREN_PROPERTY.to_string(),
        value: raw.clone(),
    })?;

    let container = ctx.query(&spec.container)?;
    let body = ctx.query(&spec.body)?;

    for block in workflow.select(&container) {
        let label = block
            .attr(&spec.label_attribute)
            .unwrap_or(block.tag.as_str());

        // Bodies are looked up below this block only, so nested blocks are
        // each reported against their own container.
        for action in workflow.select_from(block, &body, SearchScope::Subtree) {
            if action.children.len() >= min_children {
                continue;
            }

            let message = match spec.type_attribute.as_deref() {
                Some(attribute) => format!(
                    "{} of '{}' for {} '{}' should not be empty.",
                    spec.subject,
                    label,
                    spec.type_label,
                    type_name(action, attribute)?
                ),
                None => format!("{} of '{}' should not be empty.", spec.subject, label),
            };

            sink.report(ctx.issue(message)?.with_line(action.line));
        }
    }

    Ok(())
}

/// Segment after the first colon of a type reference (`s:Exception` -> `Exception`)
fn type_name<'a>(node: &'a Node, attribute: &str) -> Result<&'a str, RuleError> {
    let value = node.attr(attribute).ok_or_else(|| RuleError::MissingAttribute {
        element: node.tag.clone(),
        attribute: attribute.to_string(),
        line: node.line,
    })?;

    value
        .split(TYPE_DELIMITER)
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| RuleError::MissingDelimiter {
            attribute: attribute.to_string(),
            value: value.to_string(),
            delimiter: TYPE_DELIMITER,
            line: node.line,
        })
}
