//! Naming convention over a selected attribute

use super::{CheckContext, NamingSpec, RuleError, FORMAT_PROPERTY};
use crate::diagnostics::IssueSink;
use regex::Regex;

pub(super) fn check(
    spec: &NamingSpec,
    ctx: &CheckContext<'_>,
    sink: &mut IssueSink,
) -> Result<(), RuleError> {
    let workflow = ctx.workflow()?;

    let mut format = ctx.property(FORMAT_PROPERTY)?;
    if format.trim().is_empty() {
        format = spec.default_format.clone();
    }

    let pattern = Regex::new(&format).map_err(|source| RuleError::InvalidPattern {
        pattern: format.clone(),
        source,
    })?;
    let selector = ctx.query(&spec.selector)?;

    for node in workflow.select(&selector) {
        let name = node
            .attr(&spec.attribute)
            .ok_or_else(|| RuleError::MissingAttribute {
                element: node.tag.clone(),
                attribute: spec.attribute.clone(),
                line: node.line,
            })?;

        // Unanchored search: the pattern only has to occur somewhere in the name
        if !pattern.is_match(name) {
            let message = format!(
                "{} '{}' does not follow convention. {}s should match the format '{}'.",
                spec.subject, name, spec.subject, format
            );
            sink.report(ctx.issue(message)?.with_line(node.line));
        }
    }

    Ok(())
}
