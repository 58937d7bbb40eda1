//! Entry workflow existence

use super::{CheckContext, RuleError};
use crate::diagnostics::IssueSink;

pub(super) fn check(ctx: &CheckContext<'_>, sink: &mut IssueSink) -> Result<(), RuleError> {
    let main = ctx.project.descriptor().main_workflow_path.as_str();

    if ctx.project.resolve_workflow(main).is_some() {
        return Ok(());
    }

    let message = match ctx.project.load_failure_for(main) {
        Some(failure) => format!(
            "Main workflow '{}' is not a valid workflow: {}",
            main, failure.message
        ),
        None => format!("Main workflow '{}' does not exist.", main),
    };
    sink.report(ctx.project_issue(message));

    Ok(())
}
