//! Fill in step statuses the test body never reported.

use storyline_schema::story::{ErrorInfo, Status, StoryStep};

/// Resolve every step whose status is still `None`, given the host outcome.
///
/// - passed: unresolved steps passed.
/// - skipped / todo / pending: unresolved steps take that status.
/// - failed: steps before the failing step passed, the failing step failed,
///   steps after it were skipped. The failing step is an already-failed step
///   if there is one, else the unresolved step the error message quotes,
///   else the last unresolved step.
pub(crate) fn resolve_steps(steps: &mut [StoryStep], status: Status, error: Option<&ErrorInfo>) {
    match status {
        Status::Failed => resolve_failed(steps, error),
        other => {
            for step in steps.iter_mut().filter(|s| s.status.is_none()) {
                step.status = Some(other);
            }
        }
    }
}

fn resolve_failed(steps: &mut [StoryStep], error: Option<&ErrorInfo>) {
    let unresolved = |s: &StoryStep| s.status.is_none();
    let failing = steps
        .iter()
        .position(|s| s.status == Some(Status::Failed))
        .or_else(|| {
            let message = error.map(|e| e.message.as_str())?;
            steps
                .iter()
                .position(|s| unresolved(s) && !s.text.is_empty() && message.contains(&s.text))
        })
        .or_else(|| steps.iter().rposition(unresolved));

    let Some(failing) = failing else {
        return;
    };

    for (i, step) in steps.iter_mut().enumerate() {
        if step.status.is_some() {
            continue;
        }
        step.status = Some(match i.cmp(&failing) {
            std::cmp::Ordering::Less => Status::Passed,
            std::cmp::Ordering::Equal => Status::Failed,
            std::cmp::Ordering::Greater => Status::Skipped,
        });
        if i == failing && step.error.is_none() {
            step.error = error.cloned();
        }
    }
}
