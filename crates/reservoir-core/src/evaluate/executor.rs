use reservoir_model::ExecutorRecord;

use crate::evaluate::{EvaluationOutcome, volume};
use crate::pool::ResourcePool;
use crate::requirement::ExecutorRequirement;

/// Match the pod-level executor.
///
/// A still-running executor passes through untouched. A fresh one must have
/// its pod-wide volumes covered by the offer before the round can succeed.
pub(crate) fn evaluate(
    requirement: &ExecutorRequirement,
    pool: &mut ResourcePool,
    draft: ExecutorRecord,
) -> (ExecutorRecord, EvaluationOutcome) {
    if requirement.is_existing() {
        let outcome = EvaluationOutcome::pass(
            "Executor",
            format!("reusing running executor '{}'", draft.executor_id),
        );
        return (draft, outcome);
    }

    let mut work = draft.clone();
    // Volumes draw against a scratch copy committed only when all are
    // covered.
    let mut scratch = pool.clone();
    let mut children = Vec::new();
    for volume_requirement in &requirement.volumes {
        let (resource, outcome) = volume::fulfill(volume_requirement, &mut scratch);
        let failed = !outcome.passed();
        children.push(outcome);
        match resource {
            Some(resource) if !failed => work.resources.push(resource),
            _ => {
                let parent = EvaluationOutcome::pass("Executor", "new executor")
                    .with_children(children);
                return (draft, parent);
            }
        }
    }

    *pool = scratch;
    let outcome = EvaluationOutcome::pass("Executor", "new executor").with_children(children);
    (work, outcome)
}
