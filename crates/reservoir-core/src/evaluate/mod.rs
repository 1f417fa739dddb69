//! The evaluation pipeline: matching a requirement tree against one offer.
//!
//! Evaluation is a pure fold. Stages own the draft they mutate and hand it
//! back with an outcome; nothing observable changes unless the whole round
//! passes, at which point the caller receives a [`LaunchSet`] to persist and
//! hand over for launch.

mod executor;
mod outcome;
mod port;
mod resource;
mod volume;

pub use outcome::EvaluationOutcome;

use std::collections::BTreeSet;

use tracing::{info, warn};

use reservoir_model::{ExecutorRecord, Offer, PortSpec, TaskRecord};

use crate::labels::{TaskLabelReader, TaskLabelWriter};
use crate::pool::ResourcePool;
use crate::requirement::{
    ExecutorRequirement, RequirementTree, ResourceKind, ResourceRequirement,
};

/// Agent-selection predicate applied before any resource matching.
///
/// Rules are opaque to the engine: they only ever see the offer and the tree
/// and answer with an outcome.
pub trait PlacementRule: Send + Sync {
    fn filter(&self, offer: &Offer, tree: &RequirementTree) -> EvaluationOutcome;
}

/// The mutable accumulator one evaluation round folds over: draft task
/// records plus the executor draft.
#[derive(Debug, Clone)]
pub struct LaunchDraft {
    pub tasks: Vec<TaskRecord>,
    pub executor: ExecutorRecord,
}

/// A fully matched round, ready to persist and hand over for launch.
#[derive(Debug, Clone)]
pub struct LaunchSet {
    /// Every draft, including transient footprint tasks.
    pub tasks: Vec<TaskRecord>,
    pub executor: ExecutorRecord,
}

impl LaunchSet {
    /// The tasks to actually launch; footprint-only drafts stay behind as
    /// persisted records.
    pub fn launchable_tasks(&self) -> Vec<&TaskRecord> {
        self.tasks
            .iter()
            .filter(|t| !TaskLabelReader::new(t).is_transient())
            .collect()
    }
}

/// One unit of matching work. A closed set: every way an offer can be
/// interrogated is a variant here.
pub enum EvaluationStage<'a> {
    Placement(&'a dyn PlacementRule),
    Resource {
        task: usize,
        requirement: &'a ResourceRequirement,
    },
    Port {
        task: usize,
        requirement: &'a ResourceRequirement,
        specs: &'a [PortSpec],
    },
    Volume {
        task: usize,
        requirement: &'a ResourceRequirement,
    },
    Executor(&'a ExecutorRequirement),
}

impl EvaluationStage<'_> {
    pub(crate) fn evaluate(
        &self,
        offer: &Offer,
        tree: &RequirementTree,
        pool: &mut ResourcePool,
        claimed: &mut BTreeSet<u64>,
        mut draft: LaunchDraft,
    ) -> (LaunchDraft, EvaluationOutcome) {
        match self {
            EvaluationStage::Placement(rule) => {
                let outcome = rule.filter(offer, tree);
                (draft, outcome)
            }
            EvaluationStage::Resource { task, requirement } => {
                let task_draft = std::mem::take(&mut draft.tasks[*task]);
                let (task_draft, outcome) = resource::evaluate(requirement, pool, task_draft);
                draft.tasks[*task] = task_draft;
                (draft, outcome)
            }
            EvaluationStage::Port {
                task,
                requirement,
                specs,
            } => {
                let task_draft = std::mem::take(&mut draft.tasks[*task]);
                let (task_draft, outcome) =
                    port::evaluate(requirement, specs, offer, pool, claimed, task_draft);
                draft.tasks[*task] = task_draft;
                (draft, outcome)
            }
            EvaluationStage::Volume { task, requirement } => {
                let task_draft = std::mem::take(&mut draft.tasks[*task]);
                let (task_draft, outcome) = volume::evaluate(requirement, pool, task_draft);
                draft.tasks[*task] = task_draft;
                (draft, outcome)
            }
            EvaluationStage::Executor(requirement) => {
                let executor_draft = std::mem::take(&mut draft.executor);
                let (executor_draft, outcome) =
                    executor::evaluate(requirement, pool, executor_draft);
                draft.executor = executor_draft;
                (draft, outcome)
            }
        }
    }
}

/// Matches requirement trees against offers, one round at a time.
pub struct OfferEvaluator;

impl OfferEvaluator {
    /// Run one round: placement first, then each task's demands in order,
    /// then the executor.
    ///
    /// A failed stage short-circuits its own task but not its siblings, so
    /// the returned outcome tree names every shortfall the offer had. The
    /// launch set is only produced when everything passed.
    pub fn evaluate(
        offer: &Offer,
        tree: &RequirementTree,
    ) -> (EvaluationOutcome, Option<LaunchSet>) {
        let mut pool = ResourcePool::new(offer);
        let mut claimed = tree.claimed_ports();
        let mut draft = LaunchDraft {
            tasks: tree.tasks.iter().map(|t| t.draft.clone()).collect(),
            executor: tree.executor.draft.clone(),
        };

        let mut children = Vec::new();

        if let Some(rule) = &tree.placement {
            let stage = EvaluationStage::Placement(rule.as_ref());
            let (next, outcome) = stage.evaluate(offer, tree, &mut pool, &mut claimed, draft);
            draft = next;
            children.push(outcome);
        }

        for (index, task) in tree.tasks.iter().enumerate() {
            let mut task_children = Vec::new();
            for requirement in &task.resources {
                let stage = match &requirement.kind {
                    ResourceKind::Plain => EvaluationStage::Resource {
                        task: index,
                        requirement,
                    },
                    ResourceKind::Ports(specs) => EvaluationStage::Port {
                        task: index,
                        requirement,
                        specs,
                    },
                    ResourceKind::Volume(_) => EvaluationStage::Volume {
                        task: index,
                        requirement,
                    },
                };
                let (next, outcome) = stage.evaluate(offer, tree, &mut pool, &mut claimed, draft);
                draft = next;
                let failed = !outcome.passed();
                task_children.push(outcome);
                if failed {
                    // The rest of this task is moot; siblings still run so
                    // the outcome tree names every shortfall.
                    break;
                }
            }
            children.push(
                EvaluationOutcome::pass(task.name(), "task demands").with_children(task_children),
            );
        }

        let stage = EvaluationStage::Executor(&tree.executor);
        let (next, outcome) = stage.evaluate(offer, tree, &mut pool, &mut claimed, draft);
        draft = next;
        children.push(outcome);

        let overall = EvaluationOutcome::pass(&tree.name(), format!("offer '{}'", offer.id))
            .with_children(children);

        if !overall.passed() {
            warn!(pod = %tree.name(), offer = %offer.id, "offer rejected\n{overall}");
            return (overall, None);
        }

        info!(pod = %tree.name(), offer = %offer.id, "offer matched");
        let executor = draft.executor;
        let tasks = draft
            .tasks
            .into_iter()
            .map(|mut task| {
                task.labels = TaskLabelWriter::from_task(&task).set_offer(offer).build();
                task.agent_id = offer.agent_id.clone();
                task.executor = Some(executor.clone());
                task
            })
            .collect();
        (overall, Some(LaunchSet { tasks, executor }))
    }
}
