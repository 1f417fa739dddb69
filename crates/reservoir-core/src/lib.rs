pub mod error;
pub mod evaluate;
pub mod labels;
pub mod pool;
pub mod recovery;
pub mod requirement;
pub mod state;
pub mod uninstall;

pub use error::{
    DecodeError, InsufficientResourceError, InvalidRequirementError, MissingFieldError,
};
pub use evaluate::{
    EvaluationOutcome, EvaluationStage, LaunchDraft, LaunchSet, OfferEvaluator, PlacementRule,
};
pub use pool::ResourcePool;
pub use requirement::{
    ExecutorRequirement, RequirementProvider, RequirementTree, ResourceKind, ResourceRequirement,
    TaskRequirement,
};
pub use state::{ArtifactUrls, MemoryStateStore, StateStore};
pub use uninstall::{UninstallListener, UninstallRecorder};

#[cfg(test)]
pub(crate) mod testing;
