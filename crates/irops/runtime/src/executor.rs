//! Stage executors and the registry the driver looks them up in.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use irops_types::StageId;

use crate::context::ExecutionContext;
use crate::error::StageError;

/// One unit of work in a workflow run.
///
/// Executors read what earlier stages left in the context and write their
/// own results back. Whether a stage decides with fixed rules or by calling
/// out to a model is invisible to the driver.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// The stage this executor handles.
    fn stage(&self) -> StageId;

    /// Run the stage. An `Err` may be retried by the driver, so a failing
    /// executor should leave the context as it found it where it can.
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), StageError>;
}

/// Executors keyed by stage.
#[derive(Clone, Default)]
pub struct StageRegistry {
    executors: HashMap<StageId, Arc<dyn StageExecutor>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any earlier one for the same stage.
    pub fn register(&mut self, executor: Arc<dyn StageExecutor>) -> &mut Self {
        let stage = executor.stage();
        if self.executors.insert(stage, executor).is_some() {
            tracing::debug!(stage = %stage, "Replaced stage executor");
        }
        self
    }

    pub fn with(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.register(executor);
        self
    }

    pub fn get(&self, stage: StageId) -> Option<Arc<dyn StageExecutor>> {
        self.executors.get(&stage).cloned()
    }

    pub fn contains(&self, stage: StageId) -> bool {
        self.executors.contains_key(&stage)
    }

    /// Stages from `sequence` with no executor registered, in order, deduplicated.
    pub fn missing(&self, sequence: &[StageId]) -> Vec<StageId> {
        let mut missing = Vec::new();
        for stage in sequence {
            if !self.contains(*stage) && !missing.contains(stage) {
                missing.push(*stage);
            }
        }
        missing
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stages: Vec<_> = self.executors.keys().map(StageId::as_str).collect();
        stages.sort_unstable();
        f.debug_struct("StageRegistry").field("stages", &stages).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(StageId);

    #[async_trait]
    impl StageExecutor for Noop {
        fn stage(&self) -> StageId {
            self.0
        }

        async fn execute(&self, _ctx: &mut ExecutionContext) -> Result<(), StageError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = StageRegistry::new()
            .with(Arc::new(Noop(StageId::Dispatch)))
            .with(Arc::new(Noop(StageId::Summary)));

        assert!(registry.contains(StageId::Dispatch));
        assert!(registry.get(StageId::Crew).is_none());
        assert_eq!(
            registry.missing(&[StageId::Crew, StageId::Dispatch, StageId::Crew, StageId::Summary]),
            vec![StageId::Crew]
        );
    }

    #[tokio::test]
    async fn test_executor_runs() {
        let registry = StageRegistry::new().with(Arc::new(Noop(StageId::Crew)));
        let executor = registry.get(StageId::Crew).unwrap();
        let mut ctx = ExecutionContext::new();
        assert!(executor.execute(&mut ctx).await.is_ok());
    }
}
