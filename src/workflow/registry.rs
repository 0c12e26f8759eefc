use super::prep::PrepareProducts;
use super::step::{StepAction, StepId};
use std::collections::BTreeMap;

/// Actions bound to workflow steps
///
/// The step order is fixed by `StepId`; the registry only decides what runs
/// when a step is reached. Signal-processing steps are supplied by the caller.
#[derive(Default)]
pub struct StepRegistry {
    actions: BTreeMap<StepId, Box<dyn StepAction>>,
}

impl StepRegistry {
    /// Empty registry without any actions
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in product preparation step
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StepId::H5Prep, PrepareProducts);
        registry
    }

    /// Bind an action to a step, replacing any previous binding
    pub fn register<A>(&mut self, step: StepId, action: A) -> &mut Self
    where
        A: StepAction + 'static,
    {
        if self.actions.insert(step, Box::new(action)).is_some() {
            log::debug!("Replaced action for step {}", step);
        }
        self
    }

    pub fn get(&self, step: StepId) -> Option<&dyn StepAction> {
        self.actions.get(&step).map(|action| action.as_ref())
    }

    pub fn contains(&self, step: StepId) -> bool {
        self.actions.contains_key(&step)
    }

    /// Steps that have no action bound
    pub fn missing(&self) -> Vec<StepId> {
        StepId::ALL
            .iter()
            .copied()
            .filter(|step| !self.contains(*step))
            .collect()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
