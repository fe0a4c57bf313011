use std::collections::HashMap;

use parking_lot::RwLock;

use crate::OverrideState;

/// Overrides kept for the life of the process. Suited to tests.
#[derive(Default, Debug)]
pub struct Memory {
    states: RwLock<HashMap<String, OverrideState>>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl super::FeatureStore for Memory {
    type Error = std::convert::Infallible;

    fn get(&self, key: &str) -> Result<OverrideState, Self::Error> {
        Ok(self.states.read().get(key).copied().unwrap_or_default())
    }

    fn set(&self, key: &str, state: OverrideState) -> Result<(), Self::Error> {
        self.states.write().insert(key.to_string(), state);
        Ok(())
    }
}
