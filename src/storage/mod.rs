pub mod json_file;
mod memory;
pub use json_file::JsonFile;
pub use memory::Memory;

use std::sync::Arc;

use crate::OverrideState;

/// Key-value persistence for feature overrides.
///
/// A key that was never written reads as [`OverrideState::Default`].
pub trait FeatureStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> Result<OverrideState, Self::Error>;

    fn set(&self, key: &str, state: OverrideState) -> Result<(), Self::Error>;
}

impl<S: FeatureStore> FeatureStore for Arc<S> {
    type Error = S::Error;

    fn get(&self, key: &str) -> Result<OverrideState, Self::Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, state: OverrideState) -> Result<(), Self::Error> {
        (**self).set(key, state)
    }
}
