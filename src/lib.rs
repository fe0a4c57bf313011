//! Named boolean feature toggles with locally persisted overrides.
//!
//! Features are declared on a [`FeatureContainer`], labeled and keyed by a
//! [`FeatureRegistry`], and resolve their state as
//! override-before-default. Overrides are loaded from and written back to a
//! [`FeatureStore`].

mod container;
mod dynamic_registry;
mod error;
mod feature;
mod labeled;
mod override_state;
pub mod query;
mod registry;
pub mod storage;
pub mod testing;

#[cfg(test)]
mod test;

pub use container::{Declaration, Declared, FeatureContainer, FeatureGroup, extract};
pub use dynamic_registry::DynamicFeatureRegistry;
pub use error::Error;
pub use feature::{Builder, ComputedDefault, DefaultState, Feature};
pub use labeled::{LabeledFeature, LabeledGroup, LabeledItem, un_camel_case};
pub use override_state::OverrideState;
pub use query::{FeatureFilter, Scope};
pub use registry::FeatureRegistry;
pub use storage::FeatureStore;
