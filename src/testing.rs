//! Helpers for running code with features temporarily forced on or off.
//!
//! ```rust
//! use feature_overrides::Feature;
//! use feature_overrides::testing::with_feature;
//!
//! let feature = Feature::with_key("articlePreviews", false);
//!
//! with_feature(&feature)
//!     .enabled(|| assert!(feature.enabled()))
//!     .unwrap();
//!
//! assert!(!feature.enabled());
//! ```

use crate::{Error, Feature, OverrideState};

pub fn with_feature(feature: &Feature) -> ForcedFeatures {
    with_features([feature])
}

pub fn with_features<'a>(features: impl IntoIterator<Item = &'a Feature>) -> ForcedFeatures {
    ForcedFeatures {
        features: features.into_iter().cloned().collect(),
    }
}

pub struct ForcedFeatures {
    features: Vec<Feature>,
}

impl ForcedFeatures {
    pub fn enabled<T>(&self, block: impl FnOnce() -> T) -> Result<T, Error> {
        self.run_with_state(OverrideState::Enabled, block)
    }

    pub fn disabled<T>(&self, block: impl FnOnce() -> T) -> Result<T, Error> {
        self.run_with_state(OverrideState::Disabled, block)
    }

    /// Force every feature to `state` while `block` runs. The previous
    /// overrides are put back afterwards, including when `block` panics.
    pub fn run_with_state<T>(
        &self,
        state: OverrideState,
        block: impl FnOnce() -> T,
    ) -> Result<T, Error> {
        let restore = Restore {
            saved: self
                .features
                .iter()
                .map(|f| (f.clone(), f.override_state()))
                .collect(),
            armed: true,
        };

        for feature in &self.features {
            feature.set_override(state)?;
        }

        let out = block();
        restore.finish()?;
        Ok(out)
    }
}

struct Restore {
    saved: Vec<(Feature, OverrideState)>,
    armed: bool,
}

impl Restore {
    fn finish(mut self) -> Result<(), Error> {
        self.armed = false;
        for (feature, state) in &self.saved {
            feature.set_override(*state)?;
        }
        Ok(())
    }
}

impl Drop for Restore {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for (feature, state) in &self.saved {
            if let Err(e) = feature.set_override(*state) {
                tracing::warn!(%e, key = ?feature.key(), "Failed to restore a feature override");
            }
        }
    }
}
