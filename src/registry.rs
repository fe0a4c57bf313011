use std::collections::HashMap;
use std::sync::Arc;

use crate::feature::ChangeHandler;
use crate::query::{self, Scope};
use crate::storage::{FeatureStore, Memory};
use crate::{Error, Feature, FeatureContainer, LabeledItem};

/// Owns a feature container, the store backing its overrides, and the
/// labeled tree extracted from it.
///
/// Building the registry assigns every unkeyed feature its label as key,
/// loads each feature's override from the store, and from then on writes
/// every override change back to the store.
///
/// ```rust
/// use feature_overrides::{Declaration, Feature, FeatureContainer, FeatureRegistry, OverrideState};
///
/// #[derive(Default)]
/// struct MyFeatures {
///     new_home_tab: Feature,
/// }
///
/// impl FeatureContainer for MyFeatures {
///     fn declare<'a>(&'a self, declaration: &mut Declaration<'a>) {
///         declaration.feature("newHomeTab", &self.new_home_tab);
///     }
/// }
///
/// let registry = FeatureRegistry::new(MyFeatures::default()).unwrap();
/// assert_eq!(registry.new_home_tab.key(), Some("newHomeTab"));
///
/// registry.new_home_tab.set_override(OverrideState::Enabled).unwrap();
/// assert_eq!(FeatureRegistry::enabled_features(&registry), ["New Home Tab"]);
/// ```
pub struct FeatureRegistry<C, S: FeatureStore = Memory> {
    container: C,
    pub(crate) store: Arc<S>,
    features: Vec<LabeledItem>,
}

impl<C: FeatureContainer> FeatureRegistry<C, Memory> {
    /// Build a registry backed by a fresh in-memory store.
    pub fn new(container: C) -> Result<Self, Error> {
        Self::with_store(container, Memory::default())
    }
}

impl<C: FeatureContainer, S: FeatureStore> FeatureRegistry<C, S> {
    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(skip_all))]
    pub fn with_store(container: C, store: S) -> Result<Self, Error> {
        let store = Arc::new(store);
        let features = crate::extract(&container);

        let handler = write_through(&store);
        configure_items(&features, &*store, &handler)?;

        tracing::debug!(
            features = query::feature_count(&features),
            "Feature registry configured"
        );

        Ok(Self {
            container,
            store,
            features,
        })
    }
}

impl<C, S: FeatureStore> FeatureRegistry<C, S> {
    /// The root-level tree, in declaration order.
    pub fn features(&self) -> &[LabeledItem] {
        &self.features
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn feature(&self, key: &str) -> Option<&Feature> {
        query::find_feature(&self.features, key)
    }

    /// The path-qualified labels of every enabled feature, for example
    /// `["Portrait Videos", "Theme → Dark Mode"]`.
    pub fn enabled_features(registry: &Self) -> Vec<String> {
        query::enabled_features(&registry.features)
    }

    pub fn features_description(&self) -> Vec<String> {
        query::describe(&self.features, Scope::All)
    }

    pub fn enabled_features_description(&self) -> Vec<String> {
        query::describe(&self.features, Scope::Enabled)
    }

    pub fn disabled_features_description(&self) -> Vec<String> {
        query::describe(&self.features, Scope::Disabled)
    }

    pub fn overridden_features_description(&self) -> Vec<String> {
        query::describe(&self.features, Scope::Overridden)
    }
}

impl<C, S: FeatureStore> std::ops::Deref for FeatureRegistry<C, S> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.container
    }
}

impl<C, S: FeatureStore> std::fmt::Debug for FeatureRegistry<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// A change handler persisting the feature's override under its key.
pub(crate) fn write_through<S: FeatureStore>(store: &Arc<S>) -> ChangeHandler {
    let store = Arc::clone(store);
    Arc::new(move |feature: &Feature| -> Result<(), Error> {
        let Some(key) = feature.key() else {
            return Err(Error::MissingKey {
                label: String::new(),
            });
        };
        let state = feature.override_state();
        tracing::trace!(key, %state, "Persisting override");
        store.set(key, state).map_err(Error::store)
    })
}

/// Key the feature, load its stored override, then start persisting changes.
pub(crate) fn configure<S: FeatureStore>(
    feature: &Feature,
    label: &str,
    store: &S,
    handler: &ChangeHandler,
) -> Result<(), Error> {
    let key = feature.assign_key(label)?;
    let state = store.get(key).map_err(Error::store)?;
    tracing::trace!(label, key, %state, "Bootstrapped override");

    feature.bootstrap(state);
    feature.install_handler(handler.clone());
    Ok(())
}

/// Configure every feature in the tree, or none of them.
///
/// Keys are validated and stored overrides read before any feature is
/// touched, so a failure leaves every feature unkeyed and unwired.
fn configure_items<S: FeatureStore>(
    items: &[LabeledItem],
    store: &S,
    handler: &ChangeHandler,
) -> Result<(), Error> {
    let features = query::depth_first_map(items, |_| true, |_, labeled| labeled);

    let mut states = HashMap::new();
    for &labeled in &features {
        let key = labeled.feature().key().unwrap_or(labeled.label());
        if key.is_empty() {
            return Err(Error::MissingKey {
                label: labeled.label().to_string(),
            });
        }
        if !states.contains_key(key) {
            states.insert(key, store.get(key).map_err(Error::store)?);
        }
    }

    for labeled in features {
        let key = labeled.feature().assign_key(labeled.label())?;
        let state = states.get(key).copied().unwrap_or_default();
        tracing::trace!(label = labeled.label(), key, %state, "Bootstrapped override");

        labeled.feature().bootstrap(state);
        labeled.feature().install_handler(handler.clone());
    }
    Ok(())
}
