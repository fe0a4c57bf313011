use crate::feature::ChangeHandler;
use crate::query::{self, Scope};
use crate::registry::{configure, write_through};
use crate::storage::{FeatureStore, Memory};
use crate::{Error, Feature, FeatureContainer, FeatureRegistry, LabeledFeature, LabeledItem};

/// A [`FeatureRegistry`] that also accepts features added at runtime.
///
/// Static and dynamic features share one key namespace. [`features`] lists
/// the static tree first, followed by the dynamic features as root-level
/// items in the order they were first added.
///
/// [`features`]: DynamicFeatureRegistry::features
pub struct DynamicFeatureRegistry<C = (), S: FeatureStore = Memory> {
    registry: FeatureRegistry<C, S>,
    dynamic: Vec<Feature>,
    handler: ChangeHandler,
}

impl<C: FeatureContainer> DynamicFeatureRegistry<C, Memory> {
    pub fn new(container: C) -> Result<Self, Error> {
        Ok(FeatureRegistry::new(container)?.into())
    }
}

impl<C: FeatureContainer, S: FeatureStore> DynamicFeatureRegistry<C, S> {
    pub fn with_store(container: C, store: S) -> Result<Self, Error> {
        Ok(FeatureRegistry::with_store(container, store)?.into())
    }
}

impl<C, S: FeatureStore> From<FeatureRegistry<C, S>> for DynamicFeatureRegistry<C, S> {
    fn from(registry: FeatureRegistry<C, S>) -> Self {
        let handler = write_through(&registry.store);
        Self {
            registry,
            dynamic: Vec::new(),
            handler,
        }
    }
}

impl<C, S: FeatureStore> DynamicFeatureRegistry<C, S> {
    /// Register `feature` under its own key and return the feature now held
    /// at that key.
    ///
    /// Fails if a static feature already uses the key. If a dynamic feature
    /// already uses it, the existing one is kept and returned unless `forced`
    /// is set, in which case `feature` replaces it and the replaced feature
    /// stops writing to the store.
    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(skip(self), fields(key = ?feature.key())))]
    pub fn add(&mut self, feature: Feature, forced: bool) -> Result<Feature, Error> {
        let Some(key) = feature.key().map(str::to_owned) else {
            return Err(Error::MissingKey {
                label: String::new(),
            });
        };

        if query::occupies_key(self.registry.features(), &key) {
            tracing::debug!(key, "Rejected a dynamic feature shadowing a static one");
            return Err(Error::StaticFeatureAlreadyExists { key });
        }

        let existing = self
            .dynamic
            .iter()
            .position(|f| f.key() == Some(key.as_str()));

        match existing {
            Some(index) if !forced => {
                tracing::debug!(key, "Dynamic feature already registered, keeping it");
                return Ok(self.dynamic[index].clone());
            }
            _ => {}
        }

        configure(&feature, &key, &*self.registry.store, &self.handler)?;

        match existing {
            Some(index) => {
                let replaced = std::mem::replace(&mut self.dynamic[index], feature.clone());
                if !Feature::ptr_eq(&replaced, &feature) {
                    replaced.clear_handler();
                }
                tracing::debug!(key, "Replaced a dynamic feature");
            }
            None => {
                tracing::debug!(key, "Added a dynamic feature");
                self.dynamic.push(feature.clone());
            }
        }

        Ok(feature)
    }

    pub fn dynamic_feature(&self, key: &str) -> Option<&Feature> {
        self.dynamic.iter().find(|f| f.key() == Some(key))
    }

    pub fn dynamic_features(&self) -> &[Feature] {
        &self.dynamic
    }

    /// Static features followed by dynamic ones.
    pub fn features(&self) -> Vec<LabeledItem> {
        self.registry
            .features()
            .iter()
            .cloned()
            .chain(self.dynamic.iter().map(|feature| {
                LabeledItem::Feature(LabeledFeature::new(
                    feature.key().unwrap_or_default(),
                    feature.clone(),
                ))
            }))
            .collect()
    }

    /// Look up a static or dynamic feature by key.
    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.registry
            .feature(key)
            .or_else(|| self.dynamic_feature(key))
    }

    pub fn static_registry(&self) -> &FeatureRegistry<C, S> {
        &self.registry
    }

    pub fn container(&self) -> &C {
        self.registry.container()
    }

    pub fn store(&self) -> &S {
        self.registry.store()
    }

    pub fn enabled_features(registry: &Self) -> Vec<String> {
        query::enabled_features(&registry.features())
    }

    pub fn features_description(&self) -> Vec<String> {
        query::describe(&self.features(), Scope::All)
    }

    pub fn enabled_features_description(&self) -> Vec<String> {
        query::describe(&self.features(), Scope::Enabled)
    }

    pub fn disabled_features_description(&self) -> Vec<String> {
        query::describe(&self.features(), Scope::Disabled)
    }

    pub fn overridden_features_description(&self) -> Vec<String> {
        query::describe(&self.features(), Scope::Overridden)
    }
}

impl<C, S: FeatureStore> std::ops::Deref for DynamicFeatureRegistry<C, S> {
    type Target = FeatureRegistry<C, S>;

    fn deref(&self) -> &FeatureRegistry<C, S> {
        &self.registry
    }
}

impl<C, S: FeatureStore> std::fmt::Debug for DynamicFeatureRegistry<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicFeatureRegistry")
            .field("registry", &self.registry)
            .field("dynamic", &self.dynamic)
            .finish_non_exhaustive()
    }
}
