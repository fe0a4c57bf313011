use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::{Error, OverrideState};

/// Computes a dynamic feature's default on every read.
pub type ComputedDefault = Arc<dyn Fn(&Feature) -> bool + Send + Sync>;

/// Invoked with the feature after each override mutation.
pub(crate) type ChangeHandler = Arc<dyn Fn(&Feature) -> Result<(), Error> + Send + Sync>;

#[derive(Clone)]
pub enum DefaultState {
    Fixed(bool),
    Computed(ComputedDefault),
}

impl std::fmt::Debug for DefaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultState::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            DefaultState::Computed(_) => f.debug_tuple("Computed").finish_non_exhaustive(),
        }
    }
}

struct Inner {
    key: OnceLock<String>,
    requires_restart: bool,
    default_state: DefaultState,
    override_state: AtomicU8,
    on_change: RwLock<Option<ChangeHandler>>,
}

/// A named boolean toggle.
///
/// `Feature` is a shared handle: clones observe and mutate the same state, so
/// the container that declares a feature and the registry tree that labels it
/// always agree on its override.
///
/// ```rust
/// use feature_overrides::{Feature, OverrideState};
///
/// let feature = Feature::with_key("darkMode", false);
/// assert!(!feature.enabled());
///
/// feature.set_override(OverrideState::Enabled).unwrap();
/// assert!(feature.enabled());
/// ```
#[derive(Clone)]
pub struct Feature {
    inner: Arc<Inner>,
}

impl Feature {
    /// A static feature whose key will be derived from its declaration label.
    pub fn new(default_state: bool) -> Self {
        Builder::new().set_default_state(default_state).build()
    }

    pub fn with_key(key: impl Into<String>, default_state: bool) -> Self {
        Builder::new()
            .set_key(Some(key.into()))
            .set_default_state(default_state)
            .build()
    }

    /// A dynamic feature whose default is computed by `computed` on each read.
    pub fn dynamic(computed: impl Fn(&Feature) -> bool + Send + Sync + 'static) -> Self {
        Builder::new().set_computed_default(computed).build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub fn key(&self) -> Option<&str> {
        self.inner.key.get().map(String::as_str)
    }

    pub fn requires_restart(&self) -> bool {
        self.inner.requires_restart
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.inner.default_state, DefaultState::Computed(_))
    }

    pub fn default_state(&self) -> bool {
        match &self.inner.default_state {
            DefaultState::Fixed(value) => *value,
            DefaultState::Computed(computed) => computed(self),
        }
    }

    pub fn override_state(&self) -> OverrideState {
        OverrideState::try_from(self.inner.override_state.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    pub fn enabled(&self) -> bool {
        match self.override_state() {
            OverrideState::Enabled => true,
            OverrideState::Disabled => false,
            OverrideState::Default => self.default_state(),
        }
    }

    /// Set the override and notify the owning registry, which persists it.
    ///
    /// Without an owner the new value is kept in memory only. If the store
    /// write fails the in-memory value has already changed.
    #[cfg_attr(feature = "tracing-instrument", tracing::instrument(skip(self), fields(key = ?self.key())))]
    pub fn set_override(&self, state: OverrideState) -> Result<(), Error> {
        self.inner
            .override_state
            .store(state.as_u8(), Ordering::Release);

        let handler = self.inner.on_change.read().clone();
        match handler {
            Some(handler) => handler(self),
            None => {
                tracing::trace!(key = ?self.key(), %state, "Override changed without an owner");
                Ok(())
            }
        }
    }

    /// Whether both handles refer to the same feature.
    pub fn ptr_eq(a: &Feature, b: &Feature) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Assign `label` as the key unless one is already set, returning the
    /// effective key.
    pub(crate) fn assign_key(&self, label: &str) -> Result<&str, Error> {
        if let Some(key) = self.key() {
            return Ok(key);
        }

        if label.is_empty() {
            return Err(Error::MissingKey {
                label: label.to_string(),
            });
        }

        let key = self.inner.key.get_or_init(|| {
            tracing::trace!(label, "Derived feature key from its label");
            label.to_string()
        });
        Ok(key)
    }

    /// Load a persisted override without notifying the change handler.
    pub(crate) fn bootstrap(&self, state: OverrideState) {
        self.inner
            .override_state
            .store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn install_handler(&self, handler: ChangeHandler) {
        *self.inner.on_change.write() = Some(handler);
    }

    /// Detach the feature from its owner; later overrides stay in memory.
    pub(crate) fn clear_handler(&self) {
        *self.inner.on_change.write() = None;
    }
}

/// A static feature defaulting to off, keyed by its declaration label.
impl Default for Feature {
    fn default() -> Self {
        Feature::new(false)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:[{}] - Override: {}, Default: {}",
            self.key().unwrap_or("UNKNOWN"),
            if self.enabled() { "ON" } else { "OFF" },
            self.override_state(),
            self.default_state()
        )
    }
}

impl std::fmt::Debug for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature")
            .field("key", &self.key())
            .field("requires_restart", &self.requires_restart())
            .field("default_state", &self.inner.default_state)
            .field("override_state", &self.override_state())
            .finish()
    }
}

#[derive(Default)]
pub struct Builder {
    key: Option<String>,
    requires_restart: bool,
    default_state: Option<DefaultState>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            key: None,
            requires_restart: false,
            default_state: None,
        }
    }

    /// Fix the feature's key. An empty key counts as unset.
    pub fn set_key(mut self, key: Option<String>) -> Self {
        self.key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn set_requires_restart(mut self, requires_restart: bool) -> Self {
        self.requires_restart = requires_restart;
        self
    }

    pub fn set_default_state(mut self, default_state: bool) -> Self {
        self.default_state = Some(DefaultState::Fixed(default_state));
        self
    }

    pub fn set_computed_default(
        mut self,
        computed: impl Fn(&Feature) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.default_state = Some(DefaultState::Computed(Arc::new(computed)));
        self
    }

    pub fn build(self) -> Feature {
        let key = OnceLock::new();
        if let Some(k) = self.key {
            let _ = key.set(k);
        }

        Feature {
            inner: Arc::new(Inner {
                key,
                requires_restart: self.requires_restart,
                default_state: self.default_state.unwrap_or(DefaultState::Fixed(false)),
                override_state: AtomicU8::new(OverrideState::Default.as_u8()),
                on_change: RwLock::new(None),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::Feature;
    use crate::OverrideState;

    #[test]
    fn override_takes_precedence_over_default() {
        for default_state in [true, false] {
            let feature = Feature::new(default_state);
            for state in OverrideState::ALL {
                feature.set_override(state).unwrap();
                let expected = match state {
                    OverrideState::Enabled => true,
                    OverrideState::Disabled => false,
                    OverrideState::Default => default_state,
                };
                assert_eq!(feature.enabled(), expected, "{state} over {default_state}");
            }
        }
    }

    #[test]
    fn unkeyed_feature_is_readable() {
        let feature = Feature::new(true);
        assert_eq!(feature.key(), None);
        assert_eq!(feature.override_state(), OverrideState::Default);
        assert!(feature.enabled());
    }

    #[test]
    fn explicit_key_is_kept() {
        let feature = Feature::with_key("FEATURE_KEY", false);
        assert_eq!(feature.assign_key("feature1").unwrap(), "FEATURE_KEY");
        assert_eq!(feature.key(), Some("FEATURE_KEY"));
    }

    #[test]
    fn empty_key_counts_as_unset() {
        let feature = Feature::builder().set_key(Some(String::new())).build();
        assert_eq!(feature.key(), None);
        assert!(matches!(
            feature.assign_key(""),
            Err(crate::Error::MissingKey { .. })
        ));
        assert_eq!(feature.assign_key("fromLabel").unwrap(), "fromLabel");
    }

    #[test]
    fn computed_default_is_never_cached() {
        let flag = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));

        let feature = {
            let flag = flag.clone();
            let calls = calls.clone();
            Feature::dynamic(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                flag.load(Ordering::SeqCst)
            })
        };

        assert!(feature.is_dynamic());
        assert!(!feature.enabled());
        flag.store(true, Ordering::SeqCst);
        assert!(feature.enabled());
        assert!(feature.default_state());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn computed_default_sees_the_feature() {
        let feature = Feature::builder()
            .set_key(Some("beta-weekend".into()))
            .set_computed_default(|f| f.key().is_some_and(|k| k.starts_with("beta")))
            .build();
        assert!(feature.default_state());
    }

    #[test]
    fn handler_receives_every_mutation() {
        let feature = Feature::with_key("watched", false);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let sink = seen.clone();
        feature.install_handler(Arc::new(move |f: &Feature| -> Result<(), crate::Error> {
            sink.lock().push(f.override_state());
            Ok(())
        }));

        feature.set_override(OverrideState::Enabled).unwrap();
        feature.set_override(OverrideState::Disabled).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![OverrideState::Enabled, OverrideState::Disabled]
        );
    }

    #[test]
    fn bootstrap_does_not_notify() {
        let feature = Feature::with_key("quiet", false);
        let notified = Arc::new(AtomicBool::new(false));

        let n = notified.clone();
        feature.install_handler(Arc::new(move |_: &Feature| -> Result<(), crate::Error> {
            n.store(true, Ordering::SeqCst);
            Ok(())
        }));

        feature.bootstrap(OverrideState::Enabled);
        assert!(feature.enabled());
        assert!(!notified.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_state() {
        let feature = Feature::new(false);
        let other = feature.clone();
        other.set_override(OverrideState::Enabled).unwrap();
        assert!(feature.enabled());
        assert!(Feature::ptr_eq(&feature, &other));
        assert!(!Feature::ptr_eq(&feature, &Feature::new(false)));
    }

    #[test]
    fn display_matches_summary_format() {
        let feature = Feature::with_key("articlePreviews", true);
        assert_eq!(
            feature.to_string(),
            "articlePreviews:[ON] - Override: Default, Default: true"
        );

        feature.set_override(OverrideState::Disabled).unwrap();
        assert_eq!(
            feature.to_string(),
            "articlePreviews:[OFF] - Override: OFF, Default: true"
        );

        assert_eq!(
            Feature::new(false).to_string(),
            "UNKNOWN:[OFF] - Override: Default, Default: false"
        );
    }
}
