pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Feature `{label}` has no key and none can be derived from its label")]
    MissingKey { label: String },

    #[error("A static feature already exists with the key `{key}`")]
    StaticFeatureAlreadyExists { key: String },

    #[error("`{0}` is not a valid override state")]
    InvalidOverrideState(u8),

    #[error("Feature store failure: {0}")]
    Store(#[source] BoxError),
}

impl Error {
    pub(crate) fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Store(Box::new(err))
    }
}
