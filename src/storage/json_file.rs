use std::collections::BTreeMap;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::OverrideState;
use crate::storage::FeatureStore;

pub const DEFAULT_PREFIX: &str = "Override_";

#[cfg(unix)]
const XDG_PREFIX: &str = "feature-overrides";
#[cfg(unix)]
const XDG_STORAGE_FILENAME: &str = "overrides.json";
const NOTES: &[&str] = &[
    "Local feature overrides. Each entry forces a feature ON or OFF.",
    "Entries set to Default defer to the feature's built-in default.",
    "You can delete this file at any time to clear every override.",
];

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No HOME is available")]
    NoHome,

    #[error("The storage location has no parent directory")]
    LocationHasNoParent,

    #[error("Serializing / deserializing failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Loading from storage failed when opening the file `{0}`: {1}")]
    Open(PathBuf, std::io::Error),

    #[error("Creating the storage file `{0}` failed: {1}")]
    Create(PathBuf, std::io::Error),

    #[error("Reading from storage at `{0}` failed: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Writing storage to `{0}` failed: {1}")]
    Write(PathBuf, std::io::Error),

    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct WrappedStorage {
    #[serde(default)]
    notes: Vec<String>,
    #[serde(default)]
    body: BTreeMap<String, OverrideState>,
}

/// A durable store holding every override in one JSON document.
///
/// Keys are namespaced with a prefix (`Override_` unless changed with
/// [`JsonFile::set_prefix`]), so the feature `darkMode` is stored as
/// `Override_darkMode`. Every write replaces the file atomically.
#[derive(Debug)]
pub struct JsonFile {
    location: PathBuf,
    directory: PathBuf,
    prefix: String,
    states: RwLock<BTreeMap<String, OverrideState>>,
}

impl JsonFile {
    /// Open the store at `location`. A missing file is an empty store.
    #[tracing::instrument]
    pub fn new(location: PathBuf) -> Result<Self, Error> {
        let directory = match location.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_owned(),
            None => return Err(Error::LocationHasNoParent),
        };

        let states = load(&location)?;
        tracing::trace!(entries = states.len(), "Loaded stored overrides");

        Ok(Self {
            location,
            directory,
            prefix: DEFAULT_PREFIX.to_string(),
            states: RwLock::new(states),
        })
    }

    /// Open the store in the XDG state directory.
    #[cfg(unix)]
    pub fn try_default() -> Result<Self, Error> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);

        let file = xdg_dirs
            .place_state_file(XDG_STORAGE_FILENAME)
            .map_err(|e| {
                match xdg_dirs
                    .get_state_file(XDG_STORAGE_FILENAME)
                    .ok_or(Error::NoHome)
                {
                    Ok(loc) => Error::Create(loc, e),
                    Err(e) => e,
                }
            })?;

        Self::new(file)
    }

    pub fn set_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    fn persist(&self, states: &BTreeMap<String, OverrideState>) -> Result<(), Error> {
        let wrapped = WrappedStorage {
            notes: NOTES.iter().map(|v| String::from(*v)).collect(),
            body: states.clone(),
        };
        let json = serde_json::to_string_pretty(&wrapped)?;

        let mut tempfile = tempfile::NamedTempFile::new_in(&self.directory)
            .map_err(|e| Error::Create(self.directory.clone(), e))?;

        tempfile
            .write_all(json.as_bytes())
            .map_err(|e| Error::Write(tempfile.path().into(), e))?;

        tempfile.persist(&self.location)?;

        tracing::trace!(location = ?self.location, "Overrides persisted");

        Ok(())
    }
}

fn load(location: &Path) -> Result<BTreeMap<String, OverrideState>, Error> {
    let mut file = match std::fs::File::open(location) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(Error::Open(location.to_owned(), e)),
    };

    let mut contents = vec![];
    file.read_to_end(&mut contents)
        .map_err(|e| Error::Read(location.to_owned(), e))?;

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }

    let wrapped: WrappedStorage = serde_json::from_slice(&contents)?;
    Ok(wrapped.body)
}

impl FeatureStore for JsonFile {
    type Error = Error;

    fn get(&self, key: &str) -> Result<OverrideState, Error> {
        Ok(self
            .states
            .read()
            .get(&self.prefixed(key))
            .copied()
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self))]
    fn set(&self, key: &str, state: OverrideState) -> Result<(), Error> {
        let mut states = self.states.write();
        states.insert(self.prefixed(key), state);

        tracing::trace!("Storing overrides");
        self.persist(&states)
    }
}

#[cfg(test)]
mod test {
    use crate::OverrideState;
    use crate::storage::FeatureStore;

    #[test]
    fn round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("overrides.json");

        let store = super::JsonFile::new(location.clone()).unwrap();
        store.set("darkMode", OverrideState::Enabled).unwrap();
        store.set("portraitVideos", OverrideState::Disabled).unwrap();

        let reopened = super::JsonFile::new(location).unwrap();
        assert_eq!(reopened.get("darkMode").unwrap(), OverrideState::Enabled);
        assert_eq!(
            reopened.get("portraitVideos").unwrap(),
            OverrideState::Disabled
        );
        assert_eq!(reopened.get("unset").unwrap(), OverrideState::Default);
    }

    #[test]
    fn namespaces_keys_with_the_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("overrides.json");

        let store = super::JsonFile::new(location.clone()).unwrap();
        assert_eq!(store.prefix(), "Override_");
        store.set("darkMode", OverrideState::Enabled).unwrap();

        let custom = super::JsonFile::new(location.clone())
            .unwrap()
            .set_prefix("CustomPrefix_");
        assert_eq!(custom.get("darkMode").unwrap(), OverrideState::Default);
        custom.set("darkMode", OverrideState::Disabled).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&location).unwrap()).unwrap();
        assert_eq!(raw["body"]["Override_darkMode"], "ON");
        assert_eq!(raw["body"]["CustomPrefix_darkMode"], "OFF");
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = super::JsonFile::new(dir.path().join("absent.json")).unwrap();
        assert_eq!(store.get("anything").unwrap(), OverrideState::Default);
    }

    #[test]
    fn unknown_values_decode_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("overrides.json");
        std::fs::write(
            &location,
            r#"{ "notes": [], "body": { "Override_a": "ON", "Override_b": "sideways" } }"#,
        )
        .unwrap();

        let store = super::JsonFile::new(location).unwrap();
        assert_eq!(store.get("a").unwrap(), OverrideState::Enabled);
        assert_eq!(store.get("b").unwrap(), OverrideState::Default);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("overrides.json");
        std::fs::write(&location, "not json").unwrap();

        assert!(matches!(
            super::JsonFile::new(location),
            Err(super::Error::Json(_))
        ));
    }
}
