//! Named-suite persistence
//!
//! Suites are experiment snapshots keyed by experiment identity. The store
//! only maps ids to snapshots; ordering and the update-only sync rule live
//! in the session.

use core_types::SuiteSnapshot;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const SUITE_EXTENSION: &str = "json";

/// Suite store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing storage failed
    #[error("suite storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored snapshot could not be (de)serialized
    #[error("suite '{id}' is not a valid snapshot: {source}")]
    Corrupt {
        /// Suite identity
        id: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The id cannot be used as a storage key
    #[error("invalid suite id '{0}'")]
    InvalidId(String),
}

/// Result type for suite store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Keyed storage for saved suites
pub trait SuiteStore {
    /// Every saved suite, in no particular order
    fn list(&self) -> StoreResult<Vec<(String, SuiteSnapshot)>>;

    /// The suite saved under `id`, if any
    fn get(&self, id: &str) -> StoreResult<Option<SuiteSnapshot>>;

    /// Create or overwrite the suite saved under `id`
    fn put(&self, id: &str, snapshot: &SuiteSnapshot) -> StoreResult<()>;

    /// Delete the suite saved under `id`, returning whether it existed
    fn remove(&self, id: &str) -> StoreResult<bool>;
}

impl<S: SuiteStore + ?Sized> SuiteStore for Arc<S> {
    fn list(&self) -> StoreResult<Vec<(String, SuiteSnapshot)>> {
        (**self).list()
    }

    fn get(&self, id: &str) -> StoreResult<Option<SuiteSnapshot>> {
        (**self).get(id)
    }

    fn put(&self, id: &str, snapshot: &SuiteSnapshot) -> StoreResult<()> {
        (**self).put(id, snapshot)
    }

    fn remove(&self, id: &str) -> StoreResult<bool> {
        (**self).remove(id)
    }
}

/// In-memory suite store.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySuiteStore {
    entries: Arc<RwLock<BTreeMap<String, SuiteSnapshot>>>,
}

impl MemorySuiteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved suites
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no suite is saved
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SuiteStore for MemorySuiteStore {
    fn list(&self) -> StoreResult<Vec<(String, SuiteSnapshot)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(id, snapshot)| (id.clone(), snapshot.clone()))
            .collect())
    }

    fn get(&self, id: &str) -> StoreResult<Option<SuiteSnapshot>> {
        Ok(self.entries.read().get(id).cloned())
    }

    fn put(&self, id: &str, snapshot: &SuiteSnapshot) -> StoreResult<()> {
        self.entries.write().insert(id.to_string(), snapshot.clone());
        Ok(())
    }

    fn remove(&self, id: &str) -> StoreResult<bool> {
        Ok(self.entries.write().remove(id).is_some())
    }
}

/// Directory-backed suite store, one `<id>.json` file per suite.
#[derive(Debug, Clone)]
pub struct FileSuiteStore {
    root: PathBuf,
}

impl FileSuiteStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "opened suite directory");
        Ok(Self { root })
    }

    /// The directory suites are stored in
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> StoreResult<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.{SUITE_EXTENSION}")))
    }

    fn read_snapshot(id: &str, path: &Path) -> StoreResult<SuiteSnapshot> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })
    }
}

impl SuiteStore for FileSuiteStore {
    fn list(&self) -> StoreResult<Vec<(String, SuiteSnapshot)>> {
        let mut suites = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SUITE_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            suites.push((id.to_string(), Self::read_snapshot(id, &path)?));
        }
        Ok(suites)
    }

    fn get(&self, id: &str) -> StoreResult<Option<SuiteSnapshot>> {
        let path = self.path_for(id)?;
        match Self::read_snapshot(id, &path) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn put(&self, id: &str, snapshot: &SuiteSnapshot) -> StoreResult<()> {
        let path = self.path_for(id)?;
        let json = serde_json::to_string_pretty(snapshot).map_err(|source| StoreError::Corrupt {
            id: id.to_string(),
            source,
        })?;

        // Write beside the target and rename so readers never see half a file
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &path)?;
        tracing::debug!(id, path = %path.display(), "suite written");
        Ok(())
    }

    fn remove(&self, id: &str) -> StoreResult<bool> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
