//! Persistence for named allocation profiles.
//!
//! The session never touches storage directly; it calls through
//! [`ProfileRepository`]. Two implementations are provided: an in-memory
//! map for tests and local runs, and a file-backed store that persists the
//! whole profile collection as one JSON document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use indexmap::IndexMap;
use stat_core::StatProfile;
use thiserror::Error;

/// Errors surfaced by profile repository implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile name is empty")]
    EmptyName,

    #[error("profile repository lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),
}

type Result<T> = std::result::Result<T, StoreError>;

/// Repository for saved allocation profiles, keyed by profile name.
///
/// Saving under an existing name replaces the previous profile.
pub trait ProfileRepository: Send + Sync {
    /// Save a profile under its name.
    fn save(&self, profile: &StatProfile) -> Result<()>;

    /// Remove a profile by name. Removing an unknown name is a no-op.
    fn remove(&self, name: &str) -> Result<()>;

    /// Load a profile by name.
    fn get(&self, name: &str) -> Result<Option<StatProfile>>;

    /// List all saved profiles in stored order.
    fn list(&self) -> Result<Vec<StatProfile>>;
}

/// In-memory implementation of [`ProfileRepository`] for tests and local
/// development.
pub struct InMemoryProfileRepo {
    profiles: RwLock<IndexMap<String, StatProfile>>,
}

impl InMemoryProfileRepo {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(IndexMap::new()),
        }
    }
}

impl Default for InMemoryProfileRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRepository for InMemoryProfileRepo {
    fn save(&self, profile: &StatProfile) -> Result<()> {
        if profile.name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let mut profiles = self.profiles.write().map_err(|_| StoreError::LockPoisoned)?;
        profiles.insert(profile.name.clone(), profile.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut profiles = self.profiles.write().map_err(|_| StoreError::LockPoisoned)?;
        profiles.shift_remove(name);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<StatProfile>> {
        let profiles = self.profiles.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(profiles.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<StatProfile>> {
        let profiles = self.profiles.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(profiles.values().cloned().collect())
    }
}

/// File-backed implementation of [`ProfileRepository`].
///
/// The whole collection is stored as one pretty-printed JSON document
/// mapping profile name to the persisted profile encoding. Writes go
/// through a temp file followed by an atomic rename.
pub struct FileProfileRepo {
    path: PathBuf,
}

impl FileProfileRepo {
    /// Create a repository persisting to the given file path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn load_map(&self) -> Result<IndexMap<String, StatProfile>> {
        if !self.path.exists() {
            return Ok(IndexMap::new());
        }

        let json = fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Json(e.to_string()))
    }

    fn store_map(&self, profiles: &IndexMap<String, StatProfile>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(profiles).map_err(|e| StoreError::Json(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!("saved {} profiles to {}", profiles.len(), self.path.display());
        Ok(())
    }
}

impl ProfileRepository for FileProfileRepo {
    fn save(&self, profile: &StatProfile) -> Result<()> {
        if profile.name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let mut profiles = self.load_map()?;
        profiles.insert(profile.name.clone(), profile.clone());
        self.store_map(&profiles)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut profiles = self.load_map()?;
        if profiles.shift_remove(name).is_some() {
            self.store_map(&profiles)?;
        }
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<StatProfile>> {
        Ok(self.load_map()?.get(name).cloned())
    }

    fn list(&self) -> Result<Vec<StatProfile>> {
        Ok(self.load_map()?.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> StatProfile {
        let mut profile = StatProfile::new("dps");
        profile.set("Ferocity", 2);
        profile.set("Haste", 1);
        profile
    }

    #[test]
    fn memory_repo_saves_and_replaces() {
        let repo = InMemoryProfileRepo::new();
        repo.save(&sample_profile()).unwrap();

        let mut replacement = StatProfile::new("dps");
        replacement.set("Grit", 5);
        repo.save(&replacement).unwrap();

        let loaded = repo.get("dps").unwrap().unwrap();
        assert_eq!(loaded.get("Grit"), 5);
        assert_eq!(loaded.get("Ferocity"), 0);
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn memory_repo_rejects_empty_names() {
        let repo = InMemoryProfileRepo::new();
        let unnamed = StatProfile::new("");
        assert!(matches!(repo.save(&unnamed), Err(StoreError::EmptyName)));
    }

    #[test]
    fn file_repo_round_trips_compile_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");

        let repo = FileProfileRepo::new(&path).unwrap();
        let profile = sample_profile();
        repo.save(&profile).unwrap();

        // A second repository over the same file sees the same profile.
        let reopened = FileProfileRepo::new(&path).unwrap();
        let loaded = reopened.get("dps").unwrap().unwrap();
        assert_eq!(loaded.compile(), profile.compile());
    }

    #[test]
    fn file_repo_remove_deletes_only_the_named_profile() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileProfileRepo::new(dir.path().join("profiles.json")).unwrap();

        repo.save(&sample_profile()).unwrap();
        repo.save(&StatProfile::new("tank")).unwrap();

        repo.remove("dps").unwrap();
        assert!(repo.get("dps").unwrap().is_none());
        assert!(repo.get("tank").unwrap().is_some());

        // Removing a name that was never saved is a no-op.
        repo.remove("missing").unwrap();
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileProfileRepo::new(dir.path().join("profiles.json")).unwrap();
        assert!(repo.list().unwrap().is_empty());
    }
}
