//! Durable client-side storage for the local mirror
//!
//! The whole mirror is stored as one JSON array under a well-known key and is
//! replaced wholesale on every save.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::models::LocalIncident;

/// Key under which the mirror is stored
pub const CACHE_KEY: &str = "incidents";

/// Where a client keeps its mirror between sessions
pub trait CachePersistence: Send + Sync {
    fn load(&self) -> Result<Vec<LocalIncident>>;
    fn save(&self, entries: &[LocalIncident]) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// File-backed cache: `<dir>/<key>.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCacheStore {
    dir: PathBuf,
    key: String,
}

impl FileCacheStore {
    /// Cache stored under the default key inside `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_key(dir, CACHE_KEY)
    }

    pub fn with_key(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Full path of the cache file
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn quarantine(path: &Path) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let file_name = path
            .file_name()
            .map_or_else(|| "cache".into(), |name| name.to_string_lossy());
        let backup_path = path.with_file_name(format!("{file_name}.corrupt-{timestamp}"));
        fs::rename(path, &backup_path)?;
        tracing::warn!(
            "Moved unreadable local cache from {} to {}",
            path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

impl CachePersistence for FileCacheStore {
    fn load(&self) -> Result<Vec<LocalIncident>> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str(&raw) {
            Ok(entries) => Ok(entries),
            Err(error) => {
                tracing::warn!("Local cache at {} is corrupted: {}", path.display(), error);
                Self::quarantine(&path)?;
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, entries: &[LocalIncident]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec(entries)?)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-memory cache for tests and ephemeral sessions
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    entries: Arc<Mutex<Vec<LocalIncident>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated cache, as if a previous session had saved `entries`
    pub fn with_entries(entries: Vec<LocalIncident>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    /// Snapshot of what is currently persisted
    pub fn snapshot(&self) -> Vec<LocalIncident> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CachePersistence for MemoryCacheStore {
    fn load(&self) -> Result<Vec<LocalIncident>> {
        Ok(self.snapshot())
    }

    fn save(&self, entries: &[LocalIncident]) -> Result<()> {
        *self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = entries.to_vec();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentCategory, IncidentId, NewIncident, Position, ProvisionalIncident};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn entries() -> Vec<LocalIncident> {
        let incident = NewIncident {
            location_name: "Tuen Mun".to_string(),
            position: Position::new(22.3918, 113.9725),
            reporter_name: "dog lover".to_string(),
            description: "Animal abuse case discovered".to_string(),
            category: IncidentCategory::AbuseReport,
            contact_info: None,
            image_data: Some("data:image/png;base64,AAAA".to_string()),
        };
        vec![
            LocalIncident::Provisional(ProvisionalIncident::new(incident.clone())),
            LocalIncident::Confirmed(incident.into_record(IncidentId::new(), 99)),
        ]
    }

    #[test]
    fn file_store_round_trips() {
        let tmp = tempdir().unwrap();
        let store = FileCacheStore::new(tmp.path().join("nested"));
        assert!(store.load().unwrap().is_empty());

        let saved = entries();
        store.save(&saved).unwrap();
        assert!(store.path().ends_with("incidents.json"));
        assert_eq!(store.load().unwrap(), saved);

        store.clear().unwrap();
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn file_store_replaces_whole_array() {
        let tmp = tempdir().unwrap();
        let store = FileCacheStore::new(tmp.path());

        let all = entries();
        store.save(&all).unwrap();
        store.save(&all[1..]).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["status"], "confirmed");
    }

    #[test]
    fn corrupted_file_is_quarantined() {
        let tmp = tempdir().unwrap();
        let store = FileCacheStore::new(tmp.path());
        fs::write(store.path(), "{ not json").unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(!store.path().exists());

        let quarantined = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("incidents.json.corrupt-")
            });
        assert!(quarantined);
    }

    #[test]
    fn memory_store_shares_state_between_clones() {
        let store = MemoryCacheStore::new();
        let observer = store.clone();

        store.save(&entries()).unwrap();
        assert_eq!(observer.snapshot().len(), 2);

        store.clear().unwrap();
        assert!(observer.load().unwrap().is_empty());
    }
}
