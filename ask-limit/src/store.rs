use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::counters::CounterSnapshot;
use crate::error::StoreError;

/// Durable storage for counter snapshots.
///
/// Callers treat every error as non-fatal.
pub trait CounterRepository: Debug + Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<CounterSnapshot>, StoreError>;

    fn save(&self, snapshot: &CounterSnapshot) -> Result<(), StoreError>;
}

/// Keeps the last saved snapshot in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    snapshot: Mutex<Option<CounterSnapshot>>,
}

impl CounterRepository for MemoryRepository {
    fn load(&self) -> Result<Option<CounterSnapshot>, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &CounterSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

/// Stores the snapshot as a JSON document on disk.
///
/// Saves write a sibling temporary file and rename it over the target, so a
/// crash mid-save leaves the previous snapshot intact.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    // Serializes concurrent saves onto the shared temporary file
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CounterRepository for JsonFileRepository {
    fn load(&self) -> Result<Option<CounterSnapshot>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, snapshot: &CounterSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");

        let _guard = self.write_lock.lock();
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;

    fn snapshot() -> CounterSnapshot {
        let mut snapshot = CounterSnapshot::fresh(Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap());
        snapshot.launch_count = 12;
        snapshot.rated_versions.insert("3.0.0".to_string());
        snapshot
    }

    #[test]
    fn json_file_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");

        assert!(JsonFileRepository::new(&path).load().unwrap().is_none());

        JsonFileRepository::new(&path).save(&snapshot()).unwrap();
        let loaded = JsonFileRepository::new(&path).load().unwrap();
        assert_eq!(loaded, Some(snapshot()));
    }

    #[test]
    fn corrupt_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counters.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = JsonFileRepository::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }

    #[test]
    fn memory_repository_starts_empty() {
        let repository = MemoryRepository::default();
        assert!(repository.load().unwrap().is_none());
        repository.save(&snapshot()).unwrap();
        assert_eq!(repository.load().unwrap(), Some(snapshot()));
    }
}
