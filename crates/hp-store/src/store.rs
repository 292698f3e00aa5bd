//! Versioned blob storage API.

use crate::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    saved_at: DateTime<Utc>,
    payload: T,
}

/// Directory-backed store: one JSON file per keyed blob.
#[derive(Clone)]
pub struct StateStore {
    root_dir: PathBuf,
}

impl StateStore {
    pub fn new(root_dir: PathBuf) -> StoreResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir).map_err(|source| StoreError::Io {
                path: root_dir.clone(),
                source,
            })?;
        }
        Ok(Self { root_dir })
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{key}.json"))
    }

    /// Save a blob atomically (write to a temp file, then rename).
    pub fn save<T: Serialize>(&self, key: &str, version: u32, payload: &T) -> StoreResult<()> {
        let envelope = Envelope {
            version,
            saved_at: Utc::now(),
            payload,
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        let path = self.blob_path(key);
        let tmp = self.root_dir.join(format!("{key}.json.tmp"));
        write_file(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Load a blob. Returns `None` when the blob does not exist, cannot
    /// be parsed, or carries a different version: all three mean "start
    /// fresh", never a hard failure.
    pub fn load<T: DeserializeOwned>(&self, key: &str, version: u32) -> StoreResult<Option<T>> {
        let path = self.blob_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        let envelope: Envelope<T> = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable state blob");
                return Ok(None);
            }
        };
        if envelope.version != version {
            tracing::warn!(
                key,
                found = envelope.version,
                expected = version,
                "discarding state blob with mismatched version"
            );
            return Ok(None);
        }
        Ok(Some(envelope.payload))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    fs::write(path, bytes).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> StateStore {
        let dir = std::env::temp_dir().join(format!("hp-store-test-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        StateStore::new(dir).unwrap()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Counters {
        cycles: u32,
    }

    #[test]
    fn round_trip() {
        let store = temp_store("roundtrip");
        store.save("relays", 1, &Counters { cycles: 42 }).unwrap();
        let loaded: Option<Counters> = store.load("relays", 1).unwrap();
        assert_eq!(loaded, Some(Counters { cycles: 42 }));
    }

    #[test]
    fn version_mismatch_starts_fresh() {
        let store = temp_store("version");
        store.save("relays", 1, &Counters { cycles: 42 }).unwrap();
        let loaded: Option<Counters> = store.load("relays", 2).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn missing_blob_is_none() {
        let store = temp_store("missing");
        let loaded: Option<Counters> = store.load("nothing", 1).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn garbage_blob_starts_fresh() {
        let store = temp_store("garbage");
        fs::write(store.blob_path("relays"), b"not json").unwrap();
        let loaded: Option<Counters> = store.load("relays", 1).unwrap();
        assert_eq!(loaded, None);
    }
}
