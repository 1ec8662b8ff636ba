//! Key-value persistence for the small pieces of state that survive restarts.
//!
//! Stores decide what to persist by producing a serializable subset of their
//! state; this module only moves strings in and out of named slots.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// A string-valued key-value service.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`.  Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// The envelope written to a slot: a format version and the state subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persisted<T> {
    /// Format version of `state`.
    pub version: u8,
    /// The persisted subset.
    pub state: T,
}

/// Serialize `state` into the slot `key`.
pub fn save_slot<T: Serialize>(kv: &dyn KeyValueStore, key: &str, version: u8, state: &T) -> Result<()> {
    let envelope = Persisted { version, state };
    let json = serde_json::to_string(&envelope)
        .map_err(|err| Error::serialization("failed to serialize persisted state", Some(Box::new(err))))?;
    kv.set(key, &json)
}

/// Read the slot `key`.
///
/// Returns `None` when the slot is empty or was written with a different
/// version; stale formats are discarded rather than migrated.
pub fn load_slot<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str, version: u8) -> Result<Option<T>> {
    let Some(json) = kv.get(key)? else {
        return Ok(None);
    };
    let envelope: Persisted<T> = serde_json::from_str(&json)
        .map_err(|err| Error::serialization(format!("failed to parse slot {key}"), Some(Box::new(err))))?;
    if envelope.version != version {
        return Ok(None);
    }
    Ok(Some(envelope.state))
}

/// Process-local key-value store, mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash never leaves a half-written slot behind.
#[derive(Debug, Clone)]
pub struct JsonFileKeyValueStore {
    dir: PathBuf,
}

impl JsonFileKeyValueStore {
    /// Use `dir` for storage, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|err| Error::io(format!("failed to create {}", dir.display()), err))?;
        Ok(Self { dir })
    }

    /// The directory holding the slots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }
}

/// Percent-encode every byte of `key` outside `[A-Za-z0-9_-]`.
///
/// Distinct keys always map to distinct file names, and no name can leave
/// the directory.
fn escape_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("%{byte:02X}"));
        }
    }
    name
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(format!("failed to read {}", path.display()), err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let final_path = self.path_for(key);
        let tmp_path = final_path.with_extension("json.tmp");
        fs::write(&tmp_path, value)
            .map_err(|err| Error::io(format!("failed to write {}", tmp_path.display()), err))?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path)?;
                    fs::rename(&tmp_path, &final_path)?;
                    Ok(())
                } else {
                    Err(Error::io(
                        format!("failed to replace {}", final_path.display()),
                        rename_err,
                    ))
                }
            }
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io(format!("failed to remove {}", path.display()), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "parlance_persist_{prefix}_{}_{}",
            std::process::id(),
            nanos
        ))
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Selection {
        selected: Option<String>,
    }

    #[test]
    fn memory_store_set_get_remove() {
        let kv = MemoryKeyValueStore::new();
        assert_eq!(kv.get("k").unwrap(), None);
        kv.set("k", "v").unwrap();
        assert_eq!(kv.get("k").unwrap(), Some("v".to_string()));
        kv.remove("k").unwrap();
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
    }

    #[test]
    fn slot_round_trip_and_version_mismatch() {
        let kv = MemoryKeyValueStore::new();
        let state = Selection {
            selected: Some("f1".to_string()),
        };
        save_slot(&kv, "slot", 1, &state).unwrap();
        assert_eq!(
            kv.get("slot").unwrap().unwrap(),
            r#"{"version":1,"state":{"selected":"f1"}}"#
        );
        assert_eq!(load_slot::<Selection>(&kv, "slot", 1).unwrap(), Some(state));
        assert_eq!(load_slot::<Selection>(&kv, "slot", 2).unwrap(), None);
        assert_eq!(load_slot::<Selection>(&kv, "empty", 1).unwrap(), None);
    }

    #[test]
    fn corrupt_slot_is_a_serialization_error() {
        let kv = MemoryKeyValueStore::new();
        kv.set("slot", "not json").unwrap();
        let err = load_slot::<Selection>(&kv, "slot", 1).unwrap_err();
        assert!(err.to_string().starts_with("Serialization error"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = temp_dir("reopen");
        let kv = JsonFileKeyValueStore::open(&dir).unwrap();
        kv.set("audio-file-storage", "{}").unwrap();
        drop(kv);

        let kv = JsonFileKeyValueStore::open(&dir).unwrap();
        assert_eq!(kv.get("audio-file-storage").unwrap(), Some("{}".to_string()));
        assert!(dir.join("audio-file-storage.json").exists());
        kv.remove("audio-file-storage").unwrap();
        assert_eq!(kv.get("audio-file-storage").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn escape_key_is_injective() {
        assert_eq!(escape_key("audio-file-storage"), "audio-file-storage");
        assert_eq!(escape_key("a/b"), "a%2Fb");
        assert_eq!(escape_key("a_b"), "a_b");
        assert_eq!(escape_key("a%2Fb"), "a%252Fb");
        assert_eq!(escape_key("é"), "%C3%A9");
    }

    #[test]
    fn file_store_escapes_keys() {
        let dir = temp_dir("escape");
        let kv = JsonFileKeyValueStore::open(&dir).unwrap();
        kv.set("../escape", "x").unwrap();
        assert!(dir.join("%2E%2E%2Fescape.json").exists());

        kv.set("a/b", "slash").unwrap();
        kv.set("a_b", "underscore").unwrap();
        assert_eq!(kv.get("a/b").unwrap(), Some("slash".to_string()));
        assert_eq!(kv.get("a_b").unwrap(), Some("underscore".to_string()));
        let _ = fs::remove_dir_all(&dir);
    }
}
