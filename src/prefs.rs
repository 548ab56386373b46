/// Preference store
///
/// Small persisted key/value map for user-facing settings. Writers call
/// `flush` after each change; the file is always rewritten whole.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A stored preference value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Float(f64),
    Text(String),
}

/// Key/value preference storage shared across threads
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn set(&self, key: &str, value: PrefValue);

    fn delete_key(&self, key: &str);

    /// Persist pending changes
    fn flush(&self) -> Result<(), ConfigError>;

    fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Float under `key`, or `default` when missing or not a number
    fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(PrefValue::Float(v)) if v.is_finite() => v as f32,
            Some(other) => {
                tracing::warn!("Preference {} has unexpected value {:?}", key, other);
                default
            }
            None => default,
        }
    }

    fn set_f32(&self, key: &str, value: f32) {
        self.set(key, PrefValue::Float(f64::from(value)));
    }

    /// Bool under `key`; numbers count as true when non-zero
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(PrefValue::Bool(v)) => v,
            Some(PrefValue::Float(v)) => v != 0.0,
            Some(other) => {
                tracing::warn!("Preference {} has unexpected value {:?}", key, other);
                default
            }
            None => default,
        }
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.set(key, PrefValue::Bool(value));
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(PrefValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, PrefValue::Text(value.to_string()));
    }
}

/// Preferences backed by a pretty-printed JSON file
pub struct JsonFilePrefs {
    path: PathBuf,
    values: Mutex<BTreeMap<String, PrefValue>>,

    /// Held across the temp file write and rename
    write_lock: Mutex<()>,
}

impl JsonFilePrefs {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty; an unreadable or corrupt one is logged
    /// and also starts empty (it is overwritten on the next flush).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(values) => {
                    tracing::debug!("Loaded preferences from: {}", path.display());
                    values
                }
                Err(e) => {
                    tracing::warn!(
                        "Ignoring corrupt preferences at {}: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No preferences found at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                tracing::warn!("Failed to read preferences at {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path,
            values: Mutex::new(values),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `<config_dir>/EssentialCore/prefs.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("EssentialCore").join("prefs.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePrefs {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: PrefValue) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn delete_key(&self, key: &str) {
        self.values.lock().remove(key);
    }

    fn flush(&self) -> Result<(), ConfigError> {
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| {
            ConfigError::SaveFailed {
                path: self.path.display().to_string(),
                source,
            }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let _write = self.write_lock.lock();
        let json = {
            let values = self.values.lock();
            serde_json::to_string_pretty(&*values).map_err(|e| save_failed(Box::new(e)))?
        };

        // Write beside the target, then swap it in
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| save_failed(Box::new(e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| save_failed(Box::new(e)))?;
        Ok(())
    }
}

/// In-memory preferences; `flush` only counts calls
#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<BTreeMap<String, PrefValue>>,
    flushes: Mutex<usize>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl PreferenceStore for MemoryPrefs {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: PrefValue) {
        self.values.lock().insert(key.to_string(), value);
    }

    fn delete_key(&self, key: &str) {
        self.values.lock().remove(key);
    }

    fn flush(&self) -> Result<(), ConfigError> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let prefs = MemoryPrefs::new();
        prefs.set_f32("vol", 0.25);
        prefs.set_bool("mute", true);
        prefs.set_string("blob", "{}");

        assert_eq!(prefs.get_f32("vol", 1.0), 0.25);
        assert!(prefs.get_bool("mute", false));
        assert_eq!(prefs.get_string("blob").as_deref(), Some("{}"));
        assert_eq!(prefs.get_f32("missing", 0.7), 0.7);
    }

    #[test]
    fn test_wrong_type_falls_back() {
        let prefs = MemoryPrefs::new();
        prefs.set_string("vol", "loud");
        assert_eq!(prefs.get_f32("vol", 1.0), 1.0);

        // Legacy integer flags still read as bools
        prefs.set("mute", PrefValue::Float(1.0));
        assert!(prefs.get_bool("mute", false));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let prefs = JsonFilePrefs::open(&path);
        prefs.set_f32("AUDIO_BGM_VOL", 0.5);
        prefs.set_bool("AUDIO_MUTE", true);
        prefs.flush().unwrap();

        let reopened = JsonFilePrefs::open(&path);
        assert_eq!(reopened.get_f32("AUDIO_BGM_VOL", 1.0), 0.5);
        assert!(reopened.get_bool("AUDIO_MUTE", false));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{ not json").unwrap();

        let prefs = JsonFilePrefs::open(&path);
        assert!(!prefs.has_key("AUDIO_BGM_VOL"));

        prefs.set_f32("AUDIO_BGM_VOL", 0.1);
        prefs.flush().unwrap();
        assert_eq!(JsonFilePrefs::open(&path).get_f32("AUDIO_BGM_VOL", 1.0), 0.1);
    }

    #[test]
    fn test_concurrent_flushes_leave_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let prefs = std::sync::Arc::new(JsonFilePrefs::open(&path));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let prefs = std::sync::Arc::clone(&prefs);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        prefs.set_f32(&format!("key{t}"), i as f32);
                        prefs.flush().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened = JsonFilePrefs::open(&path);
        for t in 0..8 {
            assert_eq!(reopened.get_f32(&format!("key{t}"), -1.0), 49.0);
        }
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_delete_key() {
        let prefs = MemoryPrefs::new();
        prefs.set_bool("k", true);
        prefs.delete_key("k");
        assert!(!prefs.has_key("k"));
    }
}
