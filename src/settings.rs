//! Non-volatile settings store.
//!
//! The lighting core only needs a flat key → value registry. Two backends:
//! [`MemoryStore`] (volatile) and [`JsonRegistryFile`] (a JSON object on disk,
//! rewritten atomically on every change).

use crate::error::LedError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A persisted setting value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Float(f64),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Float(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Bool(_) => None,
        }
    }

    /// Name of the variant, for type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Float(_) => "float",
        }
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for SettingValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

pub trait SettingsStore: Send {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Option<SettingValue>;
    fn set(&mut self, key: &str, value: SettingValue) -> Result<(), LedError>;
    /// Flush everything to the backing medium.
    fn force_save(&mut self) -> Result<(), LedError>;

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_float())
    }
}

// ── Memory ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, SettingValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<(), LedError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn force_save(&mut self) -> Result<(), LedError> {
        Ok(())
    }
}

// ── JSON file ──────────────────────────────────────────────────────

/// A registry persisted as a single JSON object.
#[derive(Debug)]
pub struct JsonRegistryFile {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
}

impl JsonRegistryFile {
    /// Load the registry at `path`. A missing file is an empty registry; an
    /// unreadable one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedError> {
        let path = path.into();
        let values: BTreeMap<String, SettingValue> = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt registry {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), LedError> {
        let text = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonRegistryFile {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: SettingValue) -> Result<(), LedError> {
        self.values.insert(key.to_string(), value);
        self.save()
    }

    fn force_save(&mut self) -> Result<(), LedError> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_typed_getters() {
        let mut store = MemoryStore::new();
        store.set("party", true.into()).unwrap();
        store.set("user_brightness", 42.0.into()).unwrap();

        assert!(store.has("party"));
        assert_eq!(store.get_bool("party"), Some(true));
        assert_eq!(store.get_float("user_brightness"), Some(42.0));
        assert_eq!(store.get_float("party"), None);
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn registry_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main_lighting.json");

        let mut registry = JsonRegistryFile::open(&path).unwrap();
        assert!(!registry.has("party"));
        registry.set("party", true.into()).unwrap();
        registry.set("user_brightness", 55.5.into()).unwrap();

        let reloaded = JsonRegistryFile::open(&path).unwrap();
        assert_eq!(reloaded.path(), path.as_path());
        assert_eq!(reloaded.get_bool("party"), Some(true));
        assert_eq!(reloaded.get_float("user_brightness"), Some(55.5));
        assert!(!reloaded.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn integer_json_values_load_as_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main_lighting.json");
        fs::write(&path, r#"{"user_brightness": 100, "party": false}"#).unwrap();

        let registry = JsonRegistryFile::open(&path).unwrap();
        assert_eq!(registry.get_float("user_brightness"), Some(100.0));
        assert_eq!(registry.get_bool("party"), Some(false));
    }

    #[test]
    fn corrupt_registry_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main_lighting.json");
        fs::write(&path, "{not json").unwrap();

        let registry = JsonRegistryFile::open(&path).unwrap();
        assert!(!registry.has("party"));
    }
}
