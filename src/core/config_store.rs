//! # Config Store
//!
//! Owns the global `config.json` document. The document is loaded once per
//! process, mutated in memory through [`ConfigStore::update`], and written back
//! atomically by [`ConfigStore::save`]. A single mutex guards both the document
//! and the on-disk file, so a load never observes a half-finished save.

use crate::models::ConfigDocument;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not write config file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config file '{path}' is malformed: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Invalid config key '{0}'.")]
    InvalidKey(String),
}

#[derive(Debug, Default)]
struct StoreState {
    document: ConfigDocument,
    load_warning: Option<String>,
}

/// The process-wide configuration store.
#[derive(Debug)]
pub struct ConfigStore {
    directory: PathBuf,
    file_name: String,
    state: Mutex<StoreState>,
}

impl ConfigStore {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A poisoned lock still holds a usable document.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads the document from disk.
    ///
    /// A missing file yields the defaults. A malformed file also yields the
    /// defaults; the parse error is logged as a warning and kept in
    /// [`load_warning`](Self::load_warning). Only genuine I/O failures (e.g.
    /// permission denied) are returned as errors.
    pub fn load(&self) -> Result<ConfigDocument, ConfigError> {
        let mut state = self.lock();
        let path = self.path();

        let document = match fs::read_to_string(&path) {
            Ok(content) => match parse_document(&path, &content) {
                Ok(document) => {
                    state.load_warning = None;
                    document
                }
                Err(e) => {
                    log::warn!("{}. Falling back to default configuration.", e);
                    state.load_warning = Some(e.to_string());
                    ConfigDocument::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No config file at '{}', using defaults.", path.display());
                state.load_warning = None;
                ConfigDocument::default()
            }
            Err(e) => return Err(ConfigError::Read { path, source: e }),
        };

        state.document = document.clone();
        Ok(document)
    }

    /// The warning recorded by the last [`load`](Self::load), if the file was malformed.
    pub fn load_warning(&self) -> Option<String> {
        self.lock().load_warning.clone()
    }

    /// A snapshot of the in-memory document.
    pub fn document(&self) -> ConfigDocument {
        self.lock().document.clone()
    }

    /// Mutates the in-memory document. Call [`save`](Self::save) to persist.
    pub fn update<R>(&self, f: impl FnOnce(&mut ConfigDocument) -> R) -> R {
        let mut state = self.lock();
        f(&mut state.document)
    }

    /// Ensures the config directory exists and migrates legacy keys.
    pub fn prepare(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.directory).map_err(|e| ConfigError::Write {
            path: self.directory.clone(),
            source: e,
        })?;

        let migrated = self.update(migrate_legacy_keys);
        if migrated {
            log::debug!("Migrated legacy config keys in '{}'.", self.path().display());
            self.save()?;
        }
        Ok(())
    }

    /// Persists the in-memory document: write to a temp file in the same
    /// directory, then rename over the target.
    pub fn save(&self) -> Result<(), ConfigError> {
        let state = self.lock();
        let path = self.path();
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.clone(),
            source,
        };

        let mut content = serde_json::to_string_pretty(&state.document)?;
        content.push('\n');

        fs::create_dir_all(&self.directory).map_err(write_err)?;
        let mut temp = NamedTempFile::new_in(&self.directory).map_err(write_err)?;
        temp.write_all(content.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        log::debug!("Saved config to '{}'.", path.display());
        Ok(())
    }

    /// Reads a value by dotted key (`tokens.user`). `None` when absent.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        let root = serde_json::to_value(&self.lock().document)?;
        let mut current = &root;
        for part in split_key(key)? {
            match current.get(part) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }

    /// Sets a value by dotted key, creating intermediate objects.
    pub fn set_value(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let parts = split_key(key)?;
        let mut state = self.lock();
        let mut root = serde_json::to_value(&state.document)?;

        let mut current = &mut root;
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;
        for part in parents {
            if !current.get(*part).is_some_and(Value::is_object) {
                if let Some(map) = current.as_object_mut() {
                    map.insert((*part).to_string(), Value::Object(Default::default()));
                }
            }
            current = current
                .get_mut(*part)
                .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;
        }
        current
            .as_object_mut()
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?
            .insert((*last).to_string(), value);

        state.document = serde_json::from_value(root)?;
        Ok(())
    }

    /// Removes a value by dotted key. Returns whether anything was removed.
    pub fn unset_value(&self, key: &str) -> Result<bool, ConfigError> {
        let parts = split_key(key)?;
        let mut state = self.lock();
        let mut root = serde_json::to_value(&state.document)?;

        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ConfigError::InvalidKey(key.to_string()))?;
        let mut current = &mut root;
        for part in parents {
            match current.get_mut(*part) {
                Some(next) => current = next,
                None => return Ok(false),
            }
        }
        let removed = current
            .as_object_mut()
            .and_then(|map| map.remove(*last))
            .is_some();

        if removed {
            state.document = serde_json::from_value(root)?;
        }
        Ok(removed)
    }
}

fn parse_document(path: &Path, content: &str) -> Result<ConfigDocument, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ConfigDocument::default());
    }
    serde_json::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn split_key(key: &str) -> Result<Vec<&str>, ConfigError> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(parts)
}

/// Moves `cliFlags.interactive` to the top-level `interactive` key and drops
/// the rest of `cliFlags`. Returns `true` if the document changed.
fn migrate_legacy_keys(document: &mut ConfigDocument) -> bool {
    let Some(legacy) = document.extra.remove("cliFlags") else {
        return false;
    };

    if document.interactive.is_none() {
        document.interactive = legacy.get("interactive").and_then(Value::as_bool);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CONFIG_FILE;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_directory_returns_defaults() {
        let root = tempdir().unwrap();
        let store = ConfigStore::new(root.path().join("does").join("not").join("exist"), CONFIG_FILE);

        let doc = store.load().unwrap();
        assert_eq!(doc, ConfigDocument::default());
        assert!(store.load_warning().is_none());
    }

    #[test]
    fn test_load_malformed_returns_defaults_with_warning() {
        let root = tempdir().unwrap();
        for garbage in ["{not json", "[1, 2", "\"interactive\": false", "{\"interactive\": \"maybe\"}"] {
            fs::write(root.path().join(CONFIG_FILE), garbage).unwrap();
            let store = ConfigStore::new(root.path(), CONFIG_FILE);

            let doc = store.load().unwrap();
            assert_eq!(doc, ConfigDocument::default(), "input: {garbage}");
            assert!(store.load_warning().is_some(), "input: {garbage}");
        }
    }

    #[test]
    fn test_save_then_load_persists_changes() {
        let root = tempdir().unwrap();
        let store = ConfigStore::new(root.path(), CONFIG_FILE);
        store.load().unwrap();
        store.update(|doc| {
            doc.interactive = Some(false);
            doc.tokens.user = Some("abc".to_string());
        });
        store.save().unwrap();

        let reopened = ConfigStore::new(root.path(), CONFIG_FILE);
        let doc = reopened.load().unwrap();
        assert_eq!(doc.interactive, Some(false));
        assert_eq!(doc.tokens.user.as_deref(), Some("abc"));

        // No temp files left behind.
        let entries: Vec<_> = fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_prepare_creates_directory_and_migrates_cli_flags() {
        let root = tempdir().unwrap();
        let dir = root.path().join("cfg");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(CONFIG_FILE),
            r#"{"cliFlags":{"interactive":false,"confirm":true},"npmClient":"yarn"}"#,
        )
        .unwrap();

        let store = ConfigStore::new(&dir, CONFIG_FILE);
        store.load().unwrap();
        store.prepare().unwrap();

        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(dir.join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(on_disk["interactive"], json!(false));
        assert!(on_disk.get("cliFlags").is_none());
        assert_eq!(on_disk["npmClient"], json!("yarn"));
    }

    #[test]
    fn test_prepare_creates_missing_directory() {
        let root = tempdir().unwrap();
        let dir = root.path().join("fresh");
        let store = ConfigStore::new(&dir, CONFIG_FILE);
        store.load().unwrap();
        store.prepare().unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_dotted_key_get_set_unset() {
        let root = tempdir().unwrap();
        let store = ConfigStore::new(root.path(), CONFIG_FILE);
        store.load().unwrap();

        assert_eq!(store.get_value("tokens.user").unwrap(), None);

        store.set_value("tokens.user", json!("secret")).unwrap();
        store.set_value("custom.nested.flag", json!(true)).unwrap();
        assert_eq!(store.get_value("tokens.user").unwrap(), Some(json!("secret")));
        assert_eq!(store.document().tokens.user.as_deref(), Some("secret"));
        assert_eq!(store.get_value("custom.nested.flag").unwrap(), Some(json!(true)));

        assert!(store.unset_value("tokens.user").unwrap());
        assert!(!store.unset_value("tokens.user").unwrap());
        assert_eq!(store.document().tokens.user, None);

        assert!(matches!(store.get_value("a..b"), Err(ConfigError::InvalidKey(_))));
    }

    #[test]
    fn test_set_value_with_wrong_type_is_rejected() {
        let root = tempdir().unwrap();
        let store = ConfigStore::new(root.path(), CONFIG_FILE);
        store.load().unwrap();

        let result = store.set_value("interactive", json!("not-a-bool"));
        assert!(result.is_err());
        assert_eq!(store.document().interactive, None);
    }
}
