// src/core/paths.rs

use crate::constants::{CONFIG_DIRECTORY_ENV, DEFAULT_CONFIG_DIRNAME};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the user's home directory.")]
    HomeDirNotFound,
    #[error("Could not expand config directory '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// Returns the directory holding the global `config.json`.
///
/// `IONIC_CONFIG_DIRECTORY` wins when set (with `~` and `$VAR` expansion
/// against the given environment); otherwise `~/.ionic`. The directory is not
/// created here, see [`crate::core::config_store::ConfigStore::prepare`].
pub fn resolve_config_dir(env: &HashMap<String, String>) -> Result<PathBuf, PathError> {
    if let Some(template) = env.get(CONFIG_DIRECTORY_ENV).filter(|v| !v.trim().is_empty()) {
        return expand_path_template(template, env);
    }

    let home = dirs::home_dir().ok_or(PathError::HomeDirNotFound)?;
    Ok(home.join(DEFAULT_CONFIG_DIRNAME))
}

/// Expands `~` and environment variables in a path, looking variables up in
/// `env` rather than the ambient process environment.
pub fn expand_path_template(
    template: &str,
    env: &HashMap<String, String>,
) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full_with_context(
        template,
        || dirs::home_dir().map(|p| p.to_string_lossy().into_owned()),
        |var: &str| -> Result<Option<String>, std::env::VarError> { Ok(env.get(var).cloned()) },
    )
    .map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;

    Ok(PathBuf::from(expanded.into_owned()))
}

/// Walks upward from `start` looking for a directory that contains `marker`.
///
/// Returns the first (closest) match, or `None` once the filesystem root has
/// been checked without success.
pub fn find_base_directory(start: &Path, marker: &str) -> Option<PathBuf> {
    let start = match dunce::canonicalize(start) {
        Ok(path) => path,
        Err(e) => {
            log::debug!("Could not canonicalize '{}': {}", start.display(), e);
            start.to_path_buf()
        }
    };

    start
        .ancestors()
        .find(|dir| dir.join(marker).is_file())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_dir_env_override() {
        let mut env = HashMap::new();
        env.insert(CONFIG_DIRECTORY_ENV.to_string(), "/opt/ionic-config".to_string());
        let dir = resolve_config_dir(&env).unwrap();
        assert_eq!(dir, PathBuf::from("/opt/ionic-config"));
    }

    #[test]
    fn test_config_dir_env_override_expands_variables() {
        let mut env = HashMap::new();
        env.insert("BASE".to_string(), "/srv".to_string());
        env.insert(CONFIG_DIRECTORY_ENV.to_string(), "$BASE/ionic".to_string());
        let dir = resolve_config_dir(&env).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/ionic"));
    }

    #[test]
    fn test_config_dir_defaults_to_home() {
        let env = HashMap::new();
        let dir = resolve_config_dir(&env).unwrap();
        assert!(dir.ends_with(DEFAULT_CONFIG_DIRNAME));
    }

    #[test]
    fn test_find_base_directory_walks_up() {
        let root = tempdir().unwrap();
        let app = root.path().join("app");
        let nested = app.join("src").join("pages");
        fs::create_dir_all(&nested).unwrap();
        fs::write(app.join("ionic.config.json"), "{}").unwrap();

        let found = find_base_directory(&nested, "ionic.config.json").unwrap();
        assert_eq!(found, dunce::canonicalize(&app).unwrap());
    }

    #[test]
    fn test_find_base_directory_none_when_missing() {
        let root = tempdir().unwrap();
        let marker = "marker-that-should-not-exist-anywhere.json";
        assert!(find_base_directory(root.path(), marker).is_none());
    }
}
