//! Configuration loading for gmailsort
//!
//! Provides utilities for locating the shared gmailsort config directory
//! (~/.config/gmailsort/) and the per-profile directories below it, and for
//! loading and saving JSON files there.
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the application directory inside the platform config directory
const APP_DIR: &str = "gmailsort";

/// Subdirectory holding one directory per profile
const PROFILES_DIR: &str = "profiles";

/// Initialize the gmailsort config directory.
///
/// Creates ~/.config/gmailsort/ if it doesn't exist.
/// Call this once at application startup.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the gmailsort config directory (~/.config/gmailsort/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a config file within the gmailsort config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Get the directory holding all profiles (~/.config/gmailsort/profiles/)
pub fn profiles_dir() -> Option<PathBuf> {
    config_dir().map(|p| p.join(PROFILES_DIR))
}

/// Get the directory of a single profile below `root`
///
/// Profile names are used verbatim as directory names, so separators and
/// parent references are rejected.
pub fn profile_dir_in(root: &Path, profile: &str) -> Result<PathBuf> {
    if profile.is_empty()
        || profile == "."
        || profile == ".."
        || profile.contains(['/', '\\'])
    {
        anyhow::bail!("Invalid profile name: '{}'", profile);
    }
    Ok(root.join(profile))
}

/// Load and parse a JSON config file from the gmailsort config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Check if a config file exists in the gmailsort config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Ensure the gmailsort config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    ensure_dir(&dir)
}

/// Ensure an arbitrary directory exists
pub fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir.to_path_buf())
}

/// Save a value as pretty JSON to an arbitrary path, creating parent directories
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_config_dir() {
        let dir = config_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("gmailsort"));
    }

    #[test]
    fn test_profiles_dir() {
        let dir = profiles_dir().unwrap();
        assert!(dir.ends_with("gmailsort/profiles"));
    }

    #[test]
    fn test_profile_dir_in() {
        let root = Path::new("/tmp/profiles");
        assert_eq!(
            profile_dir_in(root, "work").unwrap(),
            PathBuf::from("/tmp/profiles/work")
        );
        assert!(profile_dir_in(root, "").is_err());
        assert!(profile_dir_in(root, "..").is_err());
        assert!(profile_dir_in(root, "a/b").is_err());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_then_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sample.json");
        let value = Sample {
            name: "work".to_string(),
            count: 3,
        };

        save_json_file(&path, &value).unwrap();
        let loaded: Sample = load_json_file(&path).unwrap();
        assert_eq!(loaded, value);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample> = load_json_file(&dir.path().join("missing.json"));
        assert!(result.is_err());
    }
}
