//! Generic configuration I/O utilities
//!
//! YAML loading and saving for any serializable configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
///
/// ```ignore
/// let config: AppConfig = load_config(Path::new("config.yaml"));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("load_config: Loading from {:?}", path);

    if !path.exists() {
        log::info!("load_config: Config file doesn't exist, using defaults");
        return T::default();
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log::warn!("load_config: Failed to read config file: {}, using defaults", e);
            return T::default();
        }
    };

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("load_config: Loaded config from {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: Failed to parse config: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    log::info!("save_config: Saving to {:?}", path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("save_config: Config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct TestConfig {
        tolerance: usize,
        root: String,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                tolerance: 256,
                root: "output".to_string(),
            }
        }
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: TestConfig = load_config(Path::new("/nonexistent/voxcut/config.yaml"));
        assert_eq!(config, TestConfig::default());
    }

    #[test]
    fn test_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = TestConfig {
            tolerance: 64,
            root: "renders".to_string(),
        };
        save_config(&config, &path).unwrap();

        let loaded: TestConfig = load_config(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_yaml_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "tolerance: [not a number").unwrap();

        let loaded: TestConfig = load_config(&path);
        assert_eq!(loaded, TestConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "root: elsewhere\n").unwrap();

        let loaded: TestConfig = load_config(&path);
        assert_eq!(loaded.root, "elsewhere");
        assert_eq!(loaded.tolerance, 256);
    }
}
