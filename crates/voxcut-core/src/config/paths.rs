//! Standard locations for voxcut configuration and caches

use std::path::PathBuf;

/// Application directory name used under the platform config/cache roots
const APP_DIR: &str = "voxcut";

/// Get the default config directory
///
/// Returns: `~/.config/voxcut` (platform equivalent elsewhere)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Get the default config file path for a given file name
///
/// Returns: `~/.config/voxcut/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Get the default cache directory
///
/// Returns: `~/.cache/voxcut` (platform equivalent elsewhere)
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path("config.yaml");
        assert!(path.ends_with("voxcut/config.yaml"));
    }

    #[test]
    fn test_cache_dir_ends_with_app_dir() {
        assert!(default_cache_dir().ends_with("voxcut"));
    }
}
