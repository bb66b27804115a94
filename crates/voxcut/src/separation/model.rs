//! Model management for vocal separation
//!
//! Handles downloading, caching, and locating ONNX models. Models are
//! downloaded on first use and cached locally.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use super::config::{ModelType, SeparationConfig};
use super::error::{Result, SeparationError};

/// Download progress callback (0.0 to 1.0)
pub type DownloadProgress = Box<dyn Fn(f32) + Send>;

/// Manages model downloads and caching
pub struct ModelManager {
    /// Directory where models are cached
    cache_dir: PathBuf,
}

impl ModelManager {
    /// Create a new ModelManager with the default cache directory
    ///
    /// Default location: `~/.cache/voxcut/models/`
    pub fn new() -> Self {
        Self::with_cache_dir(Self::default_cache_dir())
    }

    /// Create a ModelManager with a custom cache directory
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// ModelManager for the cache directory a config asks for
    pub fn for_config(config: &SeparationConfig) -> Self {
        match &config.cache_dir {
            Some(dir) => Self::with_cache_dir(dir.clone()),
            None => Self::new(),
        }
    }

    /// Get the default cache directory
    pub fn default_cache_dir() -> PathBuf {
        voxcut_core::config::default_cache_dir().join("models")
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model, downloading if necessary
    ///
    /// Downloads both the .onnx file and its .onnx.data weights file.
    pub fn ensure_model(
        &self,
        model: ModelType,
        progress: Option<DownloadProgress>,
    ) -> Result<PathBuf> {
        let model_path = self.model_path(model);
        let data_path = self.data_path(model);
        let needs_data = model.has_external_data();

        let model_exists = model_path.exists();
        let data_exists = !needs_data || data_path.exists();

        if model_exists && data_exists {
            log::info!("Model {} found at {:?}", model.display_name(), model_path);
            if let Some(cb) = &progress {
                cb(1.0);
            }
            return Ok(model_path);
        }

        let download_model = !model_exists;
        let download_data = needs_data && !data_exists;

        // The graph file is small; only the weights report progress
        if download_model {
            log::info!(
                "Downloading model {} from {}",
                model.display_name(),
                model.download_url()
            );
            self.download_file(model.download_url(), &model_path, None)?;

            if let Some(ref cb) = progress {
                if download_data {
                    cb(0.02);
                }
            }
        }

        if download_data {
            let url = model.data_download_url();
            log::info!("Downloading model data from {}", url);
            let data_progress: Option<DownloadProgress> = if download_model {
                // Both files: .data progress maps to 2%-100%
                progress.map(|cb| Box::new(move |p: f32| cb(0.02 + p * 0.98)) as DownloadProgress)
            } else {
                progress
            };
            self.download_file(&url, &data_path, data_progress)?;
        } else if let Some(ref cb) = progress {
            cb(1.0);
        }

        Ok(model_path)
    }

    /// Get the local path for the external data file
    pub fn data_path(&self, model: ModelType) -> PathBuf {
        self.cache_dir.join(model.data_filename())
    }

    /// Get the local path where a model would be stored
    pub fn model_path(&self, model: ModelType) -> PathBuf {
        self.cache_dir.join(model.filename())
    }

    /// Check if a model is already downloaded (including external data file)
    pub fn is_model_available(&self, model: ModelType) -> bool {
        let model_exists = self.model_path(model).exists();
        let data_exists = !model.has_external_data() || self.data_path(model).exists();
        model_exists && data_exists
    }

    /// Download `url` to `target_path` via a temp file
    ///
    /// The temp file is only renamed into place once its size matches the
    /// advertised Content-Length.
    fn download_file(
        &self,
        url: &str,
        target_path: &Path,
        progress: Option<DownloadProgress>,
    ) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let temp_path = target_path.with_extension("tmp");
        log::info!("Downloading {} to {:?}", url, target_path);

        let response = ureq::get(url)
            .call()
            .map_err(|e| SeparationError::ModelDownloadFailed(e.to_string()))?;

        let content_length: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut file = fs::File::create(&temp_path)?;
        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];
        let mut downloaded: u64 = 0;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(n) => n,
                Err(e) => {
                    drop(file);
                    fs::remove_file(&temp_path).ok();
                    return Err(SeparationError::ModelDownloadFailed(e.to_string()));
                }
            };
            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read])?;
            downloaded += bytes_read as u64;

            if let (Some(cb), Some(total)) = (&progress, content_length) {
                let pct = downloaded as f32 / total as f32;
                cb(pct.min(0.99)); // Cap at 99% until verification
            }
        }

        file.flush()?;
        drop(file);

        let actual_size = fs::metadata(&temp_path)?.len();
        if let Some(expected) = content_length {
            if actual_size != expected {
                fs::remove_file(&temp_path).ok();
                return Err(SeparationError::ModelDownloadFailed(format!(
                    "Download incomplete: expected {} bytes, got {}",
                    expected, actual_size
                )));
            }
        }

        fs::rename(&temp_path, target_path)?;

        log::info!(
            "Successfully downloaded {:?} ({} bytes)",
            target_path.file_name().unwrap_or_default(),
            actual_size
        );

        if let Some(cb) = progress {
            cb(1.0);
        }
        Ok(())
    }

    /// Delete a cached model (including external data file)
    pub fn delete_model(&self, model: ModelType) -> Result<()> {
        let model_path = self.model_path(model);
        if model_path.exists() {
            fs::remove_file(&model_path)?;
            log::info!("Deleted cached model: {:?}", model_path);
        }

        if model.has_external_data() {
            let data_path = self.data_path(model);
            if data_path.exists() {
                fs::remove_file(&data_path)?;
                log::info!("Deleted model data: {:?}", data_path);
            }
        }
        Ok(())
    }

    /// Get total size of all cached models (including external data files)
    pub fn cache_size(&self) -> u64 {
        let size_of = |path: PathBuf| fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        ModelType::all()
            .iter()
            .map(|model| {
                let data_size = if model.has_external_data() {
                    size_of(self.data_path(*model))
                } else {
                    0
                };
                size_of(self.model_path(*model)) + data_size
            })
            .sum()
    }

    /// Clear all cached models
    pub fn clear_cache(&self) -> Result<()> {
        for model in ModelType::all() {
            self.delete_model(*model)?;
        }
        Ok(())
    }
}

/// Log download progress in 10% steps
pub fn log_progress(model: ModelType) -> DownloadProgress {
    let last_decile = AtomicU32::new(0);
    Box::new(move |p: f32| {
        let decile = (p * 10.0) as u32;
        if decile > last_decile.swap(decile, Ordering::Relaxed) {
            log::info!("Downloading {}: {}%", model.display_name(), decile * 10);
        }
    })
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}
