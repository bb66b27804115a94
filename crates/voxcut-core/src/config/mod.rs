//! Shared configuration utilities for voxcut
//!
//! - Generic YAML config loading/saving
//! - Standard config and cache locations
//!
//! # Usage
//!
//! ```ignore
//! use voxcut_core::config::{load_config, save_config, default_config_path};
//!
//! let config: AppConfig = load_config(&default_config_path("config.yaml"));
//! save_config(&config, &default_config_path("config.yaml"))?;
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_cache_dir, default_config_dir, default_config_path};
