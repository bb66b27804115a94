//! Command-line interface for the `voxcut` binary
//!
//! ```text
//! voxcut process <INPUT> -s START-END [-s START-END ...] [OPTIONS]
//! voxcut model download|info|delete|clear
//! ```
//!
//! Times accept `SS`, `MM:SS` or `HH:MM:SS`, with optional fractions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use voxcut_core::output::AudioFormat;
use voxcut_core::section::TimeRange;
use voxcut_core::time_format::parse_time;

use crate::config::Config;
use crate::separation::{log_progress, ModelManager, ModelType};

#[derive(Parser, Debug)]
#[command(
    name = "voxcut",
    version,
    about = "Remove vocals from selected sections of a song",
    long_about = "Remove vocals from selected sections of a song.\n\n\
                  Each section is played twice in the output: first as-is, then without vocals."
)]
pub struct Cli {
    /// Config file (default: ~/.config/voxcut/config.yaml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process sections of a song
    Process(ProcessArgs),
    /// Manage the cached separation models
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

/// Arguments for a processing run
#[derive(Args, Debug, Clone, PartialEq)]
pub struct ProcessArgs {
    /// Audio file to process
    pub input: PathBuf,

    /// Section to process, e.g. 1:30-2:05.5 (repeatable)
    #[arg(
        short = 's',
        long = "section",
        value_name = "START-END",
        value_parser = parse_section,
        required = true
    )]
    pub sections: Vec<TimeRange>,

    /// Output root directory (overrides config)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Sections separated at once (overrides config)
    #[arg(short = 'j', long, value_name = "N")]
    pub parallel: Option<usize>,

    /// Output container: mp3 or wav (overrides config)
    #[arg(long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<AudioFormat>,

    /// MP3 bitrate in kbps (overrides config)
    #[arg(long, value_name = "KBPS")]
    pub bitrate: Option<u32>,

    /// Disable GPU acceleration
    #[arg(long)]
    pub cpu: bool,
}

impl ProcessArgs {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(dir) = &self.output {
            config.output.root_dir = dir.clone();
        }
        if let Some(parallel) = self.parallel {
            config.pipeline.max_parallel_sections = parallel;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if let Some(kbps) = self.bitrate {
            config.output.mp3_bitrate_kbps = kbps;
        }
        if self.cpu {
            config.separation.use_gpu = false;
        }
        config.validate();
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ModelAction {
    /// Download a model now so later runs work offline
    Download {
        /// Model to fetch (default: the configured model)
        #[arg(long, value_enum)]
        model: Option<ModelType>,
    },
    /// Show which models are cached and how much space they use
    Info,
    /// Delete one cached model
    Delete {
        /// Model to delete (default: the configured model)
        #[arg(long, value_enum)]
        model: Option<ModelType>,
    },
    /// Delete every cached model
    Clear,
}

impl ModelAction {
    /// Run the action against a model cache, returning lines to print
    pub fn run(&self, models: &ModelManager, configured: ModelType) -> anyhow::Result<Vec<String>> {
        let lines = match self {
            Self::Download { model } => {
                let model = model.unwrap_or(configured);
                let path = models.ensure_model(model, Some(log_progress(model)))?;
                vec![format!("{} ready at {}", model.display_name(), path.display())]
            }
            Self::Info => {
                let mut lines = vec![format!("Model cache: {}", models.cache_dir().display())];
                for model in ModelType::all() {
                    let state = if models.is_model_available(*model) {
                        "cached"
                    } else {
                        "not downloaded"
                    };
                    lines.push(format!("  {}: {}", model.display_name(), state));
                }
                lines.push(format!("Total size: {}", format_bytes(models.cache_size())));
                lines
            }
            Self::Delete { model } => {
                let model = model.unwrap_or(configured);
                models.delete_model(model)?;
                vec![format!("Deleted {}", model.display_name())]
            }
            Self::Clear => {
                let freed = models.cache_size();
                models.clear_cache()?;
                vec![format!("Cleared model cache ({} freed)", format_bytes(freed))]
            }
        };
        Ok(lines)
    }
}

/// Parse `START-END` into a range
pub fn parse_section(text: &str) -> Result<TimeRange, String> {
    let invalid = || format!("invalid section {:?}: expected START-END, e.g. 1:30-2:05", text);
    let (start, end) = text.split_once('-').ok_or_else(invalid)?;
    let start = parse_time(start).ok_or_else(invalid)?;
    let end = parse_time(end).ok_or_else(invalid)?;
    TimeRange::new(start, end).map_err(|e| e.to_string())
}

/// Parse `mp3` or `wav`
pub fn parse_format(text: &str) -> Result<AudioFormat, String> {
    match text.to_ascii_lowercase().as_str() {
        "mp3" => Ok(AudioFormat::Mp3),
        "wav" => Ok(AudioFormat::Wav),
        other => Err(format!("unknown format {:?}: expected mp3 or wav", other)),
    }
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("voxcut").chain(args.iter().copied()))
    }

    fn process_args(args: &[&str]) -> ProcessArgs {
        match parse(args).unwrap().command {
            Commands::Process(args) => args,
            other => panic!("expected process arguments, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command() {
        let args = process_args(&[
            "process", "song.mp3", "-s", "10-20", "--section", "0:50-1:00", "-o", "renders", "-j",
            "2", "--format", "wav", "--cpu",
        ]);
        assert_eq!(args.input, PathBuf::from("song.mp3"));
        assert_eq!(
            args.sections,
            vec![TimeRange::new(10.0, 20.0).unwrap(), TimeRange::new(50.0, 60.0).unwrap()]
        );
        assert_eq!(args.output, Some(PathBuf::from("renders")));
        assert_eq!(args.parallel, Some(2));
        assert_eq!(args.format, Some(AudioFormat::Wav));
        assert!(args.cpu);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = parse(&["model", "info", "--config", "alt.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.yaml")));
        assert!(matches!(cli.command, Commands::Model { action: ModelAction::Info }));
    }

    #[test]
    fn test_model_names() {
        let cli = parse(&["model", "download", "--model", "demucs6-stems"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Model {
                action: ModelAction::Download {
                    model: Some(ModelType::Demucs6Stems)
                }
            }
        ));
    }

    #[test]
    fn test_rejected_arguments() {
        use clap::error::ErrorKind;

        let kind = |args: &[&str]| parse(args).unwrap_err().kind();
        assert_eq!(kind(&["process", "a.mp3"]), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind(&["process", "-s", "1-2"]), ErrorKind::MissingRequiredArgument);
        assert_eq!(kind(&["process", "a.mp3", "-s", "20-10"]), ErrorKind::ValueValidation);
        assert_eq!(kind(&["process", "a.mp3", "-s", "1-2", "--bogus"]), ErrorKind::UnknownArgument);
        assert_eq!(kind(&["process", "a.mp3", "-s", "1-2", "b.mp3"]), ErrorKind::UnknownArgument);
        assert_eq!(kind(&["--help"]), ErrorKind::DisplayHelp);
        assert!(parse(&["process", "a.mp3", "-s"]).is_err());
        assert!(parse(&["process", "a.mp3", "-s", "1-2", "-j", "many"]).is_err());
    }

    #[test]
    fn test_parse_section() {
        assert_eq!(parse_section("1:30-2:05.5").unwrap(), TimeRange::new(90.0, 125.5).unwrap());
        assert!(parse_section("20-10").is_err());
        assert!(parse_section("10").is_err());
        assert!(parse_section("a-b").is_err());
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(parse_format("wav").unwrap(), AudioFormat::Wav);
        assert!(parse_format("flac").is_err());
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let args = process_args(&[
            "process", "a.mp3", "-s", "1-2", "-j", "64", "--cpu", "-o", "/tmp/out", "--bitrate",
            "999",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.pipeline.max_parallel_sections, 16);
        assert!(!config.separation.use_gpu);
        assert_eq!(config.output.root_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.output.format, AudioFormat::Mp3);
        assert_eq!(config.output.mp3_bitrate_kbps, 320);
    }

    #[test]
    fn test_model_actions_on_cache() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelManager::with_cache_dir(dir.path().to_path_buf());
        let model = ModelType::Demucs4Stems;
        std::fs::write(models.model_path(model), vec![0u8; 10]).unwrap();
        std::fs::write(models.data_path(model), vec![0u8; 20]).unwrap();

        // Already cached, so no network access
        let lines = ModelAction::Download { model: None }.run(&models, model).unwrap();
        assert!(lines[0].starts_with("Demucs 4-stem ready at"));

        let info = ModelAction::Info.run(&models, model).unwrap();
        assert_eq!(info[1], "  Demucs 4-stem: cached");
        assert_eq!(info.last().unwrap(), "Total size: 30 bytes");

        let cleared = ModelAction::Clear.run(&models, model).unwrap();
        assert_eq!(cleared, vec!["Cleared model cache (30 bytes freed)".to_string()]);
        assert!(!models.is_model_available(model));
        assert_eq!(models.cache_size(), 0);
    }

    #[test]
    fn test_delete_defaults_to_configured_model() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelManager::with_cache_dir(dir.path().to_path_buf());
        for model in ModelType::all() {
            std::fs::write(models.model_path(*model), b"graph").unwrap();
            std::fs::write(models.data_path(*model), b"weights").unwrap();
        }

        ModelAction::Delete { model: None }
            .run(&models, ModelType::Demucs6Stems)
            .unwrap();
        assert!(models.is_model_available(ModelType::Demucs4Stems));
        assert!(!models.is_model_available(ModelType::Demucs6Stems));
    }
}
