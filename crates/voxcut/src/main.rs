//! voxcut - remove vocals from selected sections of a song
//!
//! `voxcut process` decodes the input, queues the requested sections, runs
//! the separation job on a worker thread and prints one status line per
//! event. `voxcut model` manages the cached separation models.
//!
//! Set RUST_LOG=debug for verbose output.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use voxcut::cli::{Cli, Commands, ProcessArgs};
use voxcut::config::{default_config_path, load_config, Config};
use voxcut::decode::decode_file;
use voxcut::separation::{ModelManager, OrtBackend};
use voxcut_core::output::OutputWriter;
use voxcut_core::pipeline::ProcessingService;
use voxcut_core::session::EditingSession;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    let result = match cli.command {
        Commands::Process(args) => process(args, config),
        Commands::Model { action } => {
            let models = ModelManager::for_config(&config.separation);
            action.run(&models, config.separation.model).map(|lines| {
                for line in lines {
                    println!("{}", line);
                }
            })
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("voxcut failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn process(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply_to(&mut config);

    let track = decode_file(&args.input)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;

    let mut session = EditingSession::new(track, &args.input);
    for range in &args.sections {
        session.add_section(*range)?;
    }
    for label in session.section_labels() {
        println!("{}", label);
    }
    let request = match session.snapshot() {
        Ok(request) => request,
        Err(e) => {
            println!("{}", e.status_message());
            return Err(e.into());
        }
    };

    let adapter = OrtBackend::new(config.separation.clone());
    let writer = OutputWriter::new(config.output.clone());
    let handle =
        ProcessingService::spawn(request, Box::new(adapter), config.pipeline.clone(), writer)
            .context("Failed to start processing thread")?;

    for status in handle.progress().iter() {
        println!("{}", status.description());
    }

    let outcome = handle.wait()?;
    log::info!(
        "Wrote {:.2}s of audio to {:?} in {:.1}s",
        outcome.output_secs,
        outcome.written.audio_path,
        outcome.duration.as_secs_f64()
    );
    Ok(())
}
