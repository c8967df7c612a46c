use clap::Parser;
use ich_core::cli::{Cli, Command};
use ich_core::training::{InferenceBackend, TrainingBackend};
use ich_core::{Pipeline, TextReport};
use log::{error, info};
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    info!(
        "Head: {}, window: {}, images: {:?}",
        config.head_variant, config.window, config.image_format
    );

    let pipeline = Pipeline::new(config);
    let device = Default::default();

    let report = match cli.command {
        Command::Prepare => pipeline
            .prepare()
            .map(|summary| TextReport::prepare(&summary).to_string()),
        Command::Train => pipeline
            .train::<TrainingBackend>(&device)
            .map(|(_, report)| TextReport::training(&report).to_string()),
        Command::Predict => pipeline
            .predict_saved::<InferenceBackend>(&device)
            .map(|summary| TextReport::predict(&summary).to_string()),
        Command::Run => pipeline
            .run::<TrainingBackend>(&device)
            .map(|summary| TextReport::run(&summary).to_string()),
    };

    match report {
        Ok(text) => print!("{}", text),
        Err(e) => {
            error!("{:?} failed: {}", cli.command, e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
