//! voice-memo CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voice_memo::cli::{
    app::{load_merged_config, run_formats, run_play, run_record, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands, RecordOptions},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use voice_memo::domain::config::AppConfig;
use voice_memo::domain::recording::RecordingLimit;
use voice_memo::infrastructure::XdgConfigStore;

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "voice_memo=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let presenter = Presenter::new();

    match cli.command {
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Formats => run_formats(&presenter),
        Commands::Play { locator } => run_play(locator).await,
        Commands::Record(args) => {
            let cli_config = AppConfig {
                input_device: args.device,
                recordings_dir: args.output_dir,
                max_duration: args.duration,
            };
            let config = load_merged_config(cli_config).await;

            let max_duration = match config.max_duration.as_ref() {
                Some(s) => match s.parse::<RecordingLimit>() {
                    Ok(d) => d,
                    Err(e) => {
                        presenter.error(&e.to_string());
                        return ExitCode::from(EXIT_USAGE_ERROR);
                    }
                },
                None => RecordingLimit::default(),
            };

            let options = RecordOptions {
                max_duration,
                output_dir: config.recordings_dir_or_default(),
                device: config.input_device().map(str::to_string),
            };

            run_record(options).await
        }
    }
}
