mod app;
mod audio;
mod catalog;
mod cli;
mod config;
mod error;
mod http;
mod messages;
mod models;
mod pipeline;
mod recognition;
mod server;
mod services;
#[cfg(test)]
mod test_support;

use app::App;
use audio::WavReport;
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use pipeline::{AudioSource, latest_audio};

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    // Create LocalSet for !Send futures (needed for Recorder which holds cpal::Stream)
    let local = tokio::task::LocalSet::new();

    local
        .run_until(async move { run_command(config, cli.command.unwrap_or(Command::Listen)).await })
        .await
}

async fn run_command(config: Config, command: Command) -> Result<()> {
    match command {
        // Analysis needs neither the device nor the network
        Command::Analyze { file } => analyze(&config, file),
        command => run_with_app(App::new(config)?, command).await,
    }
}

async fn run_with_app(app: App, command: Command) -> Result<()> {
    match command {
        Command::Listen => app.run().await,

        Command::Devices => {
            let devices = app.pipeline().recorder().list_devices().await?;
            if devices.is_empty() {
                println!("No input devices found");
            }
            for device in devices {
                println!(
                    "[{}] {}{} ({} ch, {} Hz)",
                    device.index,
                    device.name,
                    if device.is_default { " (default)" } else { "" },
                    device.channels,
                    device.sample_rate
                );
            }
            Ok(())
        }

        Command::Record { duration, device } => {
            let request = app.record_request(duration, device);
            let recording = app.pipeline().recorder().record(request).await?;
            print_json(&recording)
        }

        Command::Recognize { file } => print_json(&app.pipeline().recognize_file(&file).await),

        Command::Download {
            title,
            artist,
            link,
        } => print_json(
            &app.pipeline()
                .download(&title, &artist, link.as_deref())
                .await,
        ),

        Command::Identify {
            file,
            last,
            duration,
            device,
        } => {
            let source = match (file, last) {
                (Some(file), _) => AudioSource::File(file),
                (None, true) => AudioSource::Latest,
                (None, false) => AudioSource::Record(app.record_request(duration, device)),
            };
            let report = app.pipeline().run(source).await;
            print_json(&report)
        }

        Command::Serve { bind } => server::serve(app.server_state(), &bind).await,

        Command::Analyze { file } => analyze_file(file, app.pipeline().recordings_dir()),
    }
}

fn analyze(config: &Config, file: Option<PathBuf>) -> Result<()> {
    analyze_file(file, &config.recordings_dir)
}

fn analyze_file(file: Option<PathBuf>, recordings_dir: &Path) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => latest_audio(recordings_dir, &["wav"])
            .with_context(|| format!("No WAV recordings in {}", recordings_dir.display()))?,
    };

    let report = WavReport::analyze(&path)?;
    print!("{}", report);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}
