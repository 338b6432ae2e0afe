use crate::audio::AudioFormat;
use crate::catalog::{
    ApifyExtractor, CatalogSearch, DownloadBackend, DownloadPolicy, Downloader, MediaExtractor,
    RapidApiClient, SpotifyCatalog, TrackTagger,
};
use crate::config::Config;
use crate::http;
use crate::models::{PipelineReport, RecordRequest};
use crate::pipeline::{AudioSource, Pipeline};
use crate::recognition::{RecognitionPolicy, Recognizer, ShazamApi};
use crate::server::AppState;
use crate::services::{Recorder, RecorderHandle};

use anyhow::{Context, Result};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;

/// What the operator typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConsoleInput {
    Record,
    Last,
    Quit,
}

impl ConsoleInput {
    fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "q" => ConsoleInput::Quit,
            "l" => ConsoleInput::Last,
            _ => ConsoleInput::Record,
        }
    }
}

#[derive(Debug, PartialEq)]
enum ConsoleExit {
    Quit,
    Interrupted,
}

pub struct App {
    config: Config,
    pipeline: Arc<Pipeline>,
}

impl App {
    /// Wire the recorder service and remote clients.
    ///
    /// Must be called inside a LocalSet: the recorder is spawned with spawn_local.
    pub fn new(config: Config) -> Result<Self> {
        config.ensure_dirs()?;
        for name in config.missing_credentials() {
            tracing::warn!("{} is not set, remote calls that need it will fail", name);
        }

        let recorder = Self::setup_audio_pipeline(&config);
        let pipeline = Arc::new(Self::build_pipeline(&config, recorder)?);

        Ok(Self {
            config,
            pipeline,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn record_request(&self, duration: Option<u32>, device: Option<usize>) -> RecordRequest {
        RecordRequest {
            duration_secs: duration.unwrap_or(self.config.recording_duration),
            device_index: device.or(self.config.input_device),
        }
    }

    pub fn server_state(&self) -> AppState {
        AppState {
            pipeline: self.pipeline.clone(),
            downloads_dir: self.config.downloads_dir.clone(),
            default_duration: self.config.recording_duration,
            default_device: self.config.input_device,
        }
    }

    /// Interactive loop until `q`, end of input or Ctrl+C
    pub async fn run(self) -> Result<()> {
        println!("FlashShazam");
        println!("  Recording duration: {} s", self.config.recording_duration);
        println!("  Recordings: {}", self.config.recordings_dir.display());
        println!("  Downloads:  {}", self.config.downloads_dir.display());

        let lines = BufReader::new(tokio::io::stdin()).lines();
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        match self.console(lines, shutdown).await? {
            ConsoleExit::Quit => {}
            ConsoleExit::Interrupted => tracing::info!("Received Ctrl+C, shutting down"),
        }
        println!("Bye");
        Ok(())
    }

    /// Drive the prompt until `q` or end of input, or until `shutdown` resolves.
    ///
    /// `shutdown` is raced against both the prompt and a running pipeline.
    async fn console<R, S>(
        &self,
        mut lines: Lines<R>,
        mut shutdown: Pin<&mut S>,
    ) -> Result<ConsoleExit>
    where
        R: AsyncBufRead + Unpin,
        S: Future,
    {
        loop {
            println!();
            println!("Press Enter to record | 'l' - last recording | 'q' - quit");

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read from stdin")?,
                _ = shutdown.as_mut() => return Ok(ConsoleExit::Interrupted),
            };
            let source = match line.as_deref().map(ConsoleInput::parse) {
                None | Some(ConsoleInput::Quit) => return Ok(ConsoleExit::Quit),
                Some(ConsoleInput::Last) => AudioSource::Latest,
                Some(ConsoleInput::Record) => {
                    println!("Recording ({} s)...", self.config.recording_duration);
                    AudioSource::Record(self.record_request(None, None))
                }
            };

            tokio::select! {
                report = self.pipeline.run(source) => print_summary(&report),
                _ = shutdown.as_mut() => {
                    println!("Interrupted");
                    return Ok(ConsoleExit::Interrupted);
                }
            }
        }
    }

    fn setup_audio_pipeline(config: &Config) -> RecorderHandle {
        // Create and spawn Recorder (using spawn_local because it's !Send)
        let (recorder_tx, recorder_rx) = mpsc::channel(10);
        let recorder = Recorder::new(
            AudioFormat::default(),
            config.recordings_dir.clone(),
            recorder_rx,
        );
        tokio::task::spawn_local(recorder.run());

        RecorderHandle::new(recorder_tx)
    }

    fn build_pipeline(config: &Config, recorder: RecorderHandle) -> Result<Pipeline> {
        let http = http::build_client(Duration::from_secs(config.request_timeout))
            .context("Failed to build HTTP client")?;

        let recognizer = Recognizer::new(
            Box::new(ShazamApi::new(
                http.clone(),
                &config.recognition_api_url,
                &config.shazam_api_key,
            )),
            RecognitionPolicy::default(),
        );

        let (search, extractor): (Box<dyn CatalogSearch>, Box<dyn MediaExtractor>) =
            match config.download_backend {
                DownloadBackend::Apify => (
                    Box::new(SpotifyCatalog::new(
                        http.clone(),
                        &config.spotify_client_id,
                        &config.spotify_client_secret,
                    )),
                    Box::new(ApifyExtractor::new(
                        http.clone(),
                        &config.apify_token,
                        &config.apify_actor_id,
                    )),
                ),
                DownloadBackend::RapidApi => (
                    Box::new(RapidApiClient::new(
                        http.clone(),
                        &config.rapidapi_key,
                        &config.rapidapi_host,
                    )),
                    Box::new(RapidApiClient::new(
                        http.clone(),
                        &config.rapidapi_key,
                        &config.rapidapi_host,
                    )),
                ),
            };
        tracing::info!(backend = ?config.download_backend, "Download backend selected");

        let downloader = Downloader::new(
            search,
            extractor,
            config.downloads_dir.clone(),
            DownloadPolicy::default(),
        )
        .with_tagger(TrackTagger::new(http));

        Ok(Pipeline::new(
            recorder,
            recognizer,
            downloader,
            config.recordings_dir.clone(),
        ))
    }
}

/// Operator-facing summary of one run
pub fn print_summary(report: &PipelineReport) {
    if let Some(recording) = &report.recording {
        println!("Recorded: {}", recording.path.display());
        if let Some(warning) = &recording.warning {
            println!("  Warning: {}", warning);
        }
    }

    match &report.recognition {
        Some(recognition) if recognition.success => {
            println!("Recognized: {} - {}", recognition.title, recognition.artist);
            for (provider, url) in &recognition.external_track_links {
                println!("  {}: {}", provider, url);
            }
        }
        Some(recognition) => {
            println!(
                "Not recognized: {}",
                recognition.error.as_deref().unwrap_or("unknown error")
            );
            return;
        }
        None => {
            println!(
                "Failed: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
            return;
        }
    }

    match &report.download {
        Some(download) if download.success => {
            println!(
                "Downloaded: {}",
                download.filename.as_deref().unwrap_or_default()
            );
            if let Some(path) = &download.file_path {
                println!("  Path: {}", path.display());
            }
        }
        Some(download) => {
            println!(
                "Could not download: {}",
                download.error.as_deref().unwrap_or("unknown error")
            );
            println!("  The track was recognized but no download is available");
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, fixture, fixture_with_recorder, stalled_recorder};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn app(f: &Fixture) -> App {
        App {
            config: Config {
                recording_duration: 1,
                ..Config::default()
            },
            pipeline: f.pipeline.clone(),
        }
    }

    fn input(text: &'static str) -> Lines<&'static [u8]> {
        text.as_bytes().lines()
    }

    #[test]
    fn test_console_input() {
        assert_eq!(ConsoleInput::parse(""), ConsoleInput::Record);
        assert_eq!(ConsoleInput::parse("  L \n"), ConsoleInput::Last);
        assert_eq!(ConsoleInput::parse("Q"), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse("anything"), ConsoleInput::Record);
    }

    #[tokio::test]
    async fn test_quit_and_end_of_input_leave_the_loop() {
        let f = fixture(json!({"status": "finished", "results": []}));
        let app = app(&f);

        for text in ["q\n", ""] {
            let shutdown = std::future::pending::<()>();
            tokio::pin!(shutdown);
            let exit = app.console(input(text), shutdown).await.unwrap();
            assert_eq!(exit, ConsoleExit::Quit);
        }
        assert_eq!(f.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_enter_runs_the_pipeline_then_continues() {
        let f = fixture(json!({"status": "finished", "results": []}));
        let app = app(&f);

        let shutdown = std::future::pending::<()>();
        tokio::pin!(shutdown);
        let exit = app.console(input("\n\nq\n"), shutdown).await.unwrap();

        assert_eq!(exit, ConsoleExit::Quit);
        assert_eq!(f.submits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_interrupt_stops_a_running_pipeline() {
        let f = fixture_with_recorder(json!({"status": "finished", "results": []}), |_| {
            stalled_recorder()
        });
        let app = app(&f);

        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        tokio::pin!(shutdown);
        let exit = tokio::time::timeout(
            Duration::from_secs(5),
            app.console(input("\nq\n"), shutdown),
        )
        .await
        .expect("console returns once interrupted")
        .unwrap();

        assert_eq!(exit, ConsoleExit::Interrupted);
        assert_eq!(f.submits.load(Ordering::SeqCst), 0);
    }
}
