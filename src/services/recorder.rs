use crate::audio::format::to_pcm16;
use crate::audio::level::signal_level;
use crate::audio::{AudioCapture, AudioFormat, AudioSink, WavSink};
use crate::error::PipelineError;
use crate::messages::RecorderCommand;
use crate::models::{DeviceInfo, RecordRequest, Recording};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Grace period past the requested duration before a stalled device is given up on
const STALL_GRACE: Duration = Duration::from_secs(5);

/// Seconds of captured audio between progress log lines
const PROGRESS_EVERY_SECS: usize = 3;

/// Coordinates audio capture and encoding
///
/// This service:
/// - Resolves the capture device for each request
/// - Receives audio blocks via channel and measures their level
/// - Streams blocks to a WavSink until the requested duration is reached
///
/// Note: This service holds cpal::Stream which is !Send, so it must be spawned
/// on a LocalSet using tokio::task::spawn_local.
pub struct Recorder {
    format: AudioFormat,
    recordings_dir: PathBuf,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
}

impl Recorder {
    pub fn new(
        format: AudioFormat,
        recordings_dir: PathBuf,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
    ) -> Self {
        Self {
            format,
            recordings_dir,
            cmd_rx,
        }
    }

    pub async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                RecorderCommand::Record { request, reply } => {
                    let result = self.record(request).await;
                    if let Err(e) = &result {
                        tracing::error!("Recording failed: {:#}", e);
                    }
                    let _ = reply.send(result);
                }
                RecorderCommand::ListDevices(reply) => {
                    let _ = reply.send(AudioCapture::list_devices());
                }
            }
        }
        tracing::debug!("Recorder command channel closed");
    }

    async fn record(&self, request: RecordRequest) -> Result<Recording> {
        let device = AudioCapture::resolve_device(request.device_index)?;

        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .recordings_dir
            .join(format!("recording_{}.wav", timestamp));

        let target = self
            .format
            .samples_for_duration(request.duration_secs as f32);
        let mut sink = WavSink::new(path.clone(), self.format)?;

        // Fresh channel per recording; dropping the receiver stops the bridge task
        let (audio_tx, mut audio_rx) = mpsc::channel(100);
        let stream = AudioCapture::start(&device, self.format, audio_tx)?;

        tracing::info!(
            "Recording {} seconds at {} Hz...",
            request.duration_secs,
            self.format.sample_rate
        );

        let deadline = Instant::now()
            + Duration::from_secs(request.duration_secs as u64)
            + STALL_GRACE;
        let progress_step = self
            .format
            .samples_for_duration(PROGRESS_EVERY_SECS as f32)
            .max(1);

        let mut captured = 0usize;
        let mut max_level = 0.0f32;
        let mut next_progress = progress_step;

        while captured < target {
            let chunk = tokio::select! {
                chunk = audio_rx.recv() => chunk,
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        captured,
                        target,
                        "Input device stopped delivering audio, keeping what was captured"
                    );
                    break;
                }
            };
            let Some(chunk) = chunk else { break };

            let mut block = to_pcm16(&chunk);
            block.truncate(target - captured);

            max_level = max_level.max(signal_level(&block));
            captured += block.len();
            sink.write_chunk(block)?;

            if captured >= next_progress {
                tracing::info!(
                    "  {:.0}s recorded, peak level {:.2}%",
                    self.format.duration_of(captured),
                    max_level
                );
                next_progress += progress_step;
            }
        }

        drop(stream);
        drop(audio_rx);
        sink.finalize().await?;

        finish_recording(path, captured, self.format, max_level).await
    }
}

/// Turn a finalized capture into a `Recording`, discarding an empty file
async fn finish_recording(
    path: PathBuf,
    samples: usize,
    format: AudioFormat,
    max_level: f32,
) -> Result<Recording> {
    if samples == 0 {
        remove_quietly(&path).await;
        return Err(PipelineError::EmptyRecording.into());
    }

    let recording = Recording::new(path, samples, format.duration_of(samples), max_level);
    tracing::info!(
        "Recording saved: {:?} ({:.1}s, peak {:.2}%)",
        recording.path,
        recording.duration_secs,
        recording.max_level
    );
    recording.signal.log_warning(max_level);
    Ok(recording)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("Could not remove {:?}: {}", path, e);
    }
}

/// Handle for communicating with the Recorder
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    pub async fn record(&self, request: RecordRequest) -> Result<Recording> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(RecorderCommand::Record { request, reply })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send record command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive recording: {}", e))?
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(RecorderCommand::ListDevices(reply))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send list command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive device list: {}", e))?
    }
}
