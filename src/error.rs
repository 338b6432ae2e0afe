use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the recording, recognition and download stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No input audio device available")]
    NoInputDevice,

    #[error("Input device {0} not found")]
    DeviceNotFound(usize),

    #[error("Recording is empty - check the microphone and input level")]
    EmptyRecording,

    #[error("Audio file not found: {}", .0.display())]
    AudioFileMissing(PathBuf),

    #[error("Recognition API error: {0}")]
    RecognitionApi(String),

    #[error("Timed out waiting for recognition results")]
    RecognitionTimeout,

    #[error("Track not recognized")]
    NotRecognized,

    #[error("Track not found in catalog")]
    TrackNotFound,

    #[error("Download API error: {0}")]
    DownloadApi(String),

    #[error("Failed to write track metadata: {0}")]
    MetadataTag(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// True for the extraction failure that earns a single retry.
    pub fn is_not_found(message: &str) -> bool {
        message.to_lowercase().contains("not found")
    }
}
