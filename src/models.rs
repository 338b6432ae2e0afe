//! Result records shared by the CLI, the HTTP surface and the pipeline.
//!
//! Every externally visible operation reports `{success, ...}` with an
//! `error` message instead of propagating failures to the caller.

use crate::audio::SignalLevel;
use crate::error::PipelineError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Input device as reported by the audio host
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub is_default: bool,
}

/// Parameters of a single capture
#[derive(Debug, Clone, Copy)]
pub struct RecordRequest {
    pub duration_secs: u32,
    pub device_index: Option<usize>,
}

/// A finished recording on disk
#[derive(Debug, Clone, Serialize)]
pub struct Recording {
    pub path: PathBuf,
    pub samples: usize,
    pub duration_secs: f32,
    /// Peak level over the whole capture, percent of full scale
    pub max_level: f32,
    pub signal: SignalLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Recording {
    pub fn new(path: PathBuf, samples: usize, duration_secs: f32, max_level: f32) -> Self {
        let signal = SignalLevel::classify(max_level);
        Self {
            path,
            samples,
            duration_secs,
            max_level,
            signal,
            warning: signal.warning().map(String::from),
        }
    }
}

/// Streaming services a recognized track can link to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Spotify,
    AppleMusic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Spotify, Provider::AppleMusic];

    pub fn key(self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
            Provider::AppleMusic => "apple_music",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamingLink {
    pub provider: Provider,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedTrack {
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    pub key: Option<String>,
    pub links: Vec<StreamingLink>,
}

impl RecognizedTrack {
    pub fn link(&self, provider: Provider) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.provider == provider)
            .map(|l| l.url.as_str())
    }
}

/// Terminal state of one recognition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    Matched(RecognizedTrack),
    NotFound,
    ApiError(String),
    Timeout,
}

impl RecognitionOutcome {
    pub fn into_result(self) -> Result<RecognizedTrack, PipelineError> {
        match self {
            RecognitionOutcome::Matched(track) => Ok(track),
            RecognitionOutcome::NotFound => Err(PipelineError::NotRecognized),
            RecognitionOutcome::ApiError(message) => Err(PipelineError::RecognitionApi(message)),
            RecognitionOutcome::Timeout => Err(PipelineError::RecognitionTimeout),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecognitionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cover_url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub external_track_links: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecognitionResult {
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

impl From<&RecognizedTrack> for RecognitionResult {
    fn from(track: &RecognizedTrack) -> Self {
        Self {
            success: true,
            title: track.title.clone(),
            artist: track.artist.clone(),
            cover_url: track.cover_url.clone().unwrap_or_default(),
            external_track_links: track
                .links
                .iter()
                .map(|l| (l.provider.key().to_string(), l.url.clone()))
                .collect(),
            key: track.key.clone(),
            error: None,
        }
    }
}

impl From<RecognitionOutcome> for RecognitionResult {
    fn from(outcome: RecognitionOutcome) -> Self {
        match outcome.into_result() {
            Ok(track) => RecognitionResult::from(&track),
            Err(e) => RecognitionResult::failure(e),
        }
    }
}

/// A track saved under the downloads directory
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedTrack {
    pub file_path: PathBuf,
    pub filename: String,
    pub file_size: u64,
    pub title: String,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

impl From<Result<DownloadedTrack, PipelineError>> for DownloadResult {
    fn from(result: Result<DownloadedTrack, PipelineError>) -> Self {
        match result {
            Ok(track) => Self {
                success: true,
                file_path: Some(track.file_path),
                filename: Some(track.filename),
                file_size: Some(track.file_size),
                title: Some(track.title),
                thumbnail: track.thumbnail,
                error: None,
            },
            Err(e) => Self::failure(e),
        }
    }
}

/// Combined outcome of record/convert → recognize → download
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<Recording>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition: Option<RecognitionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadResult>,
    #[serde(rename = "audioUrl", skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
