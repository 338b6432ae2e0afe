//! Recognition job protocol.
//!
//! A recognition attempt submits the audio, receives a job handle and polls
//! the service at a fixed interval until it reports a terminal state or the
//! attempt budget runs out:
//!
//! `SUBMITTING → (immediate match | PENDING) → POLLING → {MATCHED, NOT_FOUND, API_ERROR, TIMEOUT}`

pub mod shazam;
pub mod track;

use crate::error::PipelineError;
use crate::models::{RecognitionOutcome, RecognizedTrack};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use shazam::ShazamApi;
pub use track::ShazamTrack;

/// Job status reported by the recognition service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Finished,
    Error,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchEntry {
    #[serde(default)]
    pub track: Option<ShazamTrack>,
}

/// Body of both the submit and the results endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobReply {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub results: Option<Vec<MatchEntry>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobReply {
    fn error_message(&self, fallback: &str) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Transport to a recognition service
#[async_trait]
pub trait RecognitionApi: Send + Sync {
    /// Upload the audio file and return the initial job reply
    async fn submit(&self, audio: &Path) -> Result<JobReply, PipelineError>;

    /// Fetch the current state of a submitted job
    async fn poll(&self, job_id: &str) -> Result<JobReply, PipelineError>;
}

/// Polling budget for one recognition attempt
#[derive(Debug, Clone, Copy)]
pub struct RecognitionPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for RecognitionPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_polls: 15,
        }
    }
}

enum Step {
    Done(RecognitionOutcome),
    Pending,
}

fn finished_outcome(results: Option<Vec<MatchEntry>>) -> RecognitionOutcome {
    let track = results
        .and_then(|results| results.into_iter().next())
        .and_then(|entry| entry.track);
    match track {
        Some(track) => RecognitionOutcome::Matched(RecognizedTrack::from(track)),
        None => RecognitionOutcome::NotFound,
    }
}

/// Classify a poll reply as terminal or still pending
fn classify(reply: JobReply) -> Step {
    match reply.status {
        Some(JobStatus::Finished) => Step::Done(finished_outcome(reply.results)),
        Some(JobStatus::Error) => Step::Done(RecognitionOutcome::ApiError(
            reply.error_message("recognition service reported an error"),
        )),
        Some(JobStatus::Processing) | Some(JobStatus::Unknown) | None => Step::Pending,
    }
}

pub struct Recognizer {
    api: Box<dyn RecognitionApi>,
    policy: RecognitionPolicy,
}

impl Recognizer {
    pub fn new(api: Box<dyn RecognitionApi>, policy: RecognitionPolicy) -> Self {
        Self { api, policy }
    }

    /// Identify the track in `audio`. Never fails: every failure is an outcome.
    pub async fn recognize(&self, audio: &Path) -> RecognitionOutcome {
        tracing::info!("Submitting {:?} for recognition", audio);

        let reply = match self.api.submit(audio).await {
            Ok(reply) => reply,
            Err(e) => return RecognitionOutcome::ApiError(error_text(e)),
        };

        let job_id = match reply.status {
            Some(JobStatus::Processing) if reply.uuid.as_deref().is_some_and(|u| !u.is_empty()) => {
                reply.uuid.unwrap_or_default()
            }
            Some(JobStatus::Finished) => return log_outcome(finished_outcome(reply.results)),
            _ => return RecognitionOutcome::ApiError(reply.error_message("unknown error")),
        };

        tracing::info!(job = %job_id, "Recognition job accepted, waiting for results");
        log_outcome(self.poll_until_done(&job_id).await)
    }

    async fn poll_until_done(&self, job_id: &str) -> RecognitionOutcome {
        for attempt in 1..=self.policy.max_polls {
            tokio::time::sleep(self.policy.poll_interval).await;

            let reply = match self.api.poll(job_id).await {
                Ok(reply) => reply,
                Err(e) => return RecognitionOutcome::ApiError(error_text(e)),
            };

            match classify(reply) {
                Step::Done(outcome) => return outcome,
                Step::Pending => {
                    tracing::debug!(job = %job_id, attempt, "Recognition still processing");
                }
            }
        }

        tracing::warn!(
            job = %job_id,
            polls = self.policy.max_polls,
            "Gave up waiting for recognition results"
        );
        RecognitionOutcome::Timeout
    }
}

fn log_outcome(outcome: RecognitionOutcome) -> RecognitionOutcome {
    match &outcome {
        RecognitionOutcome::Matched(track) => {
            tracing::info!("Recognized: {} - {}", track.title, track.artist);
        }
        RecognitionOutcome::NotFound => tracing::info!("Track not recognized"),
        RecognitionOutcome::ApiError(message) => tracing::error!("Recognition failed: {}", message),
        RecognitionOutcome::Timeout => {}
    }
    outcome
}

/// Unwrap the service message from an API error instead of nesting prefixes
fn error_text(e: PipelineError) -> String {
    match e {
        PipelineError::RecognitionApi(message) => message,
        other => other.to_string(),
    }
}
