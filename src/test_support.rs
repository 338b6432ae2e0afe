//! In-process stand-ins for the device and the remote services.

use crate::catalog::{
    CatalogSearch, CatalogTrack, DownloadPolicy, Downloader, ExtractedMedia, Extraction,
    MediaExtractor,
};
use crate::error::PipelineError;
use crate::messages::RecorderCommand;
use crate::models::Recording;
use crate::pipeline::Pipeline;
use crate::recognition::{JobReply, JobStatus, RecognitionApi, RecognitionPolicy, Recognizer};
use crate::services::RecorderHandle;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Answers every submit with the same reply
struct FixedReplyApi {
    reply: serde_json::Value,
    submits: Arc<AtomicUsize>,
}

#[async_trait]
impl RecognitionApi for FixedReplyApi {
    async fn submit(&self, _audio: &Path) -> Result<JobReply, PipelineError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        serde_json::from_value(self.reply.clone())
            .map_err(|e| PipelineError::RecognitionApi(e.to_string()))
    }

    async fn poll(&self, _job_id: &str) -> Result<JobReply, PipelineError> {
        Ok(JobReply {
            status: Some(JobStatus::Processing),
            ..Default::default()
        })
    }
}

struct EmptyCatalog;

#[async_trait]
impl CatalogSearch for EmptyCatalog {
    async fn search(
        &self,
        _title: &str,
        _artist: &str,
        _limit: usize,
    ) -> Result<Vec<CatalogTrack>, PipelineError> {
        Ok(Vec::new())
    }
}

/// Extracts any link it is given
struct AnyLink {
    links: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MediaExtractor for AnyLink {
    async fn extract(&self, link: &str) -> Result<Extraction, PipelineError> {
        self.links.lock().unwrap().push(link.to_string());
        Ok(Extraction::Ready(ExtractedMedia {
            title: "Around the World".into(),
            artist: None,
            thumbnail: None,
            media_url: "https://cdn/track.mp3".into(),
        }))
    }

    async fn fetch_media(&self, _url: &str, dest: &Path) -> Result<u64, PipelineError> {
        tokio::fs::write(dest, b"ID3").await?;
        Ok(3)
    }
}

/// Stands in for the device-backed recorder by writing a silent WAV
pub fn silent_recorder(dir: PathBuf) -> RecorderHandle {
    let (tx, mut rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                RecorderCommand::Record { request, reply } => {
                    let path = dir.join("recording_silent.wav");
                    let spec = hound::WavSpec {
                        channels: 1,
                        sample_rate: 44100,
                        bits_per_sample: 16,
                        sample_format: hound::SampleFormat::Int,
                    };
                    let samples = 44100 * request.duration_secs as usize;
                    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
                    for _ in 0..samples {
                        writer.write_sample(0i16).unwrap();
                    }
                    writer.finalize().unwrap();
                    let recording =
                        Recording::new(path, samples, request.duration_secs as f32, 0.0);
                    let _ = reply.send(Ok(recording));
                }
                RecorderCommand::ListDevices(reply) => {
                    let _ = reply.send(Ok(Vec::new()));
                }
            }
        }
    });
    RecorderHandle::new(tx)
}

/// Accepts commands but never answers, like a device that stopped delivering
pub fn stalled_recorder() -> RecorderHandle {
    let (tx, mut rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut pending = Vec::new();
        while let Some(cmd) = rx.recv().await {
            pending.push(cmd);
        }
    });
    RecorderHandle::new(tx)
}

pub struct Fixture {
    pub pipeline: Arc<Pipeline>,
    /// Recognition submits seen so far
    pub submits: Arc<AtomicUsize>,
    /// Links handed to the extractor, in order
    pub links: Arc<Mutex<Vec<String>>>,
    pub dir: tempfile::TempDir,
}

/// A pipeline over a temp directory whose recognizer always answers `reply`
pub fn fixture(reply: serde_json::Value) -> Fixture {
    fixture_with_recorder(reply, silent_recorder)
}

pub fn fixture_with_recorder(
    reply: serde_json::Value,
    recorder: impl FnOnce(PathBuf) -> RecorderHandle,
) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let recordings = dir.path().join("recordings");
    std::fs::create_dir_all(&recordings).unwrap();

    let submits = Arc::new(AtomicUsize::new(0));
    let links = Arc::new(Mutex::new(Vec::new()));
    let recognizer = Recognizer::new(
        Box::new(FixedReplyApi {
            reply,
            submits: submits.clone(),
        }),
        RecognitionPolicy {
            poll_interval: Duration::ZERO,
            max_polls: 15,
        },
    );
    let downloader = Downloader::new(
        Box::new(EmptyCatalog),
        Box::new(AnyLink {
            links: links.clone(),
        }),
        dir.path().join("downloads"),
        DownloadPolicy {
            retry_delay: Duration::ZERO,
            ..Default::default()
        },
    );

    Fixture {
        pipeline: Arc::new(Pipeline::new(
            recorder(recordings.clone()),
            recognizer,
            downloader,
            recordings,
        )),
        submits,
        links,
        dir,
    }
}

/// A finished recognition job matching one track with a Spotify link
pub fn matched_reply() -> serde_json::Value {
    json!({"status": "finished", "results": [{"track": {
        "title": "Around the World",
        "subtitle": "Daft Punk",
        "images": {"coverarthq": ""},
        "hub": {"providers": [{"type": "SPOTIFY", "actions": [
            {"type": "uri", "uri": "spotify:track:ABC123"}
        ]}]}
    }}]})
}
