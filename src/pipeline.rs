//! Record or load audio, identify it, then download the matching track.
//!
//! The pipeline never retries across stages and never propagates failures:
//! every run ends in a `PipelineReport`.

use crate::audio::normalize_to_wav;
use crate::catalog::Downloader;
use crate::error::PipelineError;
use crate::models::{
    DownloadResult, PipelineReport, Provider, RecognitionResult, RecordRequest, Recording,
};
use crate::recognition::Recognizer;
use crate::services::RecorderHandle;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extensions considered when looking for the latest recording
pub const AUDIO_EXTENSIONS: [&str; 6] = ["wav", "webm", "mp3", "m4a", "ogg", "flac"];

/// Where the audio for a run comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    Record(RecordRequest),
    File(PathBuf),
    Latest,
}

/// Audio ready for recognition
struct Acquired {
    wav: PathBuf,
    recording: Option<Recording>,
}

pub struct Pipeline {
    recorder: RecorderHandle,
    recognizer: Recognizer,
    downloader: Downloader,
    recordings_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        recorder: RecorderHandle,
        recognizer: Recognizer,
        downloader: Downloader,
        recordings_dir: PathBuf,
    ) -> Self {
        Self {
            recorder,
            recognizer,
            downloader,
            recordings_dir,
        }
    }

    pub fn recorder(&self) -> &RecorderHandle {
        &self.recorder
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Identify the track in an audio file of any supported container
    pub async fn recognize_file(&self, path: &Path) -> RecognitionResult {
        match self.prepare_file(path).await {
            Ok(wav) => self.recognizer.recognize(&wav).await.into(),
            Err(e) => RecognitionResult::failure(format!("{:#}", e)),
        }
    }

    pub async fn download(&self, title: &str, artist: &str, link: Option<&str>) -> DownloadResult {
        self.downloader
            .download_track(title, artist, link, None)
            .await
            .into()
    }

    /// Run acquisition, recognition and download once
    pub async fn run(&self, source: AudioSource) -> PipelineReport {
        let acquired = match self.acquire(source).await {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::error!("Could not get audio: {:#}", e);
                return PipelineReport {
                    error: Some(format!("{:#}", e)),
                    ..Default::default()
                };
            }
        };

        let mut report = PipelineReport {
            recording: acquired.recording,
            ..Default::default()
        };

        let track = match self.recognizer.recognize(&acquired.wav).await.into_result() {
            Ok(track) => track,
            Err(e) => {
                report.error = Some(e.to_string());
                report.recognition = Some(RecognitionResult::failure(e));
                return report;
            }
        };
        report.recognition = Some(RecognitionResult::from(&track));

        let download = self
            .downloader
            .download_track(
                &track.title,
                &track.artist,
                track.link(Provider::Spotify),
                track.cover_url.as_deref(),
            )
            .await;
        match &download {
            Ok(track) => report.audio_url = Some(download_url(&track.filename)),
            Err(e) => {
                tracing::error!("Download failed: {}", e);
                report.error = Some(e.to_string());
            }
        }

        report.download = Some(DownloadResult::from(download));
        report.success = report.error.is_none();
        report
    }

    async fn acquire(&self, source: AudioSource) -> Result<Acquired> {
        match source {
            AudioSource::Record(request) => {
                let recording = self.recorder.record(request).await?;
                Ok(Acquired {
                    wav: recording.path.clone(),
                    recording: Some(recording),
                })
            }
            AudioSource::File(path) => Ok(Acquired {
                wav: self.prepare_file(&path).await?,
                recording: None,
            }),
            AudioSource::Latest => {
                let path = latest_audio(&self.recordings_dir, &AUDIO_EXTENSIONS)
                    .ok_or_else(|| PipelineError::AudioFileMissing(self.recordings_dir.clone()))
                    .context("No recordings found")?;
                tracing::info!("Using latest recording: {:?}", path);
                Ok(Acquired {
                    wav: self.prepare_file(&path).await?,
                    recording: None,
                })
            }
        }
    }

    async fn prepare_file(&self, path: &Path) -> Result<PathBuf> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(PipelineError::AudioFileMissing(path.to_path_buf()).into());
        }
        normalize_to_wav(path).await
    }

    /// Store uploaded audio as `recording_<timestamp>.<ext>` in the recordings directory
    pub async fn store_upload(&self, bytes: &[u8], ext: Option<&str>) -> Result<PathBuf> {
        let ext = ext
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("webm");
        tokio::fs::create_dir_all(&self.recordings_dir).await?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .recordings_dir
            .join(format!("recording_{}.{}", timestamp, ext));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to save upload to {:?}", path))?;

        tracing::info!("Saved upload: {:?} ({} bytes)", path, bytes.len());
        Ok(path)
    }
}

/// Path under which the HTTP surface serves a downloaded track
pub fn download_url(filename: &str) -> String {
    format!("/api/downloads/{}", urlencoding::encode(filename))
}

/// Newest file in `dir` with one of `extensions`, by modification time
pub fn latest_audio(dir: &Path, extensions: &[&str]) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        })
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, matched_reply};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_silent_recording_still_attempts_recognition() {
        let f = fixture(json!({"status": "finished", "results": []}));

        let report = f
            .pipeline
            .run(AudioSource::Record(RecordRequest {
                duration_secs: 1,
                device_index: None,
            }))
            .await;

        let recording = report.recording.expect("recording is reported");
        assert!(std::fs::metadata(&recording.path).unwrap().len() > 44);
        assert!(recording.warning.is_some());
        assert_eq!(f.submits.load(Ordering::SeqCst), 1);
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("Track not recognized"));
        assert!(report.audio_url.is_none());
        assert!(report.download.is_none());
    }

    #[tokio::test]
    async fn test_match_downloads_through_spotify_link() {
        let f = fixture(matched_reply());
        let wav = f.pipeline.recordings_dir().join("clip.wav");
        std::fs::write(&wav, b"RIFF").unwrap();

        let report = f.pipeline.run(AudioSource::File(wav)).await;

        assert!(report.success, "{:?}", report.error);
        let recognition = report.recognition.unwrap();
        assert_eq!(recognition.title, "Around the World");
        assert_eq!(recognition.artist, "Daft Punk");
        assert_eq!(
            *f.links.lock().unwrap(),
            vec!["https://open.spotify.com/track/ABC123"]
        );
        let download = report.download.unwrap();
        assert!(download.success);
        let filename = download.filename.unwrap();
        assert!(filename.starts_with("Around the World_"));
        assert!(f.dir.path().join("downloads").join(&filename).exists());
        assert_eq!(report.audio_url, Some(download_url(&filename)));
        assert!(
            report
                .audio_url
                .unwrap()
                .starts_with("/api/downloads/Around%20the%20World_")
        );
    }

    #[test]
    fn test_download_url_is_encoded() {
        assert_eq!(
            download_url("AC/DC - T.N.T._20260101_000000.mp3"),
            "/api/downloads/AC%2FDC%20-%20T.N.T._20260101_000000.mp3"
        );
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_recognition() {
        let f = fixture(matched_reply());

        let report = f
            .pipeline
            .run(AudioSource::File(PathBuf::from("/nonexistent/clip.wav")))
            .await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("Audio file not found"));
        assert!(report.recognition.is_none());
        assert_eq!(f.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_latest_without_recordings_fails() {
        let f = fixture(matched_reply());

        let report = f.pipeline.run(AudioSource::Latest).await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("No recordings found"));
    }

    #[test]
    fn test_latest_audio_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let touch = |name: &str, age_secs: u64| {
            let path = dir.path().join(name);
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
                .unwrap();
            path
        };
        touch("recording_old.wav", 300);
        let newest = touch("recording_new.webm", 10);
        touch("notes.txt", 0);

        assert_eq!(latest_audio(dir.path(), &AUDIO_EXTENSIONS), Some(newest));
        assert_eq!(
            latest_audio(dir.path(), &["wav"]),
            Some(dir.path().join("recording_old.wav"))
        );
        assert_eq!(latest_audio(&dir.path().join("missing"), &["wav"]), None);
    }

    #[tokio::test]
    async fn test_store_upload_defaults_to_webm() {
        let f = fixture(matched_reply());

        let path = f.pipeline.store_upload(b"webm-bytes", None).await.unwrap();
        assert_eq!(path.extension().unwrap(), "webm");
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("recording_"));

        let odd = f.pipeline.store_upload(b"x", Some("../sh")).await.unwrap();
        assert_eq!(odd.extension().unwrap(), "webm");
    }
}
