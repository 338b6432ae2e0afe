use super::{
    CatalogSearch, ExtractedMedia, Extraction, MediaExtractor, TrackTagger, TrackTags,
    sanitize_title,
};
use crate::error::PipelineError;
use crate::models::DownloadedTrack;
use std::path::PathBuf;
use std::time::Duration;

/// Retry and fan-out limits for one download
#[derive(Debug, Clone, Copy)]
pub struct DownloadPolicy {
    /// Pause before retrying an extraction that reported "not found"
    pub retry_delay: Duration,
    /// Extra extraction attempts allowed after a "not found"
    pub not_found_retries: u32,
    /// Search candidates tried when the direct link fails
    pub search_limit: usize,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
            not_found_retries: 1,
            search_limit: 3,
        }
    }
}

pub struct Downloader {
    search: Box<dyn CatalogSearch>,
    extractor: Box<dyn MediaExtractor>,
    tagger: Option<TrackTagger>,
    downloads_dir: PathBuf,
    policy: DownloadPolicy,
}

impl Downloader {
    pub fn new(
        search: Box<dyn CatalogSearch>,
        extractor: Box<dyn MediaExtractor>,
        downloads_dir: PathBuf,
        policy: DownloadPolicy,
    ) -> Self {
        Self {
            search,
            extractor,
            tagger: None,
            downloads_dir,
            policy,
        }
    }

    pub fn with_tagger(mut self, tagger: TrackTagger) -> Self {
        self.tagger = Some(tagger);
        self
    }

    /// Download a recognized track, trying `direct_link` before searching the catalog
    pub async fn download_track(
        &self,
        title: &str,
        artist: &str,
        direct_link: Option<&str>,
        cover_url: Option<&str>,
    ) -> Result<DownloadedTrack, PipelineError> {
        let tags = TrackTags {
            title: title.to_string(),
            artist: artist.to_string(),
            cover_url: cover_url.map(String::from),
        };

        if let Some(link) = direct_link.filter(|l| !l.is_empty()) {
            match self.download_by_link(link, &tags).await {
                Ok(track) => return Ok(track),
                Err(e) => tracing::warn!("Direct link failed ({}), searching the catalog", e),
            }
        }

        let mut candidates = self
            .search
            .search(title, artist, self.policy.search_limit)
            .await?;
        candidates.truncate(self.policy.search_limit);
        if candidates.is_empty() {
            return Err(PipelineError::TrackNotFound);
        }

        let mut last_error = None;
        for (i, candidate) in candidates.iter().enumerate() {
            tracing::info!(
                "Trying candidate [{}]: {} - {}",
                i + 1,
                candidate.name,
                candidate.artist
            );
            match self.download_by_link(&candidate.url, &tags).await {
                Ok(track) => return Ok(track),
                Err(e) => {
                    tracing::warn!("Candidate {} failed: {}", candidate.url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(PipelineError::DownloadApi(format!(
            "all {} candidates failed, last error: {}",
            candidates.len(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Extract and save the media behind one catalog link.
    ///
    /// A "not found" extraction is retried `not_found_retries` times.
    pub async fn download_by_link(
        &self,
        link: &str,
        tags: &TrackTags,
    ) -> Result<DownloadedTrack, PipelineError> {
        let mut retries = 0;
        loop {
            if retries == 0 {
                tracing::info!("Extracting {}", link);
            } else {
                tracing::info!("Extracting {} (attempt {})", link, retries + 1);
            }

            match self.extractor.extract(link).await? {
                Extraction::Ready(media) => return self.save(media, tags).await,
                Extraction::Failed { message }
                    if retries < self.policy.not_found_retries
                        && PipelineError::is_not_found(&message) =>
                {
                    tracing::warn!("Extraction reported '{}', retrying", message);
                    retries += 1;
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                Extraction::Failed { message } => return Err(PipelineError::DownloadApi(message)),
            }
        }
    }

    async fn save(
        &self,
        media: ExtractedMedia,
        tags: &TrackTags,
    ) -> Result<DownloadedTrack, PipelineError> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("{}_{}.mp3", sanitize_title(&media.title), timestamp);
        let file_path = self.downloads_dir.join(&filename);

        tracing::info!("Downloading: {}", media.title);

        // Stream into a temp file so a failed transfer never leaves a partial track
        let partial = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(".mp3")
            .tempfile_in(&self.downloads_dir)?;
        let file_size = self
            .extractor
            .fetch_media(&media.media_url, partial.path())
            .await?;
        partial
            .persist(&file_path)
            .map_err(|e| PipelineError::Io(e.error))?;

        tracing::info!(
            "Downloaded: {} ({:.2} MB)",
            filename,
            file_size as f64 / 1024.0 / 1024.0
        );

        if let Some(tagger) = &self.tagger {
            let tags = TrackTags {
                cover_url: tags.cover_url.clone().or_else(|| media.thumbnail.clone()),
                ..tags.clone()
            };
            if let Err(e) = tagger.tag(&file_path, &tags).await {
                tracing::warn!("{}", e);
            }
        }

        Ok(DownloadedTrack {
            file_path,
            filename,
            file_size,
            title: media.title,
            thumbnail: media.thumbnail,
        })
    }
}
