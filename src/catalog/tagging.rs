use crate::error::PipelineError;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use std::path::Path;
use std::time::Duration;

const COVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Metadata embedded into a downloaded track
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
}

/// Writes ID3v2.4 title, artist and front cover frames
pub struct TrackTagger {
    http: reqwest::Client,
}

impl TrackTagger {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Tag `path`. A cover that cannot be fetched is skipped.
    pub async fn tag(&self, path: &Path, tags: &TrackTags) -> Result<(), PipelineError> {
        let cover = match tags.cover_url.as_deref() {
            Some(url) => self.fetch_cover(url).await,
            None => None,
        };

        let path = path.to_path_buf();
        let tags = tags.clone();
        tokio::task::spawn_blocking(move || write_tags(&path, &tags, cover))
            .await
            .map_err(|e| PipelineError::MetadataTag(e.to_string()))?
    }

    async fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
        let result = async {
            let response = self
                .http
                .get(url)
                .timeout(COVER_TIMEOUT)
                .send()
                .await?
                .error_for_status()?;
            response.bytes().await
        }
        .await;

        match result {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::debug!("Skipping cover art {}: {}", url, e);
                None
            }
        }
    }
}

fn write_tags(path: &Path, tags: &TrackTags, cover: Option<Vec<u8>>) -> Result<(), PipelineError> {
    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());
    tag.set_title(tags.title.as_str());
    tag.set_artist(tags.artist.as_str());

    if let Some(data) = cover {
        tag.add_frame(Picture {
            mime_type: "image/jpeg".to_string(),
            picture_type: PictureType::CoverFront,
            description: "Cover".to_string(),
            data,
        });
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| PipelineError::MetadataTag(e.to_string()))
}
