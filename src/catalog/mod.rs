//! Catalog search, media extraction and track download.
//!
//! A download resolves a catalog link (given directly or found by search),
//! runs an extraction job against it and saves the media it yields.

pub mod apify;
pub mod downloader;
pub mod rapidapi;
pub mod spotify;
pub mod tagging;
pub mod token;

use crate::error::PipelineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use apify::ApifyExtractor;
pub use downloader::{DownloadPolicy, Downloader};
pub use rapidapi::RapidApiClient;
pub use spotify::SpotifyCatalog;
pub use tagging::{TrackTagger, TrackTags};
pub use token::TokenCache;

/// Download backends the original deployments used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadBackend {
    /// Spotify Web API search plus an Apify extraction actor
    #[default]
    Apify,
    /// A RapidAPI Spotify downloader host for both search and extraction
    RapidApi,
}

impl std::str::FromStr for DownloadBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "apify" => Ok(DownloadBackend::Apify),
            "rapidapi" => Ok(DownloadBackend::RapidApi),
            other => Err(anyhow::anyhow!(
                "unknown download backend '{}', expected apify or rapidapi",
                other
            )),
        }
    }
}

/// One search hit, in the catalog's relevance order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogTrack {
    pub url: String,
    pub name: String,
    pub artist: String,
}

/// Media located by an extraction job
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMedia {
    pub title: String,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
    pub media_url: String,
}

/// Result of one extraction job against a catalog link
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Ready(ExtractedMedia),
    Failed { message: String },
}

impl Extraction {
    pub fn failed(message: impl Into<String>) -> Self {
        Extraction::Failed {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Search for a track, best match first
    async fn search(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, PipelineError>;
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Run an extraction job for a catalog link
    async fn extract(&self, link: &str) -> Result<Extraction, PipelineError>;

    /// Save the media payload at `url` to `dest`, returning its size in bytes
    async fn fetch_media(&self, url: &str, dest: &Path) -> Result<u64, PipelineError>;
}

/// Keep alphanumerics, space, hyphen and underscore
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    match kept.trim() {
        "" => "track".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Around the World"), "Around the World");
        assert_eq!(sanitize_title("AC/DC: T.N.T. (Live)"), "ACDC TNT Live");
        assert_eq!(sanitize_title("  _under-score_  "), "_under-score_");
        assert_eq!(sanitize_title("Café Müller"), "Café Müller");
        assert_eq!(sanitize_title("?!/"), "track");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Apify".parse::<DownloadBackend>().unwrap(), DownloadBackend::Apify);
        assert_eq!(
            "rapidapi".parse::<DownloadBackend>().unwrap(),
            DownloadBackend::RapidApi
        );
        assert!("youtube".parse::<DownloadBackend>().is_err());
    }
}
