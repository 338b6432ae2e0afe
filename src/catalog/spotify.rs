use super::{CatalogSearch, CatalogTrack, TokenCache};
use crate::error::PipelineError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const MARKET: &str = "US";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TOKEN_LIFETIME: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackItem {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistItem {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    #[serde(default)]
    spotify: Option<String>,
}

impl SearchResponse {
    fn into_tracks(self) -> Vec<CatalogTrack> {
        self.tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let url = item.external_urls.spotify.filter(|u| !u.is_empty())?;
                Some(CatalogTrack {
                    url,
                    name: item.name,
                    artist: item
                        .artists
                        .into_iter()
                        .next()
                        .map(|a| a.name)
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Spotify Web API search with client-credentials authentication
pub struct SpotifyCatalog {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: TokenCache,
}

impl SpotifyCatalog {
    pub fn new(http: reqwest::Client, client_id: &str, client_secret: &str) -> Self {
        Self {
            http,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: TokenCache::new(),
        }
    }

    async fn access_token(&self) -> Result<String, PipelineError> {
        self.token
            .get_or_refresh(move || async move {
                tracing::info!("Requesting Spotify access token");

                let response = self
                    .http
                    .post(TOKEN_URL)
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(&[("grant_type", "client_credentials")])
                    .timeout(REQUEST_TIMEOUT)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PipelineError::DownloadApi(format!(
                        "Spotify token request failed: HTTP {}",
                        status
                    )));
                }

                let token: TokenResponse = response.json().await?;
                let lifetime = token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME);
                Ok((token.access_token, Duration::from_secs(lifetime)))
            })
            .await
    }
}

#[async_trait]
impl CatalogSearch for SpotifyCatalog {
    async fn search(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, PipelineError> {
        let token = self.access_token().await?;
        let query = format!("track:{} artist:{}", title, artist);
        tracing::info!("Searching Spotify: {}", query);

        let max = limit.to_string();
        let response = self
            .http
            .get(SEARCH_URL)
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", max.as_str()),
                ("market", MARKET),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.token.clear().await;
        }
        if !status.is_success() {
            return Err(PipelineError::DownloadApi(format!(
                "Spotify search failed: HTTP {}",
                status
            )));
        }

        let mut tracks = response.json::<SearchResponse>().await?.into_tracks();
        tracks.truncate(limit);
        tracing::info!(found = tracks.len(), "Spotify search complete");
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_response_keeps_rank_order() {
        let response: SearchResponse = serde_json::from_value(json!({
            "tracks": {"items": [
                {"name": "Song", "artists": [{"name": "Band"}, {"name": "Guest"}],
                 "external_urls": {"spotify": "https://open.spotify.com/track/1"}},
                {"name": "No link", "artists": [], "external_urls": {}},
                {"name": "Song (Live)", "artists": [],
                 "external_urls": {"spotify": "https://open.spotify.com/track/2"}}
            ]}
        }))
        .unwrap();

        let tracks = response.into_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].url, "https://open.spotify.com/track/1");
        assert_eq!(tracks[0].artist, "Band");
        assert_eq!(tracks[1].name, "Song (Live)");
        assert_eq!(tracks[1].artist, "");
    }

    #[test]
    fn test_empty_search_response() {
        let response: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.into_tracks().is_empty());
    }
}
