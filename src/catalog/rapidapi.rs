use super::{CatalogSearch, CatalogTrack, ExtractedMedia, Extraction, MediaExtractor};
use crate::error::PipelineError;
use crate::http;
use crate::recognition::track::spotify_track_url;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_TIMEOUT: Duration = Duration::from_secs(60);

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Up to `limit` search hits: top results filtered to tracks, else the plain track list
fn search_hits(body: &Value, limit: usize) -> Vec<CatalogTrack> {
    let items = |pointer: &str| -> Vec<Value> {
        body.pointer(pointer)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let mut tracks: Vec<Value> = items("/data/topResults/items")
        .into_iter()
        .filter(|t| t.get("type").and_then(Value::as_str) == Some("track"))
        .collect();
    if tracks.is_empty() {
        tracks = items("/data/tracks/items");
    }

    tracks
        .iter()
        .filter_map(|track| {
            // Some hosts wrap each item in `data`
            let track = track.get("data").unwrap_or(track);
            let url = str_at(track, "/uri")
                .and_then(spotify_track_url)
                .or_else(|| str_at(track, "/external_urls/spotify").map(String::from))?;
            Some(CatalogTrack {
                url,
                name: str_at(track, "/name").unwrap_or_default().to_string(),
                artist: str_at(track, "/artists/items/0/profile/name")
                    .or_else(|| str_at(track, "/artists/0/name"))
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .take(limit)
        .collect()
}

/// Media from a `downloadSong` reply, looked up in `data` first
fn download_reply(body: &Value) -> Extraction {
    let data = body.get("data").filter(|d| d.is_object()).unwrap_or(body);

    let link = str_at(body, "/data/downloadLink")
        .or_else(|| str_at(body, "/downloadLink"))
        .or_else(|| str_at(body, "/url"));
    let Some(media_url) = link else {
        let message = str_at(body, "/message")
            .map(String::from)
            .unwrap_or_else(|| {
                let raw = body.to_string();
                format!(
                    "No download link in response: {}",
                    raw.chars().take(300).collect::<String>()
                )
            });
        return Extraction::failed(message);
    };

    let artist = str_at(data, "/artist")
        .or_else(|| str_at(data, "/artists/0/name"))
        .map(String::from);

    Extraction::Ready(ExtractedMedia {
        title: str_at(data, "/title")
            .or_else(|| str_at(data, "/name"))
            .unwrap_or("Unknown")
            .to_string(),
        artist,
        thumbnail: str_at(data, "/cover")
            .or_else(|| str_at(data, "/cover_url"))
            .or_else(|| str_at(data, "/image"))
            .map(String::from),
        media_url: media_url.to_string(),
    })
}

/// RapidAPI Spotify downloader host, used for both search and extraction
pub struct RapidApiClient {
    http: reqwest::Client,
    api_key: String,
    host: String,
}

impl RapidApiClient {
    pub fn new(http: reqwest::Client, api_key: &str, host: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            host: host.to_string(),
        }
    }

    async fn get(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, PipelineError> {
        let response = self
            .http
            .get(format!("https://{}/{}", self.host, endpoint))
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::DownloadApi(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl CatalogSearch for RapidApiClient {
    async fn search(
        &self,
        title: &str,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, PipelineError> {
        let query = format!("{} {}", title, artist);
        let max = limit.to_string();
        tracing::info!("Searching {}: {}", self.host, query);

        let body = self
            .get(
                "search",
                &[
                    ("q", query.as_str()),
                    ("type", "multi"),
                    ("limit", max.as_str()),
                    ("offset", "0"),
                    ("noOfTopResults", max.as_str()),
                ],
                SEARCH_TIMEOUT,
            )
            .await?;

        let tracks = search_hits(&body, limit);
        tracing::info!(found = tracks.len(), "Catalog search complete");
        Ok(tracks)
    }
}

#[async_trait]
impl MediaExtractor for RapidApiClient {
    async fn extract(&self, link: &str) -> Result<Extraction, PipelineError> {
        let body = self
            .get("downloadSong", &[("songId", link)], EXTRACT_TIMEOUT)
            .await?;
        Ok(download_reply(&body))
    }

    async fn fetch_media(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        http::stream_to_file(&self.http, url, dest, MEDIA_TIMEOUT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_prefers_top_result_tracks() {
        let body = json!({"data": {
            "topResults": {"items": [
                {"type": "artist", "uri": "spotify:artist:A"},
                {"type": "track", "uri": "spotify:track:T1", "name": "Song",
                 "artists": {"items": [{"profile": {"name": "Band"}}]}}
            ]},
            "tracks": {"items": [{"uri": "spotify:track:OTHER"}]}
        }});

        let hits = search_hits(&body, 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://open.spotify.com/track/T1");
        assert_eq!(hits[0].artist, "Band");
    }

    #[test]
    fn test_search_falls_back_to_tracks() {
        let body = json!({"data": {
            "topResults": {"items": [{"type": "artist", "uri": "spotify:artist:A"}]},
            "tracks": {"items": [
                {"data": {"uri": "spotify:track:T2", "name": "Other"}},
                {"external_urls": {"spotify": "https://open.spotify.com/track/T3"}}
            ]}
        }});

        let urls: Vec<_> = search_hits(&body, 3).into_iter().map(|t| t.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://open.spotify.com/track/T2",
                "https://open.spotify.com/track/T3"
            ]
        );
    }

    #[test]
    fn test_search_hits_are_capped_at_limit() {
        let items: Vec<_> = (1..=5)
            .map(|i| json!({"uri": format!("spotify:track:T{}", i)}))
            .collect();
        let body = json!({"data": {"tracks": {"items": items}}});

        let urls: Vec<_> = search_hits(&body, 3).into_iter().map(|t| t.url).collect();
        assert_eq!(
            urls,
            vec![
                "https://open.spotify.com/track/T1",
                "https://open.spotify.com/track/T2",
                "https://open.spotify.com/track/T3"
            ]
        );
    }

    #[test]
    fn test_download_reply_link_locations() {
        let nested = download_reply(&json!({"data": {
            "downloadLink": "https://cdn/a.mp3", "title": "Song", "artist": "Band",
            "cover": "https://img/c.jpg"
        }}));
        assert_eq!(
            nested,
            Extraction::Ready(ExtractedMedia {
                title: "Song".into(),
                artist: Some("Band".into()),
                thumbnail: Some("https://img/c.jpg".into()),
                media_url: "https://cdn/a.mp3".into(),
            })
        );

        let flat = download_reply(&json!({"url": "https://cdn/b.mp3", "name": "Flat"}));
        assert!(matches!(flat, Extraction::Ready(m) if m.title == "Flat"));
    }

    #[test]
    fn test_download_reply_without_link() {
        let reply = download_reply(&json!({"success": false, "message": "Song not found"}));
        assert_eq!(reply, Extraction::failed("Song not found"));
    }
}
