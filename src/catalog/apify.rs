use super::{ExtractedMedia, Extraction, MediaExtractor};
use crate::error::PipelineError;
use crate::http;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

const BASE_URL: &str = "https://api.apify.com/v2";
pub const DEFAULT_ACTOR_ID: &str = "D50jl7rp34h8YHRWg";

/// Seconds the API may hold a run request open waiting for completion
const WAIT_FOR_FINISH: &str = "60";
/// Run status checks after the initial request before giving up
const MAX_RUN_CHECKS: u32 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    data: ActorRun,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActorRun {
    id: String,
    status: String,
    #[serde(default)]
    default_dataset_id: Option<String>,
}

impl ActorRun {
    fn is_running(&self) -> bool {
        matches!(self.status.as_str(), "READY" | "RUNNING")
    }
}

/// Dataset item produced by the downloader actor
#[derive(Debug, Default, Deserialize)]
pub struct ExtractionItem {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub medias: Vec<MediaEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaEntry {
    #[serde(default)]
    pub url: Option<String>,
}

impl ExtractionItem {
    /// Items either carry the payload directly or wrap it in `result`
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(mut map) if map.get("result").is_some_and(Value::is_object) => {
                serde_json::from_value(map.remove("result").unwrap_or_default())
            }
            other => serde_json::from_value(other),
        }
    }

    fn has_error(&self) -> bool {
        match &self.error {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    pub fn into_extraction(self) -> Extraction {
        if self.has_error() {
            let message = self
                .message
                .clone()
                .or_else(|| self.error.as_ref().and_then(|e| e.as_str().map(String::from)))
                .unwrap_or_else(|| "Not found".to_string());
            return Extraction::failed(message);
        }

        let Some(media) = self.medias.into_iter().next() else {
            return Extraction::failed("No media in extraction result");
        };
        let Some(media_url) = media.url.filter(|u| !u.is_empty()) else {
            return Extraction::failed("Empty media link");
        };

        Extraction::Ready(ExtractedMedia {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            artist: self.artist,
            thumbnail: self.thumbnail.filter(|t| !t.is_empty()),
            media_url,
        })
    }
}

/// Runs the Spotify downloader actor on Apify
pub struct ApifyExtractor {
    http: reqwest::Client,
    token: String,
    actor_id: String,
}

impl ApifyExtractor {
    pub fn new(http: reqwest::Client, token: &str, actor_id: &str) -> Self {
        Self {
            http,
            token: token.to_string(),
            actor_id: actor_id.to_string(),
        }
    }

    async fn start_run(&self, link: &str) -> Result<ActorRun, PipelineError> {
        let input = json!({
            "links": [link],
            "proxyConfiguration": {
                "useApifyProxy": true,
                "apifyProxyGroups": ["RESIDENTIAL"],
            },
        });

        let response = self
            .http
            .post(format!("{}/acts/{}/runs", BASE_URL, self.actor_id))
            .query(&[
                ("token", self.token.as_str()),
                ("waitForFinish", WAIT_FOR_FINISH),
            ])
            .json(&input)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::read_run(response).await
    }

    async fn check_run(&self, run_id: &str) -> Result<ActorRun, PipelineError> {
        let response = self
            .http
            .get(format!("{}/actor-runs/{}", BASE_URL, run_id))
            .query(&[
                ("token", self.token.as_str()),
                ("waitForFinish", WAIT_FOR_FINISH),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::read_run(response).await
    }

    async fn read_run(response: reqwest::Response) -> Result<ActorRun, PipelineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::DownloadApi(format!(
                "Apify run request failed: HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response.json::<RunEnvelope>().await?.data)
    }

    async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, PipelineError> {
        let items = self
            .http
            .get(format!("{}/datasets/{}/items", BASE_URL, dataset_id))
            .query(&[("token", self.token.as_str()), ("clean", "true")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        Ok(items)
    }
}

#[async_trait]
impl MediaExtractor for ApifyExtractor {
    async fn extract(&self, link: &str) -> Result<Extraction, PipelineError> {
        let mut run = self.start_run(link).await?;
        tracing::debug!(run = %run.id, status = %run.status, "Apify run started");

        let mut checks = 0;
        while run.is_running() {
            if checks == MAX_RUN_CHECKS {
                return Err(PipelineError::DownloadApi(format!(
                    "Apify run {} did not finish",
                    run.id
                )));
            }
            checks += 1;
            run = self.check_run(&run.id).await?;
        }

        if run.status != "SUCCEEDED" {
            return Err(PipelineError::DownloadApi(format!(
                "Apify run {} ended with status {}",
                run.id, run.status
            )));
        }

        let Some(dataset_id) = run.default_dataset_id else {
            return Ok(Extraction::failed("Apify run has no default dataset"));
        };

        let Some(first) = self.dataset_items(&dataset_id).await?.into_iter().next() else {
            return Ok(Extraction::failed("No results from extraction job"));
        };

        let item = ExtractionItem::from_value(first)
            .map_err(|e| PipelineError::DownloadApi(format!("invalid dataset item: {}", e)))?;
        Ok(item.into_extraction())
    }

    async fn fetch_media(&self, url: &str, dest: &Path) -> Result<u64, PipelineError> {
        http::stream_to_file(&self.http, url, dest, MEDIA_TIMEOUT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction(value: Value) -> Extraction {
        ExtractionItem::from_value(value).unwrap().into_extraction()
    }

    #[test]
    fn test_wrapped_success_item() {
        let result = extraction(json!({
            "result": {
                "title": "Around the World",
                "thumbnail": "https://img/t.jpg",
                "medias": [{"url": "https://cdn/track.mp3"}, {"url": "https://cdn/alt.mp3"}]
            }
        }));

        assert_eq!(
            result,
            Extraction::Ready(ExtractedMedia {
                title: "Around the World".into(),
                artist: None,
                thumbnail: Some("https://img/t.jpg".into()),
                media_url: "https://cdn/track.mp3".into(),
            })
        );
    }

    #[test]
    fn test_error_item_uses_message() {
        assert_eq!(
            extraction(json!({"error": true, "message": "Track not found"})),
            Extraction::failed("Track not found")
        );
        assert_eq!(extraction(json!({"error": true})), Extraction::failed("Not found"));
        assert_eq!(
            extraction(json!({"result": {"error": "Rate limited"}})),
            Extraction::failed("Rate limited")
        );
    }

    #[test]
    fn test_missing_media() {
        assert_eq!(
            extraction(json!({"title": "x", "medias": []})),
            Extraction::failed("No media in extraction result")
        );
        assert_eq!(
            extraction(json!({"title": "x", "medias": [{"url": ""}]})),
            Extraction::failed("Empty media link")
        );
    }

    #[test]
    fn test_false_error_flag_is_not_an_error() {
        let result = extraction(json!({"error": false, "medias": [{"url": "https://cdn/a.mp3"}]}));
        assert!(matches!(result, Extraction::Ready(media) if media.title == "Unknown"));
    }
}
