use super::{JobReply, RecognitionApi};
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://shazam-api.com/api";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the shazam-api.com job API
pub struct ShazamApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ShazamApi {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Turn a non-success response into an error carrying the server's message
    async fn check(response: reqwest::Response) -> Result<JobReply, PipelineError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<JobReply>()
                .await
                .map_err(|e| PipelineError::RecognitionApi(format!("invalid response: {}", e)));
        }

        let body = response.json::<JobReply>().await.unwrap_or_default();
        Err(PipelineError::RecognitionApi(failure_message(status, body)))
    }
}

/// Message for a rejected request: the body's `message`, then its `error`, then the status
fn failure_message(status: StatusCode, body: JobReply) -> String {
    body.message.or(body.error).unwrap_or_else(|| match status {
        StatusCode::FORBIDDEN => "Access denied (403)".to_string(),
        other => format!("HTTP {}", other),
    })
}

#[async_trait]
impl RecognitionApi for ShazamApi {
    async fn submit(&self, audio: &Path) -> Result<JobReply, PipelineError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.wav".to_string());

        tracing::debug!(bytes = bytes.len(), "Uploading {}", file_name);

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/recognize", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await
            .map_err(|e| PipelineError::RecognitionApi(format!("request failed: {}", e)))?;

        tracing::debug!(status = %response.status(), "Recognition submit answered");
        Self::check(response).await
    }

    async fn poll(&self, job_id: &str) -> Result<JobReply, PipelineError> {
        let response = self
            .http
            .get(format!("{}/results/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(|e| PipelineError::RecognitionApi(format!("request failed: {}", e)))?;

        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> JobReply {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_failure_message_prefers_message_over_error() {
        let reply = body(json!({"message": "Quota exceeded", "error": "forbidden"}));
        assert_eq!(
            failure_message(StatusCode::FORBIDDEN, reply),
            "Quota exceeded"
        );

        let reply = body(json!({"error": "Invalid token"}));
        assert_eq!(
            failure_message(StatusCode::UNAUTHORIZED, reply),
            "Invalid token"
        );
    }

    #[test]
    fn test_failure_message_falls_back_to_status() {
        assert_eq!(
            failure_message(StatusCode::FORBIDDEN, JobReply::default()),
            "Access denied (403)"
        );
        assert_eq!(
            failure_message(StatusCode::BAD_GATEWAY, JobReply::default()),
            "HTTP 502 Bad Gateway"
        );
    }
}
