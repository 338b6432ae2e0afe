//! HTTP surface for browser clients.
//!
//! Every handler answers JSON. Failures that are not part of a result record
//! become `{success: false, error}` with a matching status code.

use crate::models::{PipelineReport, RecordRequest};
use crate::pipeline::{AUDIO_EXTENSIONS, AudioSource, Pipeline, latest_audio};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub const DEFAULT_BIND: &str = "0.0.0.0:5001";

/// Shared context passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub downloads_dir: PathBuf,
    pub default_duration: u32,
    pub default_device: Option<usize>,
}

impl AppState {
    fn record_request(&self, body: RecordBody) -> RecordRequest {
        RecordRequest {
            duration_secs: body.duration.unwrap_or(self.default_duration),
            device_index: body.device_index.or(self.default_device),
        }
    }
}

/// Error answered as `{success: false, error}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(status = %self.status, "{}", self.message);
        (
            self.status,
            Json(json!({"success": false, "error": self.message})),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct RecordBody {
    duration: Option<u32>,
    device_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RecognizeBody {
    audio_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadBody {
    track_name: Option<String>,
    artist_name: Option<String>,
    link: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let recordings = ServeDir::new(state.pipeline.recordings_dir());
    let downloads = ServeDir::new(&state.downloads_dir);

    Router::new()
        .route("/api/devices", get(list_devices))
        .route("/api/record", post(record))
        .route("/api/recognize", post(recognize))
        .route("/api/download", post(download))
        .route("/api/process", post(process))
        .route("/api/process_last", post(process_last))
        .nest_service("/api/audio", recordings)
        .nest_service("/api/downloads", downloads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the HTTP surface until Ctrl+C
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}

/// GET /api/devices
async fn list_devices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let devices = state.pipeline.recorder().list_devices().await?;
    Ok(Json(json!({"success": true, "devices": devices})))
}

/// POST /api/record
async fn record(
    State(state): State<AppState>,
    body: Option<Json<RecordBody>>,
) -> Result<Json<Value>, ApiError> {
    let request = state.record_request(body.map(|Json(b)| b).unwrap_or_default());
    let recording = state.pipeline.recorder().record(request).await?;

    Ok(Json(json!({
        "success": true,
        "audio_file": recording.path,
        "max_level": recording.max_level,
        "warning": recording.warning,
    })))
}

/// POST /api/recognize
async fn recognize(
    State(state): State<AppState>,
    Json(body): Json<RecognizeBody>,
) -> Result<Response, ApiError> {
    let Some(audio_file) = body.audio_file.filter(|f| !f.is_empty()) else {
        return Err(ApiError::bad_request("No audio file specified"));
    };
    let path = Path::new(&audio_file);
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ApiError::bad_request(format!(
            "Audio file not found: {}",
            audio_file
        )));
    }

    Ok(Json(state.pipeline.recognize_file(path).await).into_response())
}

/// POST /api/download
async fn download(
    State(state): State<AppState>,
    Json(body): Json<DownloadBody>,
) -> Result<Response, ApiError> {
    let (Some(title), Some(artist)) = (
        body.track_name.filter(|t| !t.is_empty()),
        body.artist_name.filter(|a| !a.is_empty()),
    ) else {
        return Err(ApiError::bad_request(
            "track_name and artist_name are required",
        ));
    };

    let result = state
        .pipeline
        .download(&title, &artist, body.link.as_deref())
        .await;
    Ok(Json(result).into_response())
}

/// POST /api/process
///
/// A multipart body carries a browser recording in its `audio` field.
/// Anything else records on the server's device.
async fn process(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<PipelineReport>, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let source = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        AudioSource::File(save_upload(&state, multipart).await?)
    } else {
        let bytes = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        let body: RecordBody = if bytes.iter().all(u8::is_ascii_whitespace) {
            RecordBody::default()
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?
        };
        AudioSource::Record(state.record_request(body))
    };

    Ok(Json(state.pipeline.run(source).await))
}

async fn save_upload(state: &AppState, mut multipart: Multipart) -> Result<PathBuf, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("audio") {
            continue;
        }
        let ext = field
            .file_name()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded audio is empty"));
        }
        return Ok(state.pipeline.store_upload(&bytes, ext.as_deref()).await?);
    }

    Err(ApiError::bad_request("No audio file provided"))
}

/// POST /api/process_last
async fn process_last(State(state): State<AppState>) -> Result<Json<PipelineReport>, ApiError> {
    if latest_audio(state.pipeline.recordings_dir(), &AUDIO_EXTENSIONS).is_none() {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "No recordings found",
        ));
    }
    Ok(Json(state.pipeline.run(AudioSource::Latest).await))
}
