//! Transcription handlers: transcribe.audio, transcribe.listModels, transcribe.downloadModel.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::context::RpcContext;
use crate::errors::RpcError;
use crate::registry::MethodHandler;

/// Maximum audio size in bytes (50 MB).
const MAX_AUDIO_SIZE: usize = 50 * 1024 * 1024;

/// Map a MIME type to a sensible default filename with the correct extension.
///
/// The sidecar (and many audio libraries) uses the file extension to determine
/// the container format. Sending m4a audio with a `.wav` extension causes
/// "file does not start with RIFF id" errors.
fn filename_for_mime(mime_type: &str) -> String {
    let ext = match mime_type {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" | "audio/vorbis" => "ogg",
        "audio/webm" => "webm",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/x-caf" | "audio/x-aiff" => "caf",
        _ => "wav",
    };
    format!("audio.{ext}")
}

/// Strip data URI prefix from base64-encoded audio.
///
/// iOS sends `data:audio/m4a;base64,AAAA...` — this extracts the raw base64
/// portion after the `;base64,` marker. Plain base64 passes through unchanged.
pub fn normalize_base64(input: &str) -> &str {
    match input.find(";base64,") {
        Some(idx) => &input[idx + 8..],
        None => input,
    }
}

/// Transcribe audio bytes via the sidecar service.
///
/// Loads settings from `settings_path`, verifies transcription is enabled,
/// and POSTs the audio as multipart to the sidecar `/transcribe` endpoint.
///
/// Returns the sidecar JSON response on success or an `RpcError` on failure.
pub async fn transcribe_audio_via_sidecar(
    settings_path: &Path,
    audio_bytes: &[u8],
    mime_type: &str,
    file_name: Option<&str>,
) -> Result<Value, RpcError> {
    if !settings_path.exists() {
        return Err(RpcError::NotAvailable {
            message: "Transcription is not configured (no settings file)".into(),
        });
    }

    let settings = tron_settings::load_settings_from_path(settings_path)
        .map_err(|e| RpcError::Internal {
            message: format!("Failed to load settings: {e}"),
        })?;
    let transcription = &settings.server.transcription;

    if !transcription.enabled {
        return Err(RpcError::NotAvailable {
            message: "Transcription is not enabled in settings".into(),
        });
    }

    if audio_bytes.len() > MAX_AUDIO_SIZE {
        return Err(RpcError::InvalidParams {
            message: format!(
                "Audio data too large: {} bytes (max {})",
                audio_bytes.len(),
                MAX_AUDIO_SIZE
            ),
        });
    }

    let base_url = &transcription.base_url;
    let client = reqwest::Client::new();
    let default_name = filename_for_mime(mime_type);
    let part = reqwest::multipart::Part::bytes(audio_bytes.to_vec())
        .file_name(file_name.unwrap_or(&default_name).to_string())
        .mime_str(mime_type)
        .map_err(|e| RpcError::Internal {
            message: format!("Failed to create multipart: {e}"),
        })?;

    let form = reqwest::multipart::Form::new().part("audio", part);

    let response = client
        .post(format!("{base_url}/transcribe"))
        .multipart(form)
        .send()
        .await
        .map_err(|e| RpcError::Internal {
            message: format!("Transcription sidecar request failed: {e}"),
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RpcError::Internal {
            message: format!("Transcription sidecar returned {status}: {body}"),
        });
    }

    response.json().await.map_err(|e| RpcError::Internal {
        message: format!("Failed to parse transcription response: {e}"),
    })
}

/// Transcribe audio via the sidecar service, falling back to a stub result.
///
/// Returns `(text, language, duration_seconds)` on success, or a stub fallback
/// if the sidecar is unreachable or not configured.
pub async fn transcribe_audio(
    ctx: &RpcContext,
    audio_bytes: &[u8],
    mime_type: &str,
    file_name: Option<&str>,
) -> (String, String, f64) {
    // Rough duration estimate for fallback: ~16KB/s for compressed audio
    #[allow(clippy::cast_precision_loss)]
    let estimated_duration = (audio_bytes.len() as f64) / 16_000.0;

    match transcribe_audio_via_sidecar(&ctx.settings_path, audio_bytes, mime_type, file_name).await
    {
        Ok(result) => {
            let text = result
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or("(transcription failed)")
                .to_string();
            let lang = result
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or("en")
                .to_string();
            let dur = result
                .get("durationSeconds")
                .and_then(Value::as_f64)
                .unwrap_or(estimated_duration);
            (text, lang, dur)
        }
        Err(e) => {
            warn!(error = %e, "sidecar transcription failed, using stub");
            (
                "(transcription not available)".to_string(),
                "en".to_string(),
                estimated_duration,
            )
        }
    }
}

/// Transcribe an audio file. Tries native engine first, falls back to sidecar.
pub struct TranscribeAudioHandler;

#[async_trait]
impl MethodHandler for TranscribeAudioHandler {
    #[instrument(skip(self, ctx), fields(method = "transcribe.audio"))]
    async fn handle(&self, params: Option<Value>, ctx: &RpcContext) -> Result<Value, RpcError> {
        let audio_base64 = params
            .as_ref()
            .and_then(|p| p.get("audioBase64"))
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidParams {
                message: "Missing required parameter: audioBase64".into(),
            })?;

        // Strip data URI prefix if present (iOS sends "data:audio/m4a;base64,...")
        let audio_base64 = normalize_base64(audio_base64);

        // Decode and validate size
        let audio_bytes = base64::engine::general_purpose::STANDARD
            .decode(audio_base64)
            .map_err(|e| RpcError::InvalidParams {
                message: format!("Invalid base64 audio data: {e}"),
            })?;

        if audio_bytes.len() > MAX_AUDIO_SIZE {
            return Err(RpcError::InvalidParams {
                message: format!(
                    "Audio data too large: {} bytes (max {})",
                    audio_bytes.len(),
                    MAX_AUDIO_SIZE
                ),
            });
        }

        let mime_type = params
            .as_ref()
            .and_then(|p| p.get("mimeType"))
            .and_then(Value::as_str)
            .unwrap_or("audio/wav");

        let (text, language, duration_seconds) =
            transcribe_audio(ctx, &audio_bytes, mime_type, None).await;

        Ok(serde_json::json!({
            "text": text,
            "language": language,
            "durationSeconds": duration_seconds,
        }))
    }
}

/// List available transcription models. The engine that backs these models is
/// an external collaborator (the sidecar service); this handler only reports
/// what model the sidecar would be asked to use.
pub struct ListModelsHandler;

#[async_trait]
impl MethodHandler for ListModelsHandler {
    #[instrument(skip(self, _ctx), fields(method = "transcribe.listModels"))]
    async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "models": [
                {
                    "id": "parakeet-tdt-0.6b-v3",
                    "name": "Parakeet TDT 0.6B v3",
                    "size": "600M",
                    "language": "en",
                    "default": true,
                    "cached": false,
                    "engineLoaded": false,
                }
            ]
        }))
    }
}

/// Trigger a model download. Model management lives in the sidecar process,
/// not this core — this handler always reports the request as a no-op.
pub struct DownloadModelHandler;

#[async_trait]
impl MethodHandler for DownloadModelHandler {
    #[instrument(skip(self, _ctx), fields(method = "transcribe.downloadModel"))]
    async fn handle(&self, _params: Option<Value>, _ctx: &RpcContext) -> Result<Value, RpcError> {
        Ok(serde_json::json!({
            "started": false,
            "reason": "not_managed_by_core",
        }))
    }
}
