//! Media upload proxy.
//!
//! Uploads are streamed to the backend without buffering so large files do
//! not sit in gateway memory. A streamed body cannot be replayed, so this
//! path makes a single attempt with the current service token instead of the
//! 401 retry used for JSON proxying.
//!
//! Backend error bodies are deliberately discarded: the backend can answer a
//! failed upload with a null media DTO, and relaying that breaks callers that
//! expect either a real DTO or a structured error.

use crate::proxy::unconfigured_backend_response;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;

/// POST /api/proxy/event-medias/upload
pub async fn upload_media(State(state): State<AppState>, req: Request) -> Response {
    proxy_upload(state, req, "/api/event-medias/upload").await
}

/// POST /api/proxy/event-medias/upload-multiple
pub async fn upload_media_multiple(State(state): State<AppState>, req: Request) -> Response {
    proxy_upload(state, req, "/api/event-medias/upload-multiple").await
}

async fn proxy_upload(state: AppState, req: Request, backend_path: &str) -> Response {
    let Some(base_url) = state.settings.backend.base_url().map(str::to_string) else {
        return unconfigured_backend_response();
    };

    let (parts, body) = req.into_parts();

    let mut url = format!("{}{}", base_url, backend_path);
    if let Some(query) = parts.uri.query() {
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
    }

    // Fast path: a fresh cached token skips the issuance-serializing lock
    let tokens = state.backend.tokens();
    let token = match tokens.cached().await {
        Some(token) => token,
        None => match tokens.current().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(error = %e, "Failed to obtain service token for upload");
                return AppError::InternalError(e).into_response();
            }
        },
    };

    let mut request = state
        .backend
        .http()
        .post(&url)
        .bearer_auth(token)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()));

    // The multipart boundary lives in the inbound content type
    if let Some(content_type) = parts.headers.get(header::CONTENT_TYPE) {
        if let Ok(value) = content_type.to_str() {
            request = request.header(header::CONTENT_TYPE, value);
        }
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, %url, "Upload forwarding failed");
            return AppError::InternalError(anyhow::anyhow!("Upload request failed: {}", e))
                .into_response();
        }
    };

    let backend_status = response.status().as_u16();

    if response.status().is_success() {
        tracing::debug!(status = backend_status, "Backend upload succeeded");
        let status =
            StatusCode::from_u16(backend_status).unwrap_or(StatusCode::OK);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok());

        return match response.bytes().await {
            Ok(bytes) => {
                let mut reply = (status, bytes).into_response();
                if let Some(value) = content_type {
                    reply.headers_mut().insert(header::CONTENT_TYPE, value);
                }
                reply
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read upload response body");
                AppError::InternalError(anyhow::anyhow!("Failed to read upload response: {}", e))
                    .into_response()
            }
        };
    }

    // Drop the error body unread; relay only a structured error
    tracing::error!(status = backend_status, "Backend upload failed");
    drop(response);

    let status = if backend_status >= 400 {
        StatusCode::from_u16(backend_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(json!({
            "error": "Upload failed",
            "status": backend_status,
            "message": format!("Upload operation failed with HTTP status {}", backend_status),
            "success": false,
        })),
    )
        .into_response()
}
