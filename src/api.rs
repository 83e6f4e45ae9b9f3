use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::generator::compose::{self, GenerateInput};
use crate::generator::GenError;
use crate::{config, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Layout variant id, see `/variants`.
    pub variant: String,
    pub name: String,
    pub designation: String,
    /// Uploaded photo as base64 or a data URI (JPEG or PNG).
    pub photo: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub text_backend: String,
}

#[utoipa::path(get, path = "/health", tag = "cardgen", responses((status=200, body=HealthResponse)))]
pub async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".into(),
        text_backend: st.rasterizer.id().into(),
    })
}

#[utoipa::path(
    get,
    path = "/variants",
    tag = "cardgen",
    responses((status=200, body=serde_json::Value))
)]
pub async fn variants() -> impl IntoResponse {
    let list: Vec<_> = config::variant_ids()
        .iter()
        .filter_map(|id| config::variant(id))
        .map(|v| {
            serde_json::json!({
                "variant": v.id,
                "download_name": v.download_name,
                "canvas": { "width": v.canvas.0, "height": v.canvas.1 },
                "slot": { "x": v.slot.x, "y": v.slot.y, "width": v.slot.w, "height": v.slot.h },
                "name_box": box_json(&v.name.bounds),
                "designation_box": box_json(&v.designation.bounds),
            })
        })
        .collect();
    Json(serde_json::json!({ "variants": list }))
}

fn box_json(b: &config::TextBox) -> serde_json::Value {
    serde_json::json!({ "x1": b.x1, "y1": b.y1, "x2": b.x2, "y2": b.y2 })
}

#[utoipa::path(
    post,
    path = "/generate",
    tag = "cardgen",
    request_body = GenerateRequest,
    responses(
        (status=200, description="Composited card", content_type="image/png"),
        (status=400, description="Bad request"),
        (status=500, description="Internal error")
    )
)]
pub async fn generate(
    State(st): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let layout = config::variant(&req.variant).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!(
                "unknown variant: {}. Available: {:?}",
                req.variant,
                config::variant_ids()
            ),
        )
    })?;

    // An empty photo field flows through as empty bytes so the pipeline's own
    // input validation reports it; only well-formed-but-undecodable base64 is
    // rejected here.
    let photo = if req.photo.trim().is_empty() {
        Vec::new()
    } else {
        decode_photo_field(&req.photo).ok_or((
            StatusCode::BAD_REQUEST,
            "photo must be base64 or a data URI".to_string(),
        ))?
    };

    let input = GenerateInput {
        name: req.name,
        designation: req.designation,
        photo,
    };

    let out = compose::generate(&layout, st.rasterizer.as_ref(), &input)
        .map_err(|e| error_response(&req.variant, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", layout.download_name))
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
    );
    if !out.warnings.is_empty() {
        let warning = out.warnings.join("; ");
        warn!(variant = layout.id, "{warning}");
        headers.insert(
            HeaderName::from_static("x-render-warning"),
            HeaderValue::from_str(&warning)
                .unwrap_or_else(|_| HeaderValue::from_static("text rendering degraded")),
        );
    }

    Ok((headers, out.png))
}

/// Accepts either plain base64 or a `data:image/...;base64,` URI.
fn decode_photo_field(input: &str) -> Option<Vec<u8>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    let b64 = match s.strip_prefix("data:") {
        Some(rest) => rest.split_once(',')?.1.trim(),
        None => s,
    };
    base64::engine::general_purpose::STANDARD
        .decode(b64.as_bytes())
        .ok()
}

fn error_response(variant: &str, e: GenError) -> (StatusCode, String) {
    match e {
        GenError::MissingInput(msg) => (StatusCode::BAD_REQUEST, msg),
        GenError::Decode(msg) => (StatusCode::BAD_REQUEST, msg),
        GenError::MissingAsset(msg) => {
            error!(variant, "configuration error: {msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
        GenError::Image(msg) | GenError::Internal(msg) => {
            error!(variant, "{msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_base64() {
        assert_eq!(decode_photo_field("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn decodes_data_uri() {
        assert_eq!(
            decode_photo_field("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn empty_and_garbage_are_none() {
        assert!(decode_photo_field("").is_none());
        assert!(decode_photo_field("   ").is_none());
        assert!(decode_photo_field("!!not base64!!").is_none());
    }
}
