// HTTP response utilities for JSON+Brotli encoding
use async_compression::tokio::bufread::BrotliEncoder;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Response, StatusCode, header},
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, error};

/// Whether the client advertised Brotli in `Accept-Encoding`
pub fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').any(|enc| enc.trim().starts_with("br")))
        .unwrap_or(false)
}

pub async fn brotli_compress(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = BrotliEncoder::new(bytes);
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}

/// Serialize to JSON, optionally Brotli-compressed
pub async fn json_response<T: Serialize>(data: &T, compress: bool) -> Result<Response<Body>, StatusCode> {
    json_response_with_status(StatusCode::OK, data, compress).await
}

pub async fn json_response_with_status<T: Serialize>(
    status: StatusCode,
    data: &T,
    compress: bool,
) -> Result<Response<Body>, StatusCode> {
    let json_bytes = serde_json::to_vec(data).map_err(|e| {
        error!(error = %e, "JSON serialization error");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let (body_bytes, content_encoding) = if compress {
        let compressed = brotli_compress(&json_bytes).await.map_err(|e| {
            error!(error = %e, "Brotli compression error");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        debug!(original = json_bytes.len(), compressed = compressed.len(), "Compressed response");
        (compressed, Some("br"))
    } else {
        (json_bytes, None)
    };

    let mut response_builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, HeaderValue::from(body_bytes.len()));

    if let Some(encoding) = content_encoding {
        response_builder = response_builder
            .header(header::CONTENT_ENCODING, encoding)
            .header(header::VARY, "accept-encoding");
    }

    response_builder.body(Body::from(body_bytes)).map_err(|e| {
        error!(error = %e, "Response build error");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
