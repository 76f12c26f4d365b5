//! Codec endpoints for inspection and testing without a WebSocket client.
//!
//! `GET /codecs` exposes the capability table; the encode/decode endpoints
//! run the same codec path a streaming session uses, including explicit
//! backend selection with silent fallback.

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::codec::{self, CodecRegistry};
use crate::error::AppError;
use crate::health::codec_info;
use crate::state::AppState;

/// Request to compress PCM16 samples to μ-law.
#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    /// Samples as integers; values outside [-32768, 32767] are rejected.
    pub samples: Vec<i64>,
    /// Optional backend name; unknown or unavailable names fall back.
    pub backend: Option<String>,
}

/// Response with the μ-law bytes and the backend that produced them.
#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub mulaw: Vec<u8>,
    pub backend: &'static str,
    pub sample_count: usize,
}

/// Request to expand μ-law bytes to PCM16 samples.
#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub mulaw: Vec<u8>,
    pub backend: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecodeResponse {
    pub samples: Vec<i16>,
    pub backend: &'static str,
    pub sample_count: usize,
}

/// GET /codecs — the registry snapshot.
pub async fn list_codecs(state: web::Data<AppState>) -> ActixResult<HttpResponse, AppError> {
    let config = state.get_config();
    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "codec": codec_info(CodecRegistry::global(), &config)
    })))
}

/// POST /codec/encode
pub async fn encode_samples(
    req: web::Json<EncodeRequest>,
) -> ActixResult<HttpResponse, AppError> {
    let samples = req
        .samples
        .iter()
        .map(|&v| codec::checked_sample(v))
        .collect::<Result<Vec<i16>, AppError>>()?;

    let resolved = CodecRegistry::global().resolve(req.backend.as_deref());
    let mulaw = resolved.encode(&samples);

    Ok(HttpResponse::Ok().json(EncodeResponse {
        sample_count: mulaw.len(),
        backend: resolved.kind().as_str(),
        mulaw,
    }))
}

/// POST /codec/decode
pub async fn decode_samples(
    req: web::Json<DecodeRequest>,
) -> ActixResult<HttpResponse, AppError> {
    let resolved = CodecRegistry::global().resolve(req.backend.as_deref());
    let samples = resolved.decode(&req.mulaw);

    Ok(HttpResponse::Ok().json(DecodeResponse {
        sample_count: samples.len(),
        backend: resolved.kind().as_str(),
        samples,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_deserialization() {
        let req: EncodeRequest =
            serde_json::from_str(r#"{"samples": [0, 32767, -32768], "backend": "reference"}"#)
                .unwrap();
        assert_eq!(req.samples, vec![0, 32767, -32768]);
        assert_eq!(req.backend.as_deref(), Some("reference"));
    }

    #[test]
    fn test_decode_request_backend_optional() {
        let req: DecodeRequest = serde_json::from_str(r#"{"mulaw": [255, 128]}"#).unwrap();
        assert_eq!(req.mulaw, vec![255, 128]);
        assert!(req.backend.is_none());
    }

    #[test]
    fn test_out_of_range_sample_is_rejected() {
        let samples = [0i64, 32768];
        let result: Result<Vec<i16>, AppError> =
            samples.iter().map(|&v| codec::checked_sample(v)).collect();
        assert!(matches!(result, Err(AppError::InvalidSample(32768))));
    }
}
