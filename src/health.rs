use crate::codec::CodecRegistry;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();
    let registry = CodecRegistry::global();

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "audio-pipeline-backend",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_sessions": metrics.active_sessions,
            "frames_echoed": metrics.frames_echoed,
            "frame_bytes_received": metrics.frame_bytes_received
        },
        "codec": codec_info(registry, &config)
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "active_sessions": metrics.active_sessions,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "streaming": {
            "frames_echoed": metrics.frames_echoed,
            "frame_bytes_received": metrics.frame_bytes_received,
            "max_frame_bytes": state.get_config().websocket.max_frame_bytes
        },
        "endpoints": endpoint_stats
    }))
}

/// The capability table plus the backend a default connection would get.
pub fn codec_info(
    registry: &CodecRegistry,
    config: &crate::config::AppConfig,
) -> serde_json::Value {
    let backends: Vec<serde_json::Value> = registry
        .descriptors()
        .iter()
        .map(|d| {
            json!({
                "name": d.kind.as_str(),
                "available": d.available
            })
        })
        .collect();

    json!({
        "backends": backends,
        "available": registry.available_names(),
        "best_available": registry.best_available().as_str(),
        "default_request": config.default_backend(),
        "default_resolved": registry
            .resolve(config.default_backend())
            .kind()
            .as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn test_codec_info_shape() {
        let info = codec_info(CodecRegistry::global(), &AppConfig::default());
        let backends = info["backends"].as_array().unwrap();
        assert_eq!(backends.len(), 3);
        // Reference is the guaranteed fallback, so the available list is
        // never empty and the resolved default names an available backend.
        assert!(!info["available"].as_array().unwrap().is_empty());
        let resolved = info["default_resolved"].as_str().unwrap();
        assert!(["accelerated", "vectorized", "reference"].contains(&resolved));
    }
}
