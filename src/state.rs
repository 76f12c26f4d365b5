//! # Application State Management
//!
//! Shared state visible to every request handler and WebSocket actor:
//! the runtime configuration, the metrics counters, and the server start
//! time. Mutable pieces sit behind `Arc<RwLock<_>>` so many requests can
//! read concurrently while updates stay exclusive.
//!
//! Streaming sessions never share mutable state with each other; only
//! these process-wide counters (and the read-only codec registry) are
//! common ground.

use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// State shared across all HTTP request handlers and sessions.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runtime configuration, updatable through the config endpoint.
    pub config: Arc<RwLock<AppConfig>>,

    /// Counters updated by middleware and the streaming path.
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started; immutable, read without locking.
    pub start_time: Instant,
}

/// Counters collected across all requests and sessions.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total HTTP requests since start.
    pub request_count: u64,

    /// Total failed HTTP requests since start.
    pub error_count: u64,

    /// Currently connected streaming sessions.
    pub active_sessions: u32,

    /// Binary frames echoed over all sessions since start.
    pub frames_echoed: u64,

    /// Bytes received in binary frames over all sessions since start.
    pub frame_bytes_received: u64,

    /// Per-endpoint statistics, keyed by "METHOD /path".
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Copy of the current configuration; cloning keeps the lock short.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record timing for one finished request.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics
            .endpoint_metrics
            .entry(endpoint.to_string())
            .or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    pub fn increment_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
    }

    pub fn decrement_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        // Guard against underflow if a session double-reports its close.
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    /// Account one echoed frame of `bytes` length.
    pub fn record_frame(&self, bytes: usize) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.frames_echoed += 1;
        metrics.frame_bytes_received += bytes as u64;
    }

    /// Consistent copy of the metrics for serialization.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_sessions: metrics.active_sessions,
            frames_echoed: metrics.frames_echoed,
            frame_bytes_received: metrics.frame_bytes_received,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_gauge_never_underflows() {
        let state = AppState::new(AppConfig::default());
        state.decrement_active_sessions();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 0);

        state.increment_active_sessions();
        state.increment_active_sessions();
        state.decrement_active_sessions();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 1);
    }

    #[test]
    fn test_frame_accounting() {
        let state = AppState::new(AppConfig::default());
        state.record_frame(4);
        state.record_frame(0);
        let snapshot = state.get_metrics_snapshot();
        assert_eq!(snapshot.frames_echoed, 2);
        assert_eq!(snapshot.frame_bytes_received, 4);
    }

    #[test]
    fn test_endpoint_metrics_aggregate() {
        let state = AppState::new(AppConfig::default());
        state.record_endpoint_request("GET /health", 10, false);
        state.record_endpoint_request("GET /health", 30, true);
        let snapshot = state.get_metrics_snapshot();
        let metric = &snapshot.endpoint_metrics["GET /health"];
        assert_eq!(metric.request_count, 2);
        assert_eq!(metric.error_count, 1);
        assert!((metric.average_duration_ms() - 20.0).abs() < f64::EPSILON);
        assert!((metric.error_rate() - 0.5).abs() < f64::EPSILON);
    }
}
