//! Core data types for the network resilience subsystem.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uniform result envelope produced by every gateway call.
///
/// Mirrors the server's wire format: `code`, `message`, optional `data`,
/// an epoch-millisecond `timestamp`, and a `success` flag. Immutable once
/// constructed; failures are represented as envelopes, never as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl<T> ApiEnvelope<T> {
    /// Build a successful envelope carrying `data`.
    pub fn ok(code: u16, message: impl Into<String>, data: T) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
            timestamp: Utc::now(),
            success: true,
        }
    }

    /// Build a failure envelope with no payload.
    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None, timestamp: Utc::now(), success: false }
    }
}

/// Point-in-time connectivity status owned by the passive monitor.
///
/// Replaced wholesale on every check; never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_online: bool,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl NetworkStatus {
    /// Initial status before the first check has run.
    pub fn offline() -> Self {
        Self { is_online: false, last_check: Utc::now(), latency: None, error_message: None }
    }
}

/// Connection quality classification derived from the latency battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result of the optional download speed measurement.
///
/// Upload speed is never measured (the server offers no upload sink) but
/// the field is kept for wire parity with clients that expect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedTest {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

/// Aggregate outcome of one diagnostics battery.
///
/// Owned by the diagnostics engine and cached as a single slot; all
/// failure modes degrade fields here instead of surfacing as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub server_reachable: bool,
    pub connection_quality: ConnectionQuality,
    /// Number of reachability attempts actually made (at most
    /// `max_retries + 1`).
    pub retry_attempts: u32,
    pub latency: Option<Duration>,
    pub average_latency: Option<Duration>,
    pub jitter: Option<Duration>,
    pub packet_loss_percent: Option<u8>,
    pub last_successful_connection: Option<DateTime<Utc>>,
    pub speed_test: Option<SpeedTest>,
    pub error_message: Option<String>,
    pub network_type: String,
}

impl DiagnosticsReport {
    /// Default report before any battery has run.
    pub fn unknown() -> Self {
        Self {
            server_reachable: false,
            connection_quality: ConnectionQuality::Unknown,
            retry_attempts: 0,
            latency: None,
            average_latency: None,
            jitter: None,
            packet_loss_percent: None,
            last_successful_connection: None,
            speed_test: None,
            error_message: None,
            network_type: "unknown".to_string(),
        }
    }
}

impl Default for DiagnosticsReport {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_failure_has_no_data() {
        let envelope: ApiEnvelope<String> = ApiEnvelope::failure(503, "unreachable");
        assert!(!envelope.success);
        assert_eq!(envelope.code, 503);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn envelope_round_trips_epoch_millis() {
        let envelope = ApiEnvelope::ok(200, "ok", serde_json::json!({"status": "UP"}));
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json["timestamp"].is_i64(), "timestamp must serialize as epoch millis");

        let parsed: ApiEnvelope<serde_json::Value> = serde_json::from_value(json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.code, 200);
    }

    #[test]
    fn envelope_deserializes_with_absent_data() {
        let raw = r#"{"code":401,"message":"unauthorized","timestamp":1700000000000,"success":false}"#;
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert!(envelope.data.is_none());
        assert!(!envelope.success);
    }

    #[test]
    fn unknown_report_is_default() {
        let report = DiagnosticsReport::unknown();
        assert_eq!(report, DiagnosticsReport::default());
        assert_eq!(report.connection_quality, ConnectionQuality::Unknown);
        assert_eq!(report.network_type, "unknown");
        assert_eq!(report.retry_attempts, 0);
    }

    #[test]
    fn quality_display_labels() {
        assert_eq!(ConnectionQuality::Excellent.to_string(), "excellent");
        assert_eq!(ConnectionQuality::Unknown.to_string(), "unknown");
    }
}
