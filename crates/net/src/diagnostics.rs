//! Active network diagnostics: reachability, latency, jitter, packet
//! loss, quality classification, and an optional download speed
//! measurement.
//!
//! One battery runs at a time; a second caller gets the cached (or
//! default "unknown") report immediately instead of queueing. Results
//! are cached for 60 seconds unless a refresh is forced. Every failure
//! mode degrades fields in the report; this engine never returns an
//! error.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use hearth_common::resilience::{run_with_retry, RetryConfig};
use hearth_common::sync::InFlightFlag;
use hearth_domain::{
    ConnectionQuality, DiagnosticsReport, SpeedTest, DIAGNOSTICS_CACHE_TTL, PING_COUNT,
    PING_INTERVAL, SPEED_TEST_LATENCY_THRESHOLD,
};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::NetConfig;
use crate::transport::{HttpMethod, NetworkInfo, Transport, TransportRequest};

struct CacheSlot {
    report: DiagnosticsReport,
    stored_at: Instant,
}

/// Engine owning the diagnostics cache slot and in-flight guard.
pub struct DiagnosticsEngine {
    transport: Arc<dyn Transport>,
    network_info: Arc<dyn NetworkInfo>,
    config: NetConfig,
    retry: RetryConfig,
    cache: Mutex<Option<CacheSlot>>,
    in_flight: InFlightFlag,
}

impl DiagnosticsEngine {
    pub fn new(
        config: NetConfig,
        transport: Arc<dyn Transport>,
        network_info: Arc<dyn NetworkInfo>,
    ) -> Self {
        Self {
            transport,
            network_info,
            config,
            retry: RetryConfig::default(),
            cache: Mutex::new(None),
            in_flight: InFlightFlag::new(),
        }
    }

    /// Replace the default reachability retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the full battery, honoring the cache TTL.
    ///
    /// `retry_override` replaces the default reachability retry policy
    /// for this run only.
    #[instrument(skip_all)]
    pub async fn run_diagnostics(
        &self,
        retry_override: Option<&RetryConfig>,
    ) -> DiagnosticsReport {
        self.run_inner(retry_override, false).await
    }

    /// Run the full battery, ignoring any cached report.
    #[instrument(skip_all)]
    pub async fn force_refresh(&self) -> DiagnosticsReport {
        self.run_inner(None, true).await
    }

    /// Drop the cached report so the next call re-runs the battery.
    pub fn clear_cache(&self) {
        *self.cache.lock() = None;
        debug!("diagnostics cache cleared");
    }

    /// Last cached report, or the default "unknown" report.
    pub fn cached_or_unknown(&self) -> DiagnosticsReport {
        self.cache
            .lock()
            .as_ref()
            .map_or_else(DiagnosticsReport::unknown, |slot| slot.report.clone())
    }

    async fn run_inner(
        &self,
        retry_override: Option<&RetryConfig>,
        force: bool,
    ) -> DiagnosticsReport {
        // Callers are never queued: if a battery is already running,
        // hand back whatever we have.
        let Some(_guard) = self.in_flight.try_acquire() else {
            debug!("diagnostics already in progress, returning cached report");
            return self.cached_or_unknown();
        };

        if !force {
            if let Some(slot) = self.cache.lock().as_ref() {
                if slot.stored_at.elapsed() < DIAGNOSTICS_CACHE_TTL {
                    debug!("returning cached diagnostics report");
                    return slot.report.clone();
                }
            }
        }

        let retry = retry_override.unwrap_or(&self.retry);
        let report = self.run_battery(retry).await;

        // Whole-object replace; readers never observe a partial report.
        *self.cache.lock() = Some(CacheSlot { report: report.clone(), stored_at: Instant::now() });

        info!(
            reachable = report.server_reachable,
            quality = %report.connection_quality,
            attempts = report.retry_attempts,
            "diagnostics battery finished"
        );
        report
    }

    async fn run_battery(&self, retry: &RetryConfig) -> DiagnosticsReport {
        let mut report = DiagnosticsReport::unknown();
        report.network_type = self.network_info.network_type();

        let outcome = run_with_retry(retry, || {
            let transport = Arc::clone(&self.transport);
            let request = self.probe_request();
            async move {
                let started = Instant::now();
                transport.execute(request).await.map(|_| started.elapsed())
            }
        })
        .await;

        report.retry_attempts = outcome.attempts;

        let first_latency = match outcome.into_result() {
            Ok(latency) => latency,
            Err(err) => {
                warn!(error = %err, "server unreachable after retries");
                report.error_message = Some(err.user_message());
                return report;
            }
        };

        report.server_reachable = true;
        report.latency = Some(first_latency);
        report.last_successful_connection = Some(Utc::now());

        let samples = self.ping_battery().await;
        let successes = samples.len() as u32;
        let average_ms = mean(&samples);
        let jitter_ms = population_std_dev(&samples);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let packet_loss =
            ((f64::from(PING_COUNT - successes) / f64::from(PING_COUNT)) * 100.0).round() as u8;

        report.average_latency = Some(millis_to_duration(average_ms));
        report.jitter = Some(millis_to_duration(jitter_ms));
        report.packet_loss_percent = Some(packet_loss);
        report.connection_quality = classify_quality(average_ms, jitter_ms, packet_loss);

        if millis_to_duration(average_ms) > SPEED_TEST_LATENCY_THRESHOLD {
            debug!(average_ms, "high latency, measuring download speed");
            report.speed_test = Some(self.measure_download_speed().await);
        }

        report
    }

    /// Exactly `PING_COUNT` sequential probes with a fixed pause in
    /// between. Failed probes count only toward packet loss.
    async fn ping_battery(&self) -> Vec<f64> {
        let mut samples = Vec::with_capacity(PING_COUNT as usize);
        for probe in 0..PING_COUNT {
            if probe > 0 {
                tokio::time::sleep(PING_INTERVAL).await;
            }
            let started = Instant::now();
            match self.transport.execute(self.probe_request()).await {
                Ok(_) => samples.push(started.elapsed().as_secs_f64() * 1000.0),
                Err(err) => debug!(probe, error = %err, "latency probe failed"),
            }
        }
        samples
    }

    async fn measure_download_speed(&self) -> SpeedTest {
        let started = Instant::now();
        match self.transport.execute(self.probe_request()).await {
            Ok(response) => {
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    let bits = (response.body.len() * 8) as f64;
                    let mbps = bits / elapsed / (1024.0 * 1024.0);
                    SpeedTest {
                        download_mbps: Some((mbps * 100.0).round() / 100.0),
                        upload_mbps: None,
                    }
                } else {
                    SpeedTest::default()
                }
            }
            Err(err) => {
                debug!(error = %err, "speed measurement failed");
                SpeedTest::default()
            }
        }
    }

    fn probe_request(&self) -> TransportRequest {
        TransportRequest::new(HttpMethod::Get, self.config.health_url())
            .timeout(self.config.probe_timeout)
    }
}

/// Pure quality classification from average latency (ms), jitter (ms),
/// and packet loss (percent). Rules are evaluated in order.
pub fn classify_quality(average_ms: f64, jitter_ms: f64, packet_loss_percent: u8) -> ConnectionQuality {
    if packet_loss_percent > 10 {
        ConnectionQuality::Poor
    } else if packet_loss_percent > 5 {
        ConnectionQuality::Fair
    } else if average_ms <= 50.0 && jitter_ms <= 10.0 {
        ConnectionQuality::Excellent
    } else if average_ms <= 100.0 && jitter_ms <= 20.0 {
        ConnectionQuality::Good
    } else if average_ms <= 200.0 && jitter_ms <= 50.0 {
        ConnectionQuality::Fair
    } else {
        ConnectionQuality::Poor
    }
}

/// One-line user-facing summary of a diagnostics report.
pub fn describe_status(report: &DiagnosticsReport) -> String {
    if !report.server_reachable {
        return report.error_message.clone().unwrap_or_else(|| {
            "Unable to reach the application server; check that it is running or try again later"
                .to_string()
        });
    }

    match report.latency {
        Some(latency) => {
            format!("Server connection healthy (latency: {}ms)", latency.as_millis())
        }
        None => "Server connection healthy".to_string(),
    }
}

/// User-facing troubleshooting steps; empty when the server is
/// reachable.
pub fn troubleshooting_suggestions(report: &DiagnosticsReport) -> Vec<String> {
    let mut suggestions = Vec::new();
    if report.server_reachable {
        return suggestions;
    }

    let device_side = report
        .error_message
        .as_deref()
        .is_some_and(|message| message.contains("network connection"));
    if device_side {
        suggestions.push("Check that the device's network connection is working".to_string());
        suggestions.push("Make sure Wi-Fi or mobile data is turned on".to_string());
        suggestions.push("Try a different network".to_string());
    }

    suggestions.push("Check that the application server is running".to_string());
    suggestions.push("Verify the configured server address".to_string());
    suggestions.push("Check firewall or security software settings".to_string());
    suggestions.push("Try again later; the server may be temporarily unavailable".to_string());
    suggestions
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn population_std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let avg = mean(samples);
    let variance =
        samples.iter().map(|value| (value - avg).powi(2)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

fn millis_to_duration(ms: f64) -> std::time::Duration {
    std::time::Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::transport::{
        StaticNetworkInfo, TransportError, TransportErrorKind, TransportResponse,
    };

    /// Transport whose responses follow a fixed script, front to back.
    /// Once the script is exhausted, every call succeeds.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<u16, TransportErrorKind>>>,
        calls: AtomicU32,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<u16, TransportErrorKind>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self { script: Mutex::new(VecDeque::new()), calls: AtomicU32::new(0), delay }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().pop_front();
            match next {
                Some(Ok(status)) => Ok(TransportResponse { status, body: b"{}".to_vec() }),
                Some(Err(kind)) => Err(TransportError::new(kind, "scripted failure")),
                None => Ok(TransportResponse { status: 200, body: b"{}".to_vec() }),
            }
        }
    }

    /// Transport that fails every call with a connection error.
    struct FailingTransport;

    #[async_trait]
    impl Transport for FailingTransport {
        async fn execute(
            &self,
            _request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            Err(TransportError::new(
                TransportErrorKind::ConnectionFailed,
                "connection refused",
            ))
        }
    }

    fn engine(transport: Arc<dyn Transport>) -> DiagnosticsEngine {
        DiagnosticsEngine::new(
            NetConfig::default(),
            transport,
            Arc::new(StaticNetworkInfo("wifi".to_string())),
        )
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn cached_report_is_returned_within_ttl() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let engine = engine(Arc::clone(&transport) as Arc<dyn Transport>);

        let first = engine.run_diagnostics(Some(&fast_retry(0))).await;
        let calls_after_first = transport.call_count();
        let second = engine.run_diagnostics(Some(&fast_retry(0))).await;

        assert_eq!(first, second, "cache hit must be deep-equal");
        assert_eq!(transport.call_count(), calls_after_first, "cache hit must not probe");
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let engine = engine(Arc::clone(&transport) as Arc<dyn Transport>);

        engine.run_diagnostics(Some(&fast_retry(0))).await;
        let calls_after_first = transport.call_count();
        engine.force_refresh().await;

        assert!(transport.call_count() > calls_after_first);
    }

    #[tokio::test]
    async fn clear_cache_forces_recomputation() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let engine = engine(Arc::clone(&transport) as Arc<dyn Transport>);

        engine.run_diagnostics(Some(&fast_retry(0))).await;
        let calls_after_first = transport.call_count();
        engine.clear_cache();
        engine.run_diagnostics(Some(&fast_retry(0))).await;

        assert!(transport.call_count() > calls_after_first);
    }

    #[tokio::test]
    async fn unreachable_server_reports_all_attempts() {
        let engine = engine(Arc::new(FailingTransport));
        let report = engine.run_diagnostics(Some(&fast_retry(2))).await;

        assert!(!report.server_reachable);
        assert_eq!(report.retry_attempts, 3);
        assert_eq!(report.connection_quality, ConnectionQuality::Unknown);
        assert!(report.error_message.is_some());
        assert_eq!(report.network_type, "wifi");
    }

    #[tokio::test]
    async fn packet_loss_counts_failed_probes() {
        // Reachability probe, then pings: ok / fail / ok.
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(200),
            Ok(200),
            Err(TransportErrorKind::Timeout),
            Ok(200),
        ]));
        let engine = engine(transport as Arc<dyn Transport>);

        let report = engine.run_diagnostics(Some(&fast_retry(0))).await;

        assert!(report.server_reachable);
        assert_eq!(report.packet_loss_percent, Some(33));
    }

    #[tokio::test]
    async fn total_probe_failure_is_full_packet_loss() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(200),
            Err(TransportErrorKind::Timeout),
            Err(TransportErrorKind::Timeout),
            Err(TransportErrorKind::Timeout),
        ]));
        let engine = engine(transport as Arc<dyn Transport>);

        let report = engine.run_diagnostics(Some(&fast_retry(0))).await;

        assert!(report.server_reachable);
        assert_eq!(report.packet_loss_percent, Some(100));
        assert_eq!(report.average_latency, Some(Duration::ZERO));
        assert_eq!(report.connection_quality, ConnectionQuality::Poor);
    }

    #[tokio::test]
    async fn all_probes_succeeding_is_zero_loss() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let engine = engine(transport as Arc<dyn Transport>);

        let report = engine.run_diagnostics(Some(&fast_retry(0))).await;

        assert!(report.server_reachable);
        assert_eq!(report.packet_loss_percent, Some(0));
    }

    #[tokio::test]
    async fn concurrent_run_returns_immediately_without_second_battery() {
        let transport = Arc::new(ScriptedTransport::slow(Duration::from_millis(200)));
        let engine = Arc::new(engine(Arc::clone(&transport) as Arc<dyn Transport>));

        let background = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_diagnostics(Some(&fast_retry(0))).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let immediate = engine.run_diagnostics(Some(&fast_retry(0))).await;
        assert!(started.elapsed() < Duration::from_millis(100), "guarded call must not block");
        assert_eq!(immediate, DiagnosticsReport::unknown());

        let finished = background.await.unwrap();
        assert!(finished.server_reachable);
    }

    #[test]
    fn quality_table_is_evaluated_in_order() {
        assert_eq!(classify_quality(40.0, 5.0, 0), ConnectionQuality::Excellent);
        assert_eq!(classify_quality(80.0, 15.0, 0), ConnectionQuality::Good);
        assert_eq!(classify_quality(150.0, 30.0, 0), ConnectionQuality::Fair);
        assert_eq!(classify_quality(300.0, 10.0, 0), ConnectionQuality::Poor);
        assert_eq!(classify_quality(40.0, 5.0, 12), ConnectionQuality::Poor);
        assert_eq!(classify_quality(40.0, 5.0, 7), ConnectionQuality::Fair);
    }

    #[test]
    fn jitter_is_population_standard_deviation() {
        let samples = [10.0, 20.0, 30.0];
        assert!((population_std_dev(&samples) - 8.164_965_809).abs() < 1e-6);
        assert_eq!(population_std_dev(&[]), 0.0);
    }

    #[test]
    fn describe_status_prefers_error_message() {
        let mut report = DiagnosticsReport::unknown();
        report.error_message = Some("connection refused".to_string());
        assert_eq!(describe_status(&report), "connection refused");

        report.server_reachable = true;
        report.error_message = None;
        report.latency = Some(Duration::from_millis(42));
        assert_eq!(describe_status(&report), "Server connection healthy (latency: 42ms)");
    }

    #[test]
    fn suggestions_empty_when_reachable() {
        let mut report = DiagnosticsReport::unknown();
        report.server_reachable = true;
        assert!(troubleshooting_suggestions(&report).is_empty());
    }

    #[test]
    fn suggestions_include_device_checks_for_connectivity_failures() {
        let mut report = DiagnosticsReport::unknown();
        report.error_message = Some(
            "Unable to reach the server; check your network connection or try again later"
                .to_string(),
        );
        let suggestions = troubleshooting_suggestions(&report);
        assert_eq!(suggestions.len(), 7);
        assert!(suggestions[0].contains("device"));

        report.error_message = Some("something else".to_string());
        assert_eq!(troubleshooting_suggestions(&report).len(), 4);
    }
}
