//! Passive connectivity monitor.
//!
//! Holds a single [`NetworkStatus`] slot, re-checks it on a timer, and
//! broadcasts every fresh status to subscribers. One instance is built
//! at the composition root and shared via `Arc`; there is no global
//! singleton.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use hearth_common::events::{EventBus, Subscription};
use hearth_common::sync::InFlightFlag;
use hearth_domain::{NetworkStatus, STATUS_CACHE_TTL};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::NetConfig;
use crate::transport::{HttpMethod, Transport, TransportRequest};

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Long-lived health checker owning the current [`NetworkStatus`].
pub struct NetworkMonitor {
    transport: Arc<dyn Transport>,
    config: NetConfig,
    status: Mutex<NetworkStatus>,
    last_check: Mutex<Option<Instant>>,
    in_flight: InFlightFlag,
    status_events: EventBus<NetworkStatus>,
    worker: Mutex<Option<Worker>>,
}

impl NetworkMonitor {
    pub fn new(config: NetConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config,
            status: Mutex::new(NetworkStatus::offline()),
            last_check: Mutex::new(None),
            in_flight: InFlightFlag::new(),
            status_events: EventBus::new(),
            worker: Mutex::new(None),
        }
    }

    /// Start the periodic re-check loop using the configured
    /// `monitor_interval`. No-op when already running.
    pub fn start_monitoring(self: &Arc<Self>) {
        let interval = self.config.monitor_interval;
        self.start_monitoring_with_interval(interval);
    }

    /// Start the re-check loop with an explicit interval. No-op when
    /// already running.
    ///
    /// Runs one immediate forced check, then re-checks every
    /// `interval`; ticks go through the regular TTL gate.
    pub fn start_monitoring_with_interval(self: &Arc<Self>, interval: Duration) {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("network monitoring already running");
            return;
        }

        info!(?interval, "starting network monitoring");
        let cancel = CancellationToken::new();
        let child = cancel.child_token();
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            monitor.check_network_status(true).await;
            let mut ticker = tokio::time::interval(interval);
            // interval's first tick fires immediately; the forced check
            // above already covered it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = child.cancelled() => {
                        debug!("network monitor loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.check_network_status(false).await;
                    }
                }
            }
        });
        *worker = Some(Worker { cancel, handle });
    }

    /// Stop the re-check loop. Safe to call when not running.
    pub async fn stop_monitoring(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        info!("stopping network monitoring");
        worker.cancel.cancel();
        match tokio::time::timeout(Duration::from_secs(5), worker.handle).await {
            Ok(Ok(())) => debug!("network monitor loop stopped"),
            Ok(Err(err)) => warn!(error = %err, "network monitor loop panicked"),
            Err(_) => warn!("network monitor loop did not stop within timeout"),
        }
    }

    /// Probe the health endpoint and publish a fresh status.
    ///
    /// Skipped (returning the stored status) when a check is already in
    /// flight, or when the last check is younger than the TTL and
    /// `force` is not set. Any HTTP response counts as online; only a
    /// transport-level failure counts as offline.
    #[instrument(skip(self))]
    pub async fn check_network_status(&self, force: bool) -> NetworkStatus {
        let Some(_guard) = self.in_flight.try_acquire() else {
            debug!("network check already in progress, returning stored status");
            return self.current_status();
        };

        if !force {
            let fresh = self
                .last_check
                .lock()
                .is_some_and(|checked| checked.elapsed() < STATUS_CACHE_TTL);
            if fresh {
                debug!("stored network status still fresh");
                return self.current_status();
            }
        }

        let request = TransportRequest::new(HttpMethod::Get, self.config.health_url())
            .timeout(self.config.probe_timeout);
        let started = Instant::now();
        let status = match self.transport.execute(request).await {
            Ok(response) => {
                let latency = started.elapsed();
                debug!(status = response.status, ?latency, "health probe answered");
                NetworkStatus {
                    is_online: true,
                    last_check: Utc::now(),
                    latency: Some(latency),
                    error_message: None,
                }
            }
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "health probe failed");
                NetworkStatus {
                    is_online: false,
                    last_check: Utc::now(),
                    latency: None,
                    error_message: Some(err.user_message()),
                }
            }
        };

        *self.status.lock() = status.clone();
        *self.last_check.lock() = Some(Instant::now());

        // Listener panics are isolated by the bus; a misbehaving
        // subscriber never affects the returned status.
        self.status_events.emit(&status);
        status
    }

    /// Subscribe to status updates; dropping the handle does not
    /// unsubscribe, call [`Self::remove_listener`].
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NetworkStatus) + Send + Sync + 'static,
    {
        self.status_events.subscribe(listener)
    }

    pub fn remove_listener(&self, subscription: &Subscription) -> bool {
        self.status_events.unsubscribe(subscription)
    }

    pub fn current_status(&self) -> NetworkStatus {
        self.status.lock().clone()
    }

    pub fn is_online(&self) -> bool {
        self.status.lock().is_online
    }
}
