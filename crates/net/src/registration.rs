//! Push token registration with a one-shot deferred retry.
//!
//! Registration goes through the gateway like any other call. When it
//! fails, a single retry is scheduled on a fixed 30 second timer; the
//! timer, once armed, fires unconditionally. If the retry also fails,
//! a diagnostics battery runs and its troubleshooting suggestions are
//! logged for support.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hearth_common::resilience::{run_with_retry, RetryConfig};
use hearth_domain::{DEFERRED_RETRY_DELAY, AUTH_TOKEN_KEY};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::credentials::CredentialStore;
use crate::diagnostics::{troubleshooting_suggestions, DiagnosticsEngine};
use crate::gateway::ApiGateway;

/// Static device facts attached to every registration.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub platform: String,
    pub app_version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRegistration<'a> {
    device_token: &'a str,
    platform: &'a str,
    device_info: String,
    app_version: &'a str,
}

#[derive(Debug)]
struct RegistrationFailed;

/// Registers device push tokens with the server.
pub struct PushRegistrar {
    gateway: Arc<ApiGateway>,
    diagnostics: Arc<DiagnosticsEngine>,
    credentials: Arc<dyn CredentialStore>,
    profile: DeviceProfile,
    retry_delay: Duration,
}

impl PushRegistrar {
    pub fn new(
        gateway: Arc<ApiGateway>,
        diagnostics: Arc<DiagnosticsEngine>,
        credentials: Arc<dyn CredentialStore>,
        profile: DeviceProfile,
    ) -> Self {
        Self { gateway, diagnostics, credentials, profile, retry_delay: DEFERRED_RETRY_DELAY }
    }

    /// Override the deferred retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Register `token` with the server. Skipped (returning `false`)
    /// when no session credential is stored: the server rejects
    /// unauthenticated registrations anyway.
    #[instrument(skip_all)]
    pub async fn register_token(&self, token: &str) -> bool {
        match self.credentials.get(AUTH_TOKEN_KEY) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("no session credential, skipping push token registration");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "credential store read failed, skipping registration");
                return false;
            }
        }

        let registration = TokenRegistration {
            device_token: token,
            platform: &self.profile.platform,
            device_info: json!({
                "platform": self.profile.platform,
                "timestamp": Utc::now().to_rfc3339(),
            })
            .to_string(),
            app_version: &self.profile.app_version,
        };

        let envelope: hearth_domain::ApiEnvelope<serde_json::Value> =
            self.gateway.post("/device-tokens/register", Some(&registration)).await;

        if envelope.success {
            info!("push token registered");
            true
        } else {
            warn!(code = envelope.code, message = %envelope.message, "push token registration failed");
            false
        }
    }

    /// Register `token` now; on failure arm the deferred retry.
    pub async fn register_with_deferred_retry(self: &Arc<Self>, token: String) {
        if !self.register_token(&token).await {
            let _retry = self.schedule_registration_retry(token);
        }
    }

    /// Arm a one-shot retry after the fixed delay. The returned handle
    /// is only needed by callers that want to await completion; the
    /// task runs to the end regardless.
    pub fn schedule_registration_retry(self: &Arc<Self>, token: String) -> JoinHandle<()> {
        info!(delay = ?self.retry_delay, "scheduling push token registration retry");
        let registrar = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registrar.retry_delay).await;
            debug!("retrying push token registration");

            let outcome = run_with_retry(&RetryConfig::one_shot(), || {
                let registrar = Arc::clone(&registrar);
                let token = token.clone();
                async move {
                    if registrar.register_token(&token).await {
                        Ok(())
                    } else {
                        Err(RegistrationFailed)
                    }
                }
            })
            .await;

            if outcome.is_success() {
                return;
            }

            warn!("push token registration retry failed, running diagnostics");
            let report = registrar.diagnostics.run_diagnostics(None).await;
            if !report.server_reachable {
                for suggestion in troubleshooting_suggestions(&report) {
                    info!(%suggestion, "network troubleshooting suggestion");
                }
            }
        })
    }
}
