//! Request gateway: every outbound API call goes through here.
//!
//! The gateway attaches the stored bearer credential, normalizes every
//! outcome (success, server error, transport failure) into one
//! [`ApiEnvelope`], and detects session expiry. It never returns an
//! error: failure modes are represented as `success = false` envelopes
//! so domain services have a single shape to consume.

use std::sync::Arc;

use hearth_common::events::{EventBus, Subscription};
use hearth_domain::{ApiEnvelope, AUTH_TOKEN_KEY};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::NetConfig;
use crate::credentials::{purge_session, CredentialStore};
use crate::transport::{HttpMethod, Transport, TransportRequest};

/// Gateway wrapping the transport with credentials, envelope
/// normalization, and session-expiry broadcasting.
///
/// Shares [`NetConfig`] with the diagnostics engine and the passive
/// monitor; `base_url` and `request_timeout` apply to every call.
pub struct ApiGateway {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    session_expired: EventBus<()>,
    config: NetConfig,
}

impl ApiGateway {
    pub fn new(
        config: NetConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self { transport, credentials, session_expired: EventBus::new(), config }
    }

    /// The session-expiry topic; fired once per observed 401.
    pub fn session_events(&self) -> EventBus<()> {
        self.session_expired.clone()
    }

    /// Register a listener invoked (with no arguments) on session expiry.
    pub fn add_session_expired_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.session_expired.subscribe(move |()| listener())
    }

    /// Remove a previously registered session-expiry listener.
    pub fn remove_session_expired_listener(&self, subscription: &Subscription) -> bool {
        self.session_expired.unsubscribe(subscription)
    }

    /// Execute a GET request; `query` pairs are serialized into the URL.
    #[instrument(skip(self, query), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&[(&str, String)]>,
    ) -> ApiEnvelope<T> {
        self.execute(HttpMethod::Get, path, query, None).await
    }

    /// Execute a POST request with an optional JSON body.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> ApiEnvelope<T> {
        match self.serialize_body(body) {
            Ok(json) => self.execute(HttpMethod::Post, path, None, json).await,
            Err(envelope) => envelope,
        }
    }

    /// Execute a PUT request with an optional JSON body.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> ApiEnvelope<T> {
        match self.serialize_body(body) {
            Ok(json) => self.execute(HttpMethod::Put, path, None, json).await,
            Err(envelope) => envelope,
        }
    }

    /// Execute a DELETE request.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiEnvelope<T> {
        self.execute(HttpMethod::Delete, path, None, None).await
    }

    fn serialize_body<B: Serialize, T>(
        &self,
        body: Option<&B>,
    ) -> Result<Option<serde_json::Value>, ApiEnvelope<T>> {
        match body {
            None => Ok(None),
            Some(value) => serde_json::to_value(value).map(Some).map_err(|err| {
                warn!(error = %err, "failed to serialize request body");
                ApiEnvelope::failure(500, format!("failed to serialize request body: {err}"))
            }),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<serde_json::Value>,
    ) -> ApiEnvelope<T> {
        let url = match self.build_url(path, query) {
            Ok(url) => url,
            Err(message) => {
                warn!(path, %message, "failed to build request URL");
                return ApiEnvelope::failure(500, message);
            }
        };

        let mut request = TransportRequest::new(method, url)
            .bearer(self.bearer_token())
            .timeout(self.config.request_timeout);
        if let Some(json) = body {
            request = request.json_body(json);
        }

        match self.transport.execute(request).await {
            Ok(response) => self.finish(response),
            Err(err) => {
                warn!(kind = ?err.kind(), error = %err, "transport failure; returning failure envelope");
                ApiEnvelope::failure(err.kind().pseudo_status(), err.user_message())
            }
        }
    }

    /// Read the bearer credential; absent is a valid, unauthenticated
    /// call, and a storage error is treated the same way.
    fn bearer_token(&self) -> Option<String> {
        match self.credentials.get(AUTH_TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "credential store read failed; sending unauthenticated");
                None
            }
        }
    }

    fn build_url(&self, path: &str, query: Option<&[(&str, String)]>) -> Result<String, String> {
        let mut url = Url::parse(&format!("{}{}", self.config.base_url, path))
            .map_err(|e| format!("invalid request URL: {e}"))?;
        if let Some(pairs) = query {
            let mut serializer = url.query_pairs_mut();
            for (key, value) in pairs {
                serializer.append_pair(key, value);
            }
        }
        Ok(url.into())
    }

    fn finish<T: DeserializeOwned>(
        &self,
        response: crate::transport::TransportResponse,
    ) -> ApiEnvelope<T> {
        if response.is_unauthorized() {
            self.expire_session();
        }

        let http_ok = (200..300).contains(&response.status);

        match serde_json::from_slice::<ApiEnvelope<T>>(&response.body) {
            Ok(envelope) if http_ok && envelope.success => {
                debug!(code = envelope.code, "request succeeded");
                envelope
            }
            Ok(envelope) => {
                warn!(status = response.status, code = envelope.code, message = %envelope.message, "server reported failure");
                ApiEnvelope::failure(envelope.code, envelope.message)
            }
            Err(err) => {
                warn!(status = response.status, error = %err, "failed to decode server response");
                ApiEnvelope::failure(
                    response.status,
                    format!("failed to decode server response: {err}"),
                )
            }
        }
    }

    /// Purge both persisted auth keys and notify every session-expiry
    /// listener. Fire-and-forget: a misbehaving listener cannot affect
    /// the caller or the other listeners.
    fn expire_session(&self) {
        info!("received 401; invalidating session");
        purge_session(&*self.credentials);
        self.session_expired.emit(&());
    }
}
