//! The injected transport capability and its reqwest implementation.
//!
//! Everything above this boundary works with structured
//! [`TransportErrorKind`]s; free-text error message matching stops
//! here. The port also carries the "network type" platform capability
//! so the diagnostics engine stays platform-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use hearth_domain::{HearthError, Result};
use thiserror::Error;
use tracing::debug;

/// HTTP methods the gateway issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Method name as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Structured classification of transport-level failures.
///
/// Populated at the transport boundary from the underlying client's
/// error introspection, never by matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request timed out before any response arrived.
    Timeout,
    /// Connection could not be established (refused, DNS failure).
    ConnectionFailed,
    /// Any other failure to obtain a response.
    Other,
}

impl TransportErrorKind {
    /// Pseudo HTTP status used when no response was received.
    pub fn pseudo_status(self) -> u16 {
        match self {
            Self::Timeout => 408,
            Self::ConnectionFailed => 503,
            Self::Other => 500,
        }
    }
}

/// A transport-level failure: no HTTP response was obtained.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human-readable explanation suitable for surfacing to a user.
    pub fn user_message(&self) -> String {
        match self.kind {
            TransportErrorKind::Timeout => {
                "Request timed out; check your network connection and try again".to_string()
            }
            TransportErrorKind::ConnectionFailed => {
                "Unable to reach the server; check your network connection or try again later"
                    .to_string()
            }
            TransportErrorKind::Other => self.message.clone(),
        }
    }
}

/// One outbound request as seen by the transport port.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Credential attached verbatim as the `Authorization` header.
    pub bearer: Option<String>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            bearer: None,
            body: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A received HTTP response; any status code counts as "reachable".
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// The HTTP capability injected into the gateway, diagnostics engine,
/// and passive monitor.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request; `Err` means no response was obtained at all.
    async fn execute(&self, request: TransportRequest) -> std::result::Result<TransportResponse, TransportError>;
}

/// Platform capability reporting the current link type (wifi, cellular,
/// ethernet). Falls back to `"unknown"` where the platform offers
/// nothing.
pub trait NetworkInfo: Send + Sync {
    fn network_type(&self) -> String;
}

/// A fixed network type, for platforms that report one at startup and
/// for tests.
#[derive(Debug, Clone)]
pub struct StaticNetworkInfo(pub String);

impl NetworkInfo for StaticNetworkInfo {
    fn network_type(&self) -> String {
        self.0.clone()
    }
}

impl Default for StaticNetworkInfo {
    fn default() -> Self {
        Self("unknown".to_string())
    }
}

/// reqwest-backed [`Transport`] implementation.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with a shared connection pool.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| HearthError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        debug!(method = request.method.as_str(), url = %request.url, "sending HTTP request");

        let mut builder = self.client.request(method, &request.url).timeout(request.timeout);
        if let Some(token) = &request.bearer {
            builder = builder.header(reqwest::header::AUTHORIZATION, token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_reqwest_error)?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "received HTTP response");

        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::ConnectionFailed
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn returns_response_for_any_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let response = transport
            .execute(TransportRequest::new(HttpMethod::Get, server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.body, b"down");
    }

    #[tokio::test]
    async fn attaches_bearer_header_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("Authorization", "token-123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(HttpMethod::Get, format!("{}/secure", server.uri()))
            .bearer(Some("token-123".to_string()));

        let response = transport.execute(request).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_failed() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so the request fails with ECONNREFUSED

        let transport = HttpTransport::new().unwrap();
        let err = transport
            .execute(TransportRequest::new(HttpMethod::Get, format!("http://{addr}")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TransportErrorKind::ConnectionFailed);
        assert_eq!(err.kind().pseudo_status(), 503);
    }

    #[tokio::test]
    async fn slow_server_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let request = TransportRequest::new(HttpMethod::Get, server.uri())
            .timeout(Duration::from_millis(50));

        let err = transport.execute(request).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Timeout);
        assert_eq!(err.kind().pseudo_status(), 408);
    }
}
