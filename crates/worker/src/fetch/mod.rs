//! Network access for the cache controller.
//!
//! The controller only ever talks to the network through the [`Network`]
//! trait, so the interception policy can be exercised without sockets.
//! [`HttpNetwork`] is the reqwest-backed implementation used in production.
//!
//! HTTP error statuses are successful fetches and are returned as responses.
//! A [`NetworkError`] is either an unreachable origin (connect/DNS failure,
//! timeout, unreadable body), which sends the controller to its cache, or a
//! refusal to deliver: an oversized body or a request that cannot be sent.
//! See [`NetworkError::is_unreachable`].

pub mod url;

use std::time::{Duration, Instant};

use bytes::Bytes;
use ebrain_core::{AppConfig, Request, Response};
use reqwest::{Client, Method};

pub use self::url::{UrlError, resolve};

/// Errors from the network layer.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection could not be established (offline, DNS failure, refused).
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Response body could not be read.
    #[error("failed to read body: {0}")]
    Body(String),

    /// Response body exceeds the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    /// Method is not a valid HTTP token.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// Header name or value could not be sent.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl NetworkError {
    /// The origin could not be reached, so no response exists. Only these
    /// failures fall back to the cache; the rest are answered directly.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            NetworkError::Timeout | NetworkError::Connect(_) | NetworkError::Request(_) | NetworkError::Body(_)
        )
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            NetworkError::Body(err.to_string())
        } else {
            NetworkError::Request(err.to_string())
        }
    }
}

/// Issues real requests on behalf of the controller.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Send `request` and return whatever response the network produced.
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// User agent string (default: "external-brain/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "external-brain/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for HttpConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Network`].
pub struct HttpNetwork {
    http: Client,
    config: HttpConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self, NetworkError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| NetworkError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn too_large(&self, size: u64) -> Option<NetworkError> {
        (size > self.config.max_bytes as u64).then_some(NetworkError::TooLarge { size, limit: self.config.max_bytes })
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();
        let method =
            Method::from_bytes(request.method.as_bytes()).map_err(|_| NetworkError::InvalidMethod(request.method.clone()))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let outgoing = builder.build().map_err(|e| NetworkError::InvalidHeader(e.to_string()))?;

        let response = self.http.execute(outgoing).await?;

        if let Some(err) = response.content_length().and_then(|len| self.too_large(len)) {
            return Err(err);
        }

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        let bytes: Bytes = response.bytes().await.map_err(|e| NetworkError::Body(e.to_string()))?;
        if let Some(err) = self.too_large(bytes.len() as u64) {
            return Err(err);
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network response"
        );

        Ok(Response::new(status.as_u16(), status.canonical_reason().unwrap_or_default(), headers, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_default() {
        let config = HttpConfig::default();
        assert_eq!(config.user_agent, "external-brain/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(20000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_http_config_from_app_config() {
        let app = AppConfig { user_agent: "brain-test".into(), max_bytes: 1024, timeout_ms: 500, ..Default::default() };
        let config = HttpConfig::from(&app);
        assert_eq!(config.user_agent, "brain-test");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_too_large() {
        let network = HttpNetwork::new(HttpConfig { max_bytes: 10, ..Default::default() }).unwrap();
        assert!(network.too_large(10).is_none());
        assert!(matches!(network.too_large(11), Some(NetworkError::TooLarge { size: 11, limit: 10 })));
    }

    #[tokio::test]
    async fn test_invalid_method_rejected() {
        let network = HttpNetwork::new(HttpConfig::default()).unwrap();
        let request = Request::new(
            "BAD METHOD",
            ::url::Url::parse("http://localhost:5173/").unwrap(),
            ebrain_core::RequestMode::Cors,
        );
        let result = network.fetch(&request).await;
        assert!(matches!(result, Err(NetworkError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn test_invalid_header_rejected() {
        let network = HttpNetwork::new(HttpConfig::default()).unwrap();
        let request =
            Request::get(::url::Url::parse("http://localhost:5173/spoons").unwrap()).with_header("bad header", "ok");
        let err = network.fetch(&request).await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidHeader(_)));
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let network = HttpNetwork::new(HttpConfig { timeout: Duration::from_millis(500), ..Default::default() }).unwrap();
        let request = Request::get(::url::Url::parse("http://127.0.0.1:9/").unwrap());
        assert!(network.fetch(&request).await.unwrap_err().is_unreachable());
    }

    /// Answers one request with a 200 carrying `body`.
    async fn serve_once(body: &'static str) -> ::url::Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let reply = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });
        ::url::Url::parse(&format!("http://{addr}/big")).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_body_is_not_unreachable() {
        let url = serve_once("0123456789012345678901234567890123456789012345678901234567890123").await;
        let network = HttpNetwork::new(HttpConfig { max_bytes: 32, ..Default::default() }).unwrap();

        let err = network.fetch(&Request::get(url)).await.unwrap_err();
        assert!(matches!(err, NetworkError::TooLarge { size: 64, limit: 32 }));
        assert!(!err.is_unreachable());
    }

    #[tokio::test]
    async fn test_local_response() {
        let url = serve_once("spoons").await;
        let network = HttpNetwork::new(HttpConfig::default()).unwrap();

        let response = network.fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.body().as_ref(), b"spoons");
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(NetworkError::Timeout.is_unreachable());
        assert!(NetworkError::Connect("refused".into()).is_unreachable());
        assert!(NetworkError::Request("reset".into()).is_unreachable());
        assert!(NetworkError::Body("truncated".into()).is_unreachable());
        assert!(!NetworkError::TooLarge { size: 2, limit: 1 }.is_unreachable());
        assert!(!NetworkError::InvalidMethod("GE T".into()).is_unreachable());
        assert!(!NetworkError::InvalidHeader("bad header".into()).is_unreachable());
    }

    #[tokio::test]
    #[ignore = "requires network"]
    async fn test_fetch_live_page() {
        let network = HttpNetwork::new(HttpConfig::default()).unwrap();
        let request = Request::get(::url::Url::parse("https://example.com").unwrap());
        let response = network.fetch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(!response.body().is_empty());
    }
}
