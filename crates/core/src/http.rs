//! Request and response types that flow through the cache controller.
//!
//! A live [`Response`] is deliberately not `Clone`: its body is handed to
//! exactly one consumer. When both the caller and the cache need the same
//! body, [`Response::tee`] splits it into the returned response and an owned
//! [`ResponseSnapshot`] for storage.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::hash::compute_request_key;

/// Body of the synthetic response returned when nothing can serve a request.
pub const UNAVAILABLE_BODY: &str = "Offline - resource not cached";

/// RFC 9110 token: the grammar of methods and header names.
pub fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Check a header before it is sent. Names must be tokens; values may not
/// contain control characters other than tab.
pub fn validate_header(name: &str, value: &str) -> Result<(), Error> {
    if !is_token(name) {
        return Err(Error::InvalidInput(format!("invalid header name: {name:?}")));
    }
    if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
        return Err(Error::InvalidInput(format!("invalid value for header {name}")));
    }
    Ok(())
}

/// How the client issued a request.
///
/// Only `Navigate` changes interception behaviour: an offline navigation
/// miss is answered with the precached offline page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Full-page navigation.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
        };
        f.write_str(s)
    }
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unsupported request mode: {other}"))),
        }
    }
}

/// The key a cached response is stored under: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: String,
    pub url: String,
}

impl RequestIdentity {
    /// Identity of a GET request for `url`.
    pub fn get(url: &Url) -> Self {
        Self { method: "GET".into(), url: url.to_string() }
    }

    /// Storage key for this identity.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }
}

/// An outgoing request intercepted by the controller.
#[derive(Debug, Clone)]
pub struct Request {
    /// Uppercase HTTP method.
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a request; the method is normalized to uppercase.
    pub fn new(method: &str, url: Url, mode: RequestMode) -> Self {
        Self { method: method.trim().to_ascii_uppercase(), url, mode, headers: Vec::new(), body: None }
    }

    /// A plain GET request, as issued for precaching.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Cors)
    }

    /// A GET full-page navigation.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only GET requests ever touch the cache.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity { method: self.method.clone(), url: self.url.to_string() }
    }
}

/// A live response. The body can be consumed once; use [`Response::tee`]
/// to keep a copy for the cache.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    body: Bytes,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: status_text.into(), headers, body: body.into() }
    }

    /// Plain-text response produced by the controller itself.
    pub fn synthetic(status: u16, status_text: &str, body: impl Into<Bytes>) -> Self {
        Self::new(status, status_text, vec![("content-type".into(), "text/plain; charset=utf-8".into())], body)
    }

    /// Synthetic `503 Service Unavailable` for requests nothing can serve.
    pub fn service_unavailable() -> Self {
        Self::synthetic(503, "Service Unavailable", Bytes::from_static(UNAVAILABLE_BODY.as_bytes()))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Split into the response handed back to the caller and a
    /// byte-for-byte snapshot for the cache.
    pub fn tee(self) -> (Response, ResponseSnapshot) {
        let snapshot = ResponseSnapshot {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: self.body.to_vec(),
        };
        (self, snapshot)
    }

    /// Consume the response into a snapshot without keeping a live copy.
    pub fn into_snapshot(self) -> ResponseSnapshot {
        ResponseSnapshot { status: self.status, status_text: self.status_text, headers: self.headers, body: self.body.into() }
    }
}

/// Immutable copy of a response as stored in a cache generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl From<ResponseSnapshot> for Response {
    fn from(snapshot: ResponseSnapshot) -> Self {
        Response::new(snapshot.status, snapshot.status_text, snapshot.headers, snapshot.body)
    }
}
