//! Resolution of client-supplied targets against the configured origin.

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a route path or absolute URL into the URL used as request identity.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Absolute `http(s)://` targets are parsed as-is; anything else is
///    joined onto `origin`
/// 3. Lowercase the host (done by the parser for http(s))
/// 4. Remove fragment (#...), which never reaches the network
/// 5. Keep query string intact (do not reorder)
pub fn resolve(origin: &url::Url, target: &str) -> Result<url::Url, UrlError> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        origin.join(trimmed)
    }
    .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

impl From<UrlError> for ebrain_core::Error {
    fn from(err: UrlError) -> Self {
        ebrain_core::Error::InvalidUrl(err.to_string())
    }
}
