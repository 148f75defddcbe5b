//! Network-first fetch interception.
//!
//! 1. Always try the network first.
//! 2. A response of any status is returned as-is; a `200` to a GET is also
//!    written to the current generation in a spawned task.
//! 3. Only when the origin is unreachable: GETs are looked up in the cache,
//!    offline navigations fall back to the precached offline page, and
//!    everything else gets a synthetic `503`.
//! 4. When the network refuses to deliver (oversized body, unsendable
//!    request) the caller gets a synthetic `502`/`400` and the cache is not
//!    consulted.
//!
//! Mutating requests never read or write the cache.

use ebrain_core::{Request, RequestIdentity, Response, ResponseSnapshot};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::Controller;
use crate::fetch::{Network, NetworkError};

/// Where the response handed to the client came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Live network response
    Network,
    /// Cached snapshot served because the network failed
    Cache,
    /// Precached offline page served for a navigation
    OfflineFallback,
    /// Synthetic 503; nothing could serve the request
    Unavailable,
    /// Synthetic error; the network refused to deliver a response
    Rejected,
}

/// Result of intercepting one request.
#[derive(Debug)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    /// Background cache write started for this response, if any. Dropping
    /// the handle does not cancel the write.
    pub cache_write: Option<JoinHandle<()>>,
}

impl FetchOutcome {
    pub fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, cache_write: None }
    }

    pub fn unavailable() -> Self {
        Self::new(Response::service_unavailable(), ResponseSource::Unavailable)
    }

    /// Answer for a network error that is not an unreachable origin.
    pub fn rejected(err: &NetworkError) -> Self {
        let response = match err {
            NetworkError::InvalidMethod(_) | NetworkError::InvalidHeader(_) => {
                Response::synthetic(400, "Bad Request", err.to_string())
            }
            _ => Response::synthetic(502, "Bad Gateway", err.to_string()),
        };
        Self::new(response, ResponseSource::Rejected)
    }

    /// Wait for the background cache write, if one was started.
    pub async fn settle(&mut self) {
        if let Some(write) = self.cache_write.take()
            && let Err(err) = write.await
        {
            tracing::warn!(error = %err, "cache write task did not complete");
        }
    }
}

impl Controller {
    /// Serve `request` network-first.
    ///
    /// Never fails: an unreachable origin falls through to the cache, the
    /// offline page or a synthetic 503.
    pub async fn handle_fetch(&self, request: Request) -> FetchOutcome {
        match self.network.fetch(&request).await {
            Ok(response) if request.is_get() && response.status == 200 => {
                let (response, snapshot) = response.tee();
                let write = self.spawn_cache_write(request.identity(), snapshot);
                FetchOutcome { response, source: ResponseSource::Network, cache_write: Some(write) }
            }
            Ok(response) => FetchOutcome::new(response, ResponseSource::Network),
            Err(err) if err.is_unreachable() => {
                tracing::debug!(method = %request.method, url = %request.url, error = %err, "network failed");
                self.fallback(&request).await
            }
            Err(err) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %err, "network refused request");
                FetchOutcome::rejected(&err)
            }
        }
    }

    async fn fallback(&self, request: &Request) -> FetchOutcome {
        if !request.is_get() {
            return FetchOutcome::unavailable();
        }

        if let Some(snapshot) = self.lookup(&request.identity()).await {
            tracing::debug!(url = %request.url, "served from cache");
            return FetchOutcome::new(snapshot.into(), ResponseSource::Cache);
        }

        if request.is_navigation() {
            match self.settings.offline_url() {
                Ok(offline_url) => {
                    if let Some(snapshot) = self.lookup(&RequestIdentity::get(&offline_url)).await {
                        tracing::debug!(url = %request.url, "served offline page");
                        return FetchOutcome::new(snapshot.into(), ResponseSource::OfflineFallback);
                    }
                    tracing::warn!(
                        version = %self.version(),
                        offline_route = %self.settings.offline_route,
                        "offline page missing from cache"
                    );
                }
                Err(err) => tracing::warn!(error = %err, "offline route does not resolve"),
            }
        }

        FetchOutcome::unavailable()
    }

    /// Cache read that treats a storage error as a miss.
    async fn lookup(&self, identity: &RequestIdentity) -> Option<ResponseSnapshot> {
        match self.cache.match_entry(self.version(), identity).await {
            Ok(hit) => hit,
            Err(err) => {
                tracing::warn!(url = %identity.url, error = %err, "cache read failed");
                None
            }
        }
    }

    fn spawn_cache_write(&self, identity: RequestIdentity, snapshot: ResponseSnapshot) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let generation = self.version().to_string();
        tokio::spawn(async move {
            match cache.put_entry(&generation, &identity, &snapshot).await {
                Ok(()) => tracing::debug!(%generation, url = %identity.url, "cached response"),
                Err(err) => tracing::warn!(%generation, url = %identity.url, error = %err, "cache write failed"),
            }
        })
    }
}

/// Serve a request with no controller in charge: straight to the network,
/// with a synthetic 503 when it fails.
pub async fn passthrough(network: &dyn Network, request: &Request) -> FetchOutcome {
    match network.fetch(request).await {
        Ok(response) => FetchOutcome::new(response, ResponseSource::Network),
        Err(err) if err.is_unreachable() => {
            tracing::debug!(method = %request.method, url = %request.url, error = %err, "uncontrolled fetch failed");
            FetchOutcome::unavailable()
        }
        Err(err) => FetchOutcome::rejected(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LifecycleState;
    use crate::testing::{ScriptedNetwork, settings, url};
    use ebrain_core::{CacheDb, RequestMode};
    use ebrain_core::http::UNAVAILABLE_BODY;
    use std::sync::Arc;

    async fn active(cache: &CacheDb, network: &Arc<ScriptedNetwork>, version: &str) -> Controller {
        let controller = Controller::new(settings(version), cache.clone(), network.clone());
        controller.install().await.unwrap();
        controller.activate().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Active);
        controller
    }

    async fn setup() -> (CacheDb, Arc<ScriptedNetwork>, Controller) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::with_app_routes();
        let controller = active(&cache, &network, "external-brain-v1").await;
        (cache, network, controller)
    }

    #[tokio::test]
    async fn test_online_get_is_cached_and_replayed_offline() {
        let (_cache, network, controller) = setup().await;
        network.set_route("GET", "/spoons", 200, b"<h1>Spoon Drawer</h1> fresh");

        let mut online = controller.handle_fetch(Request::get(url("/spoons"))).await;
        assert_eq!(online.source, ResponseSource::Network);
        online.settle().await;
        let online_body = online.response.into_body();

        network.set_online(false);
        let offline = controller.handle_fetch(Request::get(url("/spoons"))).await;

        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.status, 200);
        assert_eq!(offline.response.into_body(), online_body);
    }

    #[tokio::test]
    async fn test_api_get_replayed_byte_identical() {
        let (cache, network, controller) = setup().await;

        let mut online = controller
            .handle_fetch(Request::get(url("/api/spoons/latest")))
            .await;
        online.settle().await;
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 5);

        network.set_online(false);
        let offline = controller
            .handle_fetch(Request::get(url("/api/spoons/latest")))
            .await;
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.header("content-type"), online.response.header("content-type"));
        assert_eq!(offline.response.into_body(), online.response.into_body());
    }

    #[tokio::test]
    async fn test_non_200_not_cached_but_returned() {
        let (cache, network, controller) = setup().await;
        network.set_route("GET", "/feed/new", 201, b"created");

        let outcome = controller.handle_fetch(Request::get(url("/feed/new"))).await;
        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(outcome.response.status, 201);
        assert!(outcome.cache_write.is_none());

        let missing = controller.handle_fetch(Request::get(url("/missing"))).await;
        assert_eq!(missing.response.status, 404);
        assert!(missing.cache_write.is_none());
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let (cache, network, controller) = setup().await;
        network.set_route("POST", "/api/spoons/log", 200, br#"{"success":true,"xpEarned":10}"#);

        let request = Request::new("POST", url("/api/spoons/log"), RequestMode::Cors).with_body(r#"{"physical":3}"#);
        let outcome = controller.handle_fetch(request).await;

        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(outcome.cache_write.is_none());
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_post_offline_gets_503() {
        let (_cache, network, controller) = setup().await;
        network.set_online(false);

        let request = Request::new("POST", url("/api/spoons/log"), RequestMode::Cors).with_body(r#"{"physical":3}"#);
        let outcome = controller.handle_fetch(request).await;

        assert_eq!(outcome.source, ResponseSource::Unavailable);
        assert_eq!(outcome.response.status, 503);
        assert_eq!(outcome.response.status_text, "Service Unavailable");
        assert_eq!(outcome.response.body().as_ref(), UNAVAILABLE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_post_offline_navigation_skips_offline_page() {
        let (_cache, network, controller) = setup().await;
        network.set_online(false);

        let request = Request::new("POST", url("/spoons"), RequestMode::Navigate);
        let outcome = controller.handle_fetch(request).await;
        assert_eq!(outcome.source, ResponseSource::Unavailable);
    }

    #[tokio::test]
    async fn test_mutating_methods_never_touch_cache() {
        let (cache, network, controller) = setup().await;

        for method in ["POST", "PUT", "PATCH", "DELETE"] {
            network.set_route(method, "/spoons", 200, b"{\"success\":true}");
            let outcome = controller
                .handle_fetch(Request::new(method, url("/spoons"), RequestMode::Cors))
                .await;
            assert_eq!(outcome.source, ResponseSource::Network, "{method}");
            assert!(outcome.cache_write.is_none(), "{method}");
        }
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 4);

        // GET /spoons is cached, yet offline writes to the same URL are not
        // answered from it.
        network.set_online(false);
        for method in ["POST", "PUT", "PATCH", "DELETE"] {
            let outcome = controller
                .handle_fetch(Request::new(method, url("/spoons"), RequestMode::Cors))
                .await;
            assert_eq!(outcome.source, ResponseSource::Unavailable, "{method}");
            assert_eq!(outcome.response.status, 503, "{method}");
        }
    }

    #[tokio::test]
    async fn test_oversized_response_skips_fallback() {
        let (cache, network, controller) = setup().await;
        let too_large = || NetworkError::TooLarge { size: 64, limit: 32 };
        network.fail_route("GET", "/spoons", too_large);
        network.fail_route("GET", "/big", too_large);

        let cached_page = controller.handle_fetch(Request::navigate(url("/spoons"))).await;
        assert_eq!(cached_page.source, ResponseSource::Rejected);
        assert_eq!(cached_page.response.status, 502);
        assert_ne!(cached_page.response.body().as_ref(), b"<h1>Spoon Drawer</h1>");
        assert!(cached_page.cache_write.is_none());

        let uncached = controller.handle_fetch(Request::navigate(url("/big"))).await;
        assert_eq!(uncached.source, ResponseSource::Rejected);
        assert_eq!(uncached.response.status_text, "Bad Gateway");
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_unsendable_request_skips_fallback() {
        let (_cache, network, controller) = setup().await;
        network.fail_route("GET", "/spoons", || NetworkError::InvalidHeader("bad header".into()));

        let outcome = controller
            .handle_fetch(Request::get(url("/spoons")).with_header("bad header", "ok"))
            .await;
        assert_eq!(outcome.source, ResponseSource::Rejected);
        assert_eq!(outcome.response.status, 400);
    }

    #[tokio::test]
    async fn test_cache_read_error_is_a_miss() {
        let (cache, network, controller) = setup().await;
        network.set_online(false);
        cache
            .execute_batch("ALTER TABLE entries RENAME TO entries_moved")
            .await
            .unwrap();

        let page = controller.handle_fetch(Request::navigate(url("/spoons"))).await;
        assert_eq!(page.source, ResponseSource::Unavailable);
        assert_eq!(page.response.status, 503);

        cache
            .execute_batch("ALTER TABLE entries_moved RENAME TO entries")
            .await
            .unwrap();
        let page = controller.handle_fetch(Request::navigate(url("/spoons"))).await;
        assert_eq!(page.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_offline_navigation_miss_serves_offline_page() {
        let (_cache, network, controller) = setup().await;
        network.set_online(false);

        let outcome = controller
            .handle_fetch(Request::navigate(url("/unknown-resource")))
            .await;

        assert_eq!(outcome.source, ResponseSource::OfflineFallback);
        assert_eq!(outcome.response.status, 200);
        assert_eq!(outcome.response.body().as_ref(), b"<h1>You are offline</h1>");
    }

    #[tokio::test]
    async fn test_offline_navigation_hit_prefers_cached_page() {
        let (_cache, network, controller) = setup().await;
        network.set_online(false);

        let outcome = controller.handle_fetch(Request::navigate(url("/spoons"))).await;
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body().as_ref(), b"<h1>Spoon Drawer</h1>");
    }

    #[tokio::test]
    async fn test_offline_subresource_miss_gets_503() {
        let (_cache, network, controller) = setup().await;
        network.set_online(false);

        let outcome = controller
            .handle_fetch(Request::get(url("/unknown-resource.js")))
            .await;
        assert_eq!(outcome.source, ResponseSource::Unavailable);
        assert_eq!(outcome.response.status, 503);
    }

    #[tokio::test]
    async fn test_network_always_tried_first() {
        let (_cache, network, controller) = setup().await;
        network.set_route("GET", "/spoons", 200, b"updated");

        let outcome = controller.handle_fetch(Request::get(url("/spoons"))).await;
        assert_eq!(outcome.response.body().as_ref(), b"updated");
        assert_eq!(network.calls().last().unwrap(), &("GET".to_string(), url("/spoons").to_string()));
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_response() {
        let (cache, _network, controller) = setup().await;
        cache.delete_generation("external-brain-v1").await.unwrap();

        let mut outcome = controller.handle_fetch(Request::get(url("/feed"))).await;
        outcome.settle().await;

        assert_eq!(outcome.source, ResponseSource::Network);
        assert_eq!(outcome.response.status, 200);
        assert!(!cache.has_generation("external-brain-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_new_version_never_serves_previous_generation() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::with_app_routes();

        let v1 = active(&cache, &network, "external-brain-v1").await;

        network.set_route("GET", "/spoons", 200, b"deployed with v2");
        let v2 = Controller::new(settings("external-brain-v2"), cache.clone(), network.clone());
        v2.install().await.unwrap();

        // v1 keeps serving during the overlap and caches newer data.
        network.set_route("GET", "/spoons", 200, b"newer, cached by v1");
        network.set_route("GET", "/api/spoons/latest", 200, b"v1 only");
        for path in ["/spoons", "/api/spoons/latest"] {
            let mut outcome = v1.handle_fetch(Request::get(url(path))).await;
            outcome.settle().await;
        }
        assert_eq!(cache.entry_count("external-brain-v1").await.unwrap(), 5);

        v2.activate().await.unwrap();
        network.set_online(false);

        let outcome = v2.handle_fetch(Request::get(url("/spoons"))).await;
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body().as_ref(), b"deployed with v2");

        let outcome = v2.handle_fetch(Request::get(url("/api/spoons/latest"))).await;
        assert_eq!(outcome.source, ResponseSource::Unavailable);
        assert_eq!(cache.generation_names().await.unwrap(), vec!["external-brain-v2".to_string()]);

        let old = v1.handle_fetch(Request::get(url("/spoons"))).await;
        assert_eq!(old.source, ResponseSource::Unavailable);
    }

    #[tokio::test]
    async fn test_passthrough() {
        let network = ScriptedNetwork::with_app_routes();
        let outcome = passthrough(network.as_ref(), &Request::get(url("/feed"))).await;
        assert_eq!(outcome.source, ResponseSource::Network);

        network.fail_route("GET", "/big", || NetworkError::TooLarge { size: 64, limit: 32 });
        let outcome = passthrough(network.as_ref(), &Request::get(url("/big"))).await;
        assert_eq!(outcome.source, ResponseSource::Rejected);

        network.set_online(false);
        let outcome = passthrough(network.as_ref(), &Request::get(url("/feed"))).await;
        assert_eq!(outcome.source, ResponseSource::Unavailable);
    }
}
