//! Scripted network and fixtures shared by the worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ebrain_core::{Request, Response};
use url::Url;

use crate::controller::WorkerSettings;
use crate::fetch::{Network, NetworkError};

pub const ORIGIN: &str = "http://localhost:5173";

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn settings(version: &str) -> WorkerSettings {
    WorkerSettings {
        version: version.to_string(),
        origin: Url::parse(ORIGIN).unwrap(),
        precache_routes: vec!["/".into(), "/spoons".into(), "/feed".into(), "/offline".into()],
        offline_route: "/offline".into(),
        skip_waiting_on_install: true,
    }
}

#[derive(Clone)]
enum Route {
    Respond(u16, Vec<u8>, &'static str),
    Fail(fn() -> NetworkError),
}

/// In-memory network keyed by `(method, url)`. Unknown routes answer 404;
/// going offline makes every fetch fail with a connect error.
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<(String, String), Route>>,
    online: AtomicBool,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { routes: Mutex::new(HashMap::new()), online: AtomicBool::new(true), calls: Mutex::new(Vec::new()) })
    }

    /// The app shell pages plus one JSON API route.
    pub fn with_app_routes() -> Arc<Self> {
        let network = Self::new();
        network.set_route("GET", "/", 200, b"<h1>External Brain</h1>");
        network.set_route("GET", "/spoons", 200, b"<h1>Spoon Drawer</h1>");
        network.set_route("GET", "/feed", 200, b"<h1>Feed</h1>");
        network.set_route("GET", "/offline", 200, b"<h1>You are offline</h1>");
        network.insert(
            "GET",
            "/api/spoons/latest",
            Route::Respond(200, br#"{"physical":3,"mental":2,"emotional":4}"#.to_vec(), "application/json"),
        );
        network
    }

    pub fn set_route(&self, method: &str, path: &str, status: u16, body: &[u8]) {
        self.insert(method, path, Route::Respond(status, body.to_vec(), "text/html; charset=utf-8"));
    }

    /// Make `(method, path)` fail with `failure` while online.
    pub fn fail_route(&self, method: &str, path: &str, failure: fn() -> NetworkError) {
        self.insert(method, path, Route::Fail(failure));
    }

    pub fn remove_route(&self, method: &str, path: &str) {
        self.routes
            .lock()
            .unwrap()
            .remove(&(method.to_string(), url(path).to_string()));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Every `(method, url)` fetched so far, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn insert(&self, method: &str, path: &str, route: Route) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), url(path).to_string()), route);
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let key = (request.method.clone(), request.url.to_string());
        self.calls.lock().unwrap().push(key.clone());

        if !self.online.load(Ordering::SeqCst) {
            return Err(NetworkError::Connect("network is offline".into()));
        }

        let route = self.routes.lock().unwrap().get(&key).cloned();
        match route {
            Some(Route::Respond(status, body, content_type)) => {
                Ok(Response::new(status, reason(status), vec![("content-type".into(), content_type.into())], body))
            }
            Some(Route::Fail(failure)) => Err(failure()),
            None => Ok(Response::new(404, "Not Found", vec![("content-type".into(), "text/plain".into())], "not found")),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}
