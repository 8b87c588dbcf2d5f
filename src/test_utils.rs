// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mock HTTP service for kube Client tests, an in-memory
//! cluster for manager-level flows and fixture builders for the backing
//! resources.

use http::{Request, Response};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

use crate::config::Config;
use crate::constants::{labels, resources};

/// Runtime config pointing at the mock cluster namespace
pub fn platform_config() -> Config {
    Config {
        namespace: "platform".to_string(),
        insecure: true,
        hostname: "quartermaster-0".to_string(),
    }
}

/// A mock HTTP service that returns predefined responses based on request
/// method and path.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.insert("GET", path, status, body);
        self
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.insert("POST", path, status, body);
        self
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.insert("PUT", path, status, body);
        self
    }

    fn insert(&self, method: &str, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(
                (method.to_string(), path.to_string()),
                (status, body.to_string()),
            );
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Prefix match for paths like /api/v1/namespaces/foo
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let response = self.find_response(&method, &path);

        Box::pin(async move {
            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// An in-memory namespace of ConfigMaps and Secrets behind a kube Client.
/// Serves the list requests reflectors issue and applies writes, so
/// read-after-write flows can be driven end to end. Watch upgrades are
/// refused; freshness comes from re-listing on resync.
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

struct ClusterState {
    version: u64,
    config_maps: BTreeMap<String, Value>,
    secrets: BTreeMap<String, Value>,
    conflict_next_write: bool,
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                version: 0,
                config_maps: BTreeMap::new(),
                secrets: BTreeMap::new(),
                conflict_next_write: false,
            })),
        }
    }

    /// Seed a ConfigMap, as the install manifests would
    pub fn with_config_map(self, cm: &ConfigMap) -> Self {
        self.state
            .lock()
            .unwrap()
            .put("configmaps", serde_json::to_value(cm).unwrap());
        self
    }

    /// Seed a Secret, as the install manifests would
    pub fn with_secret(self, secret: &Secret) -> Self {
        self.state
            .lock()
            .unwrap()
            .put("secrets", serde_json::to_value(secret).unwrap());
        self
    }

    /// Fail the next write with an optimistic-concurrency conflict
    pub fn conflict_on_next_write(&self) {
        self.state.lock().unwrap().conflict_next_write = true;
    }

    /// Build a kube Client backed by this cluster
    pub fn into_client(self) -> Client {
        Client::new(self, "platform")
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterState {
    fn collection(&mut self, kind: &str) -> &mut BTreeMap<String, Value> {
        if kind == "secrets" {
            &mut self.secrets
        } else {
            &mut self.config_maps
        }
    }

    /// Store an object, stamping a fresh resourceVersion and the namespace
    fn put(&mut self, kind: &str, mut value: Value) -> Value {
        self.version += 1;
        value["metadata"]["resourceVersion"] = json!(self.version.to_string());
        if value["metadata"]["namespace"].is_null() {
            value["metadata"]["namespace"] = json!("platform");
        }
        let name = value["metadata"]["name"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.collection(kind).insert(name, value.clone());
        value
    }

    fn list(&mut self, kind: &str, query: &str) -> Value {
        // a labelSelector only ever comes from legacy-secret discovery
        let by_label = query.contains("labelSelector");
        let items: Vec<Value> = self
            .collection(kind)
            .values()
            .filter(|v| {
                !by_label
                    || v["metadata"]["labels"][labels::SECRET_TYPE]
                        == json!(labels::SECRET_TYPE_REPOSITORY)
            })
            .cloned()
            .collect();
        json!({
            "apiVersion": "v1",
            "kind": if kind == "secrets" { "SecretList" } else { "ConfigMapList" },
            "metadata": { "resourceVersion": self.version.to_string() },
            "items": items,
        })
    }
}

fn route(
    state: &Mutex<ClusterState>,
    method: &str,
    path: &str,
    query: &str,
    body: &[u8],
) -> (u16, String) {
    let mut state = state.lock().unwrap();
    let segments: Vec<&str> = path
        .trim_start_matches("/api/v1/namespaces/")
        .split('/')
        .collect();
    let (kind, name) = match segments.as_slice() {
        [_, kind] => (*kind, None),
        [_, kind, name] => (*kind, Some(*name)),
        _ => return (404, not_found_json("path", path)),
    };

    match (method, name) {
        ("GET", None) if query.contains("watch=true") => (
            500,
            json!({
                "kind": "Status",
                "apiVersion": "v1",
                "status": "Failure",
                "message": "watch not supported",
                "code": 500
            })
            .to_string(),
        ),
        ("GET", None) => (200, state.list(kind, query).to_string()),
        ("GET", Some(name)) => match state.collection(kind).get(name) {
            Some(value) => (200, value.to_string()),
            None => (404, not_found_json(kind, name)),
        },
        ("PUT", Some(name)) => {
            if state.conflict_next_write {
                state.conflict_next_write = false;
                return (409, conflict_json(kind, name));
            }
            match serde_json::from_slice::<Value>(body) {
                Ok(value) => (200, state.put(kind, value).to_string()),
                Err(_) => (400, not_found_json(kind, name)),
            }
        }
        ("POST", None) => {
            if state.conflict_next_write {
                state.conflict_next_write = false;
                return (409, conflict_json(kind, "new"));
            }
            match serde_json::from_slice::<Value>(body) {
                Ok(value) => (201, state.put(kind, value).to_string()),
                Err(_) => (400, not_found_json(kind, "new")),
            }
        }
        _ => (404, not_found_json(kind, name.unwrap_or(""))),
    }
}

impl Service<Request<Body>> for MockCluster {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let method = req.method().to_string();
            let path = req.uri().path().to_string();
            let query = req.uri().query().unwrap_or_default().to_string();
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|e| -> tower::BoxError {
                    format!("failed to read request body: {}", e).into()
                })?
                .to_bytes();

            let (status, payload) = route(&state, &method, &path, &query, &bytes);
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(payload.into_bytes()))
                .unwrap())
        })
    }
}

/// Build the settings ConfigMap fixture with the given data entries
pub fn make_config_map(entries: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(resources::CONFIG_MAP_NAME.to_string()),
            ..Default::default()
        },
        data: Some(string_map(entries)),
        ..Default::default()
    }
}

/// Build the settings Secret fixture with the given data entries
pub fn make_secret(entries: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(resources::SECRET_NAME.to_string()),
            ..Default::default()
        },
        data: Some(byte_map(entries)),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Build a legacy repository-credential secret carrying the migration label
pub fn make_labeled_secret(name: &str, entries: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                labels::SECRET_TYPE.to_string(),
                labels::SECRET_TYPE_REPOSITORY.to_string(),
            )])),
            ..Default::default()
        },
        data: Some(byte_map(entries)),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

fn string_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn byte_map(entries: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
        .collect()
}

/// Create a mock ConfigMap JSON response
pub fn config_map_json(name: &str, entries: &[(&str, &str)]) -> String {
    let data: serde_json::Map<String, serde_json::Value> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": name,
            "namespace": "platform",
            "resourceVersion": "1",
            "uid": "test-uid"
        },
        "data": data
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a 409 optimistic-concurrency conflict response
pub fn conflict_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("Operation cannot be fulfilled on {} \"{}\": the object has been modified", resource, name),
        "reason": "Conflict",
        "code": 409
    })
    .to_string()
}
