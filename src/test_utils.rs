// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and configuration sources.

use crate::error::ApiError;
use crate::kubernetes::api::{NamespaceApi, PatchKind};
use crate::kubernetes::probe::ConfigSourceProvider;
use crate::kubernetes::resolver::{Connector, RateLimit};
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{Namespace, NamespaceSpec};
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::Service;

/// A request observed by `MockService`
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Request body decoded as JSON
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
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
        let query = req.uri().query().map(str::to_string);
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("namespaces", &path)));
        let requests = self.requests.clone();

        Box::pin(async move {
            let sent = req
                .into_body()
                .collect_bytes()
                .await
                .map_err(|e| Box::new(e) as tower::BoxError)?;
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                query,
                content_type,
                body: sent.to_vec(),
            });

            Ok::<_, tower::BoxError>(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a mock namespace JSON response
pub fn namespace_json(name: &str, spec_finalizers: &[&str]) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "uid": "test-uid",
            "resourceVersion": "1"
        },
        "spec": { "finalizers": spec_finalizers },
        "status": { "phase": "Terminating" }
    })
    .to_string()
}

pub fn namespace_list_json(names: &[&str]) -> String {
    let items: Vec<Value> = names
        .iter()
        .map(|n| serde_json::from_str(&namespace_json(n, &[])).unwrap())
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NamespaceList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

pub fn version_json(git_version: &str) -> String {
    serde_json::json!({
        "major": "1",
        "minor": "30",
        "gitVersion": git_version,
        "gitCommit": "0000000000000000000000000000000000000000",
        "gitTreeState": "clean",
        "buildDate": "2024-06-11T20:20:00Z",
        "goVersion": "go1.22.4",
        "compiler": "gc",
        "platform": "linux/amd64"
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

pub fn conflict_json(name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("Operation cannot be fulfilled on namespaces \"{}\": the object has been modified", name),
        "reason": "Conflict",
        "code": 409
    })
    .to_string()
}

/// Minimal token-authenticated kubeconfig pointing at `server`
pub fn kubeconfig_yaml(server: &str) -> String {
    format!(
        r#"apiVersion: v1
kind: Config
clusters:
- name: test
  cluster:
    server: {server}
users:
- name: tester
  user:
    token: test-token
contexts:
- name: test
  context:
    cluster: test
    user: tester
current-context: test
"#
    )
}

/// In-memory environment and filesystem
#[derive(Debug, Clone, Default)]
pub struct FakeSources {
    env: HashMap<String, String>,
    files: HashMap<PathBuf, Vec<u8>>,
}

impl FakeSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files
            .insert(PathBuf::from(path), contents.as_bytes().to_vec());
        self
    }
}

impl ConfigSourceProvider for FakeSources {
    fn env(&self, key: &str) -> Option<String> {
        self.env.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())
        })
    }
}

/// Calls observed by `FakeNamespaceApi`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Get,
    Delete,
    /// Plain update, with the finalizer lists as sent
    Update {
        spec_cleared: bool,
        metadata_cleared: bool,
    },
    UpdateFinalize,
    Patch,
    List,
    Version,
}

impl Call {
    pub fn kind(&self) -> CallKind {
        match self {
            Call::Get => CallKind::Get,
            Call::Delete => CallKind::Delete,
            Call::Update { .. } => CallKind::Update,
            Call::UpdateFinalize => CallKind::UpdateFinalize,
            Call::Patch => CallKind::Patch,
            Call::List => CallKind::List,
            Call::Version => CallKind::Version,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(
            self.kind(),
            CallKind::Delete | CallKind::Update | CallKind::UpdateFinalize | CallKind::Patch
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Get,
    Delete,
    Update,
    UpdateFinalize,
    Patch,
    List,
    Version,
}

struct FakeState {
    name: String,
    namespace: Option<Namespace>,
    resource_version: u64,
    calls: Vec<Call>,
    vanish_trigger: Option<(CallKind, Duration)>,
    vanish_at: Option<Instant>,
    conflicts: Vec<CallKind>,
    failures: Vec<CallKind>,
    not_found_on: Option<CallKind>,
    reachable: bool,
}

impl FakeState {
    fn refresh(&mut self) {
        if self.vanish_at.is_some_and(|at| Instant::now() >= at) {
            self.namespace = None;
        }
    }

    /// Shared preamble of every namespace call
    fn enter(&mut self, call: Call) -> Result<(), ApiError> {
        self.calls.push(call);
        self.refresh();
        let kind = call.kind();

        if self.namespace.is_none() {
            return Err(ApiError::ResourceNotFound(self.name.clone()));
        }
        if self.not_found_on == Some(kind) {
            self.namespace = None;
            return Err(ApiError::ResourceNotFound(self.name.clone()));
        }
        if let Some(pos) = self.conflicts.iter().position(|k| *k == kind) {
            self.conflicts.remove(pos);
            return Err(ApiError::ResourceConflict(self.name.clone()));
        }
        if self.failures.contains(&kind) {
            return Err(ApiError::Request(format!("injected {:?} failure", kind)));
        }
        Ok(())
    }

    /// Arm the disappearance timer after a successful call
    fn succeeded(&mut self, kind: CallKind) {
        if let Some((trigger, delay)) = self.vanish_trigger {
            if trigger == kind && self.vanish_at.is_none() {
                self.vanish_at = Some(Instant::now() + delay);
            }
        }
    }

    fn check_version(&self, namespace: &Namespace) -> Result<(), ApiError> {
        let sent = namespace.metadata.resource_version.as_deref();
        if sent != Some(self.resource_version.to_string().as_str()) {
            return Err(ApiError::ResourceConflict(self.name.clone()));
        }
        Ok(())
    }

    fn store(&mut self, namespace: &Namespace) -> Namespace {
        self.resource_version += 1;
        let mut stored = namespace.clone();
        stored.metadata.resource_version = Some(self.resource_version.to_string());
        self.namespace = Some(stored.clone());
        stored
    }

    fn current(&self) -> Namespace {
        let mut ns = self.namespace.clone().unwrap_or_default();
        ns.metadata.resource_version = Some(self.resource_version.to_string());
        ns
    }
}

/// Scripted in-memory namespace API
#[derive(Clone)]
pub struct FakeNamespaceApi {
    state: Arc<Mutex<FakeState>>,
}

fn list_is_empty(list: Option<&Vec<String>>) -> bool {
    list.map_or(true, Vec::is_empty)
}

impl FakeNamespaceApi {
    pub fn new(name: &str, spec_finalizers: &[&str], metadata_finalizers: &[&str]) -> Self {
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                finalizers: Some(to_vec(metadata_finalizers)),
                ..Default::default()
            },
            spec: Some(NamespaceSpec {
                finalizers: Some(to_vec(spec_finalizers)),
            }),
            ..Default::default()
        };
        Self::with_state(name, Some(namespace))
    }

    /// A namespace that does not exist
    pub fn absent(name: &str) -> Self {
        Self::with_state(name, None)
    }

    /// A cluster that answers namespace reads but fails version and list calls
    pub fn unreachable() -> Self {
        let api = Self::absent("unreachable");
        api.state.lock().unwrap().reachable = false;
        api
    }

    fn with_state(name: &str, namespace: Option<Namespace>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                name: name.to_string(),
                namespace,
                resource_version: 1,
                calls: Vec::new(),
                vanish_trigger: None,
                vanish_at: None,
                conflicts: Vec::new(),
                failures: Vec::new(),
                not_found_on: None,
                reachable: true,
            })),
        }
    }

    /// Namespace disappears `delay` after the first successful call of `kind`
    pub fn vanish_after(self, kind: CallKind, delay: Duration) -> Self {
        self.state.lock().unwrap().vanish_trigger = Some((kind, delay));
        self
    }

    /// Next call of `kind` fails with a conflict; may be stacked
    pub fn conflict_once(self, kind: CallKind) -> Self {
        self.state.lock().unwrap().conflicts.push(kind);
        self
    }

    /// Every call of `kind` fails outright
    pub fn fail_on(self, kind: CallKind) -> Self {
        self.state.lock().unwrap().failures.push(kind);
        self
    }

    /// The namespace is found gone by the first call of `kind`
    pub fn not_found_on(self, kind: CallKind) -> Self {
        self.state.lock().unwrap().not_found_on = Some(kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }
}

#[async_trait]
impl NamespaceApi for FakeNamespaceApi {
    async fn get_namespace(&self, _name: &str) -> Result<Namespace, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::Get)?;
        state.succeeded(CallKind::Get);
        Ok(state.current())
    }

    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::Update {
            spec_cleared: list_is_empty(
                namespace.spec.as_ref().and_then(|s| s.finalizers.as_ref()),
            ),
            metadata_cleared: list_is_empty(namespace.metadata.finalizers.as_ref()),
        })?;
        state.check_version(namespace)?;
        let stored = state.store(namespace);
        state.succeeded(CallKind::Update);
        Ok(stored)
    }

    async fn update_namespace_finalize(
        &self,
        namespace: &Namespace,
    ) -> Result<Namespace, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::UpdateFinalize)?;
        state.check_version(namespace)?;
        let stored = state.store(namespace);
        state.succeeded(CallKind::UpdateFinalize);
        Ok(stored)
    }

    async fn patch_namespace(
        &self,
        _name: &str,
        _patch: &Value,
        _kind: PatchKind,
    ) -> Result<Namespace, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::Patch)?;
        let mut patched = state.current();
        patched.metadata.finalizers = Some(Vec::new());
        patched.spec = Some(NamespaceSpec {
            finalizers: Some(Vec::new()),
        });
        let stored = state.store(&patched);
        state.succeeded(CallKind::Patch);
        Ok(stored)
    }

    async fn delete_namespace(&self, _name: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.enter(Call::Delete)?;
        state.succeeded(CallKind::Delete);
        Ok(())
    }

    async fn list_namespaces(&self, _limit: u32) -> Result<Vec<Namespace>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::List);
        if !state.reachable {
            return Err(ApiError::Request("connection refused".to_string()));
        }
        Ok(state.namespace.clone().into_iter().collect())
    }

    async fn server_version(&self) -> Result<String, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Version);
        if !state.reachable {
            return Err(ApiError::Request("connection refused".to_string()));
        }
        Ok("v1.30.0".to_string())
    }
}

/// Configuration handed to `FakeConnector::connect`
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub cluster_url: String,
    pub accept_invalid_certs: bool,
    pub tls_server_name: Option<String>,
    pub rate_limit: RateLimit,
}

/// Connector whose reachability depends on TLS verification
#[derive(Clone)]
pub struct FakeConnector {
    secure_reachable: bool,
    insecure_reachable: bool,
    attempts: Arc<Mutex<Vec<ConnectAttempt>>>,
}

impl FakeConnector {
    fn with(secure_reachable: bool, insecure_reachable: bool) -> Self {
        Self {
            secure_reachable,
            insecure_reachable,
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn reachable() -> Self {
        Self::with(true, true)
    }

    /// Only reachable once certificate verification is disabled
    pub fn insecure_only() -> Self {
        Self::with(false, true)
    }

    pub fn unreachable() -> Self {
        Self::with(false, false)
    }

    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Connector for FakeConnector {
    type Api = FakeNamespaceApi;

    fn connect(
        &self,
        config: &kube::Config,
        rate_limit: RateLimit,
    ) -> Result<FakeNamespaceApi, ApiError> {
        self.attempts.lock().unwrap().push(ConnectAttempt {
            cluster_url: config.cluster_url.to_string(),
            accept_invalid_certs: config.accept_invalid_certs,
            tls_server_name: config.tls_server_name.clone(),
            rate_limit,
        });

        let reachable = if config.accept_invalid_certs {
            self.insecure_reachable
        } else {
            self.secure_reachable
        };
        if reachable {
            Ok(FakeNamespaceApi::new("default", &[], &[]))
        } else {
            Ok(FakeNamespaceApi::unreachable())
        }
    }
}
