// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster connection resolution: pick the first usable configuration source,
//! tune it, and prove it can reach the API server.

use crate::constants::{client as limits, env, paths};
use crate::error::{ApiError, CandidateAttempt, CandidateError, Result, TerminusError};
use crate::kubernetes::api::{KubeNamespaceApi, NamespaceApi};
use crate::kubernetes::probe::{
    check_present, enumerate_candidates, CandidateKind, ConfigSourceProvider, ConnectionCandidate,
    SystemSources,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use kube::client::ClientBuilder;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config as KConfig;
use std::path::Path;
use std::time::Duration;
use tower::limit::RateLimitLayer;
use tracing::{debug, info, instrument, warn};

/// Client-side request budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub qps: f32,
    pub burst: u32,
}

impl RateLimit {
    /// Window in which `burst` requests may be issued
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(f64::from(self.burst) / f64::from(self.qps.max(f32::EPSILON)))
    }
}

/// Builds the namespace capability from a tuned configuration
pub trait Connector: Send + Sync {
    type Api: NamespaceApi;

    fn connect(&self, config: &KConfig, rate_limit: RateLimit) -> std::result::Result<Self::Api, ApiError>;
}

/// Connector producing a rate-limited kube client
#[derive(Debug, Clone, Copy, Default)]
pub struct KubeConnector;

impl Connector for KubeConnector {
    type Api = KubeNamespaceApi;

    fn connect(&self, config: &KConfig, rate_limit: RateLimit) -> std::result::Result<KubeNamespaceApi, ApiError> {
        let client = ClientBuilder::try_from(config.clone())
            .map_err(|e| ApiError::Request(format!("Failed to create client: {}", e)))?
            .with_layer(&RateLimitLayer::new(
                u64::from(rate_limit.burst),
                rate_limit.period(),
            ))
            .build();
        Ok(KubeNamespaceApi::new(client))
    }
}

/// A verified connection to a cluster
pub struct ResolvedConnection<A = KubeNamespaceApi> {
    pub config: KConfig,
    pub api: A,
    /// Candidate that produced the configuration
    pub source: ConnectionCandidate,
    /// False only when the development fallback disabled TLS verification
    pub secure: bool,
    pub rate_limit: RateLimit,
    pub server_version: String,
}

impl<A> ResolvedConnection<A> {
    pub fn api(&self) -> &A {
        &self.api
    }
}

/// Presence and loadability of one candidate
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub candidate: ConnectionCandidate,
    pub status: std::result::Result<(), CandidateError>,
}

/// Resolve a connection from the process environment and filesystem
pub async fn resolve_connection() -> Result<ResolvedConnection> {
    Resolver::new(SystemSources).resolve().await
}

pub struct Resolver<P, C = KubeConnector> {
    sources: P,
    connector: C,
}

impl<P: ConfigSourceProvider> Resolver<P, KubeConnector> {
    pub fn new(sources: P) -> Self {
        Self::with_connector(sources, KubeConnector)
    }
}

impl<P: ConfigSourceProvider, C: Connector> Resolver<P, C> {
    pub fn with_connector(sources: P, connector: C) -> Self {
        Self { sources, connector }
    }

    pub fn development_mode(&self) -> bool {
        self.sources
            .env(env::DEV_MODE)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Check every candidate without stopping at the first usable one
    pub async fn probe(&self) -> Vec<ProbeReport> {
        let mut reports = Vec::new();
        for candidate in enumerate_candidates(&self.sources) {
            let status = self.load(&candidate).await.map(|_| ());
            reports.push(ProbeReport { candidate, status });
        }
        reports
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Result<ResolvedConnection<C::Api>> {
        let mut attempts = Vec::new();
        let mut chosen = None;

        for candidate in enumerate_candidates(&self.sources) {
            match self.load(&candidate).await {
                Ok(config) => {
                    info!("Using cluster configuration from {}", candidate);
                    chosen = Some((candidate, config));
                    break;
                }
                Err(failure) => {
                    match &failure {
                        CandidateError::Unavailable(reason) => {
                            debug!("Skipping {}: {}", candidate, reason)
                        }
                        CandidateError::Invalid(reason) => {
                            warn!("Cannot build config from {}: {}", candidate, reason)
                        }
                    }
                    attempts.push(CandidateAttempt { candidate, failure });
                }
            }
        }

        let Some((source, mut config)) = chosen else {
            return Err(TerminusError::ResolutionExhausted { attempts });
        };

        let rate_limit = tune(&source, &mut config);

        let secure_err = match self.verify(&config, rate_limit).await {
            Ok((api, server_version)) => {
                info!(
                    "Connected to {} (server {}) using {}",
                    config.cluster_url, server_version, source
                );
                return Ok(ResolvedConnection {
                    config,
                    api,
                    source,
                    secure: true,
                    rate_limit,
                    server_version,
                });
            }
            Err(e) => e,
        };

        if !self.development_mode() {
            return Err(TerminusError::ConnectivityFailed {
                origin: source.to_string(),
                reason: secure_err.to_string(),
            });
        }

        warn!(
            "Connectivity test using {} failed ({}); {} is set, retrying with TLS verification disabled",
            source,
            secure_err,
            env::DEV_MODE
        );

        let mut relaxed = config;
        relaxed.accept_invalid_certs = true;
        match self.verify(&relaxed, rate_limit).await {
            Ok((api, server_version)) => {
                warn!(
                    "Connected to {} WITHOUT TLS verification using {}",
                    relaxed.cluster_url, source
                );
                Ok(ResolvedConnection {
                    config: relaxed,
                    api,
                    source,
                    secure: false,
                    rate_limit,
                    server_version,
                })
            }
            Err(insecure_err) => Err(TerminusError::ConnectivityFailed {
                origin: source.to_string(),
                reason: format!(
                    "{}; retry without TLS verification also failed: {}",
                    secure_err, insecure_err
                ),
            }),
        }
    }

    /// Server version query followed by a single-item namespace list
    async fn verify(
        &self,
        config: &KConfig,
        rate_limit: RateLimit,
    ) -> std::result::Result<(C::Api, String), ApiError> {
        let api = self.connector.connect(config, rate_limit)?;
        let version = api.server_version().await?;
        api.list_namespaces(1).await?;
        Ok((api, version))
    }

    async fn load(&self, candidate: &ConnectionCandidate) -> std::result::Result<KConfig, CandidateError> {
        check_present(&self.sources, candidate)?;

        match (&candidate.kind, candidate.location.as_deref()) {
            (CandidateKind::InCluster, _) => {
                let host = self.required_env(env::SERVICE_HOST)?;
                let port = self.required_env(env::SERVICE_PORT)?;
                self.service_account_config(&format!("https://{}:{}", bracket_host(&host), port))
                    .await
            }
            (CandidateKind::ServiceAccount, _) => {
                let server = match (
                    self.sources.env(env::SERVICE_HOST),
                    self.sources.env(env::SERVICE_PORT),
                ) {
                    (Some(host), Some(port)) => format!("https://{}:{}", bracket_host(&host), port),
                    _ => limits::DEFAULT_IN_CLUSTER_SERVER.to_string(),
                };
                self.service_account_config(&server).await
            }
            (_, Some(path)) => self.kubeconfig_file(path).await,
            (_, None) => Err(CandidateError::Unavailable("no location".to_string())),
        }
    }

    fn required_env(&self, key: &str) -> std::result::Result<String, CandidateError> {
        self.sources
            .env(key)
            .ok_or_else(|| CandidateError::Invalid(format!("{} is not set", key)))
    }

    async fn kubeconfig_file(&self, path: &Path) -> std::result::Result<KConfig, CandidateError> {
        let raw = self.sources.read(path).map_err(|e| {
            CandidateError::Invalid(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let text = String::from_utf8(raw)
            .map_err(|e| CandidateError::Invalid(format!("Kubeconfig is not UTF-8: {}", e)))?;
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&text)
            .map_err(|e| CandidateError::Invalid(format!("Failed to parse kubeconfig: {}", e)))?;
        build_config(kubeconfig).await
    }

    /// Assemble a kubeconfig from the mounted service-account files
    async fn service_account_config(
        &self,
        server: &str,
    ) -> std::result::Result<KConfig, CandidateError> {
        let token = self
            .sources
            .read(Path::new(paths::SERVICE_ACCOUNT_TOKEN))
            .map_err(|e| CandidateError::Invalid(format!("Failed to read service account token: {}", e)))?;
        let token = String::from_utf8_lossy(&token).trim().to_string();
        if token.is_empty() {
            return Err(CandidateError::Invalid(
                "service account token is empty".to_string(),
            ));
        }

        let ca = self
            .sources
            .read(Path::new(paths::SERVICE_ACCOUNT_CA))
            .ok()
            .map(|pem| STANDARD.encode(pem));
        let namespace = self
            .sources
            .read(Path::new(paths::SERVICE_ACCOUNT_NAMESPACE))
            .ok()
            .map(|ns| String::from_utf8_lossy(&ns).trim().to_string())
            .filter(|ns| !ns.is_empty());

        let mut cluster = serde_json::json!({ "server": server });
        if let Some(ca) = ca {
            cluster["certificate-authority-data"] = ca.into();
        }
        let mut context = serde_json::json!({ "cluster": "in-cluster", "user": "service-account" });
        if let Some(namespace) = namespace {
            context["namespace"] = namespace.into();
        }

        let kubeconfig: Kubeconfig = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Config",
            "clusters": [{ "name": "in-cluster", "cluster": cluster }],
            "users": [{ "name": "service-account", "user": { "token": token } }],
            "contexts": [{ "name": "in-cluster", "context": context }],
            "current-context": "in-cluster",
        }))
        .map_err(|e| CandidateError::Invalid(format!("Failed to synthesize kubeconfig: {}", e)))?;

        build_config(kubeconfig).await
    }
}

async fn build_config(kubeconfig: Kubeconfig) -> std::result::Result<KConfig, CandidateError> {
    KConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| CandidateError::Invalid(format!("Failed to create config: {}", e)))
}

fn bracket_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

/// Apply timeouts, TLS relaxation and rate limits for the source's environment
pub fn tune(source: &ConnectionCandidate, config: &mut KConfig) -> RateLimit {
    config.read_timeout = Some(Duration::from_secs(limits::REQUEST_TIMEOUT_SECS));
    config.write_timeout = Some(Duration::from_secs(limits::REQUEST_TIMEOUT_SECS));
    config.connect_timeout = Some(Duration::from_secs(limits::CONNECT_TIMEOUT_SECS));

    if let Some(distribution) = source.distribution().filter(|d| d.is_lightweight()) {
        if config.tls_server_name.is_none() {
            debug!(
                "Relaxing TLS server name to {} for {}",
                limits::RELAXED_TLS_SERVER_NAME,
                distribution
            );
            config.tls_server_name = Some(limits::RELAXED_TLS_SERVER_NAME.to_string());
        }
    }

    if source.is_in_cluster() {
        RateLimit {
            qps: limits::IN_CLUSTER_QPS,
            burst: limits::IN_CLUSTER_BURST,
        }
    } else {
        RateLimit {
            qps: limits::DEFAULT_QPS,
            burst: limits::DEFAULT_BURST,
        }
    }
}
