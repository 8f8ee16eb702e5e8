// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Environment variables consulted while resolving a cluster connection
pub mod env {
    /// Explicit kubeconfig path list (colon separated)
    pub const KUBECONFIG: &str = "KUBECONFIG";
    /// When truthy, allows a single retry with TLS verification disabled
    pub const DEV_MODE: &str = "DEV_MODE";
    pub const SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
    pub const SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";
    pub const HOME: &str = "HOME";
}

/// Well-known filesystem locations
pub mod paths {
    pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
    pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
    pub const SERVICE_ACCOUNT_NAMESPACE: &str =
        "/var/run/secrets/kubernetes.io/serviceaccount/namespace";
    /// User-level kubeconfig locations, relative to the home directory
    pub const USER_CONFIGS: &[&str] = &[".kube/config", ".kube/kubeconfig"];
}

/// Client tuning applied to every resolved connection
pub mod client {
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_QPS: f32 = 20.0;
    pub const DEFAULT_BURST: u32 = 30;
    /// In-cluster network paths get a higher client-side budget
    pub const IN_CLUSTER_QPS: f32 = 50.0;
    pub const IN_CLUSTER_BURST: u32 = 100;
    /// Name present in the serving certificate of the lightweight distributions
    pub const RELAXED_TLS_SERVER_NAME: &str = "kubernetes.default";
    /// API server address used when the service env vars are missing
    pub const DEFAULT_IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
}

/// Namespace termination timing
pub mod termination {
    pub const POLL_INTERVAL_SECS: u64 = 1;
    pub const GRACEFUL_WAIT_SECS: u64 = 10;
    pub const SPEC_FINALIZER_WAIT_SECS: u64 = 15;
    pub const METADATA_FINALIZER_WAIT_SECS: u64 = 15;
    pub const FINALIZE_SUBRESOURCE_WAIT_SECS: u64 = 10;
    pub const RAW_PATCH_WAIT_SECS: u64 = 10;
}
