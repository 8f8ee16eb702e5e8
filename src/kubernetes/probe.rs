// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Enumeration and existence checks for the places a cluster configuration can come from

use crate::constants::{env, paths};
use crate::error::CandidateError;
use std::fmt;
use std::path::{Path, PathBuf};

/// Read-only access to the process environment and filesystem.
pub trait ConfigSourceProvider: Send + Sync {
    /// Value of an environment variable, `None` when unset or empty
    fn env(&self, key: &str) -> Option<String>;

    /// Whether a regular file exists at `path`
    fn exists(&self, path: &Path) -> bool;

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    fn home_dir(&self) -> Option<PathBuf> {
        self.env(env::HOME).map(PathBuf::from)
    }
}

/// Provider backed by the real process environment and filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSources;

impl ConfigSourceProvider for SystemSources {
    fn env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Kubernetes distributions that install a kubeconfig at a fixed location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    K3s,
    Rke2,
    MicroK8s,
    K0s,
    Kubeadm,
}

impl Distribution {
    pub const ALL: [Distribution; 5] = [
        Distribution::K3s,
        Distribution::Rke2,
        Distribution::MicroK8s,
        Distribution::K0s,
        Distribution::Kubeadm,
    ];

    pub fn kubeconfig_path(&self) -> &'static str {
        match self {
            Distribution::K3s => "/etc/rancher/k3s/k3s.yaml",
            Distribution::Rke2 => "/etc/rancher/rke2/rke2.yaml",
            Distribution::MicroK8s => "/var/snap/microk8s/current/credentials/client.config",
            Distribution::K0s => "/var/lib/k0s/pki/admin.conf",
            Distribution::Kubeadm => "/etc/kubernetes/admin.conf",
        }
    }

    /// Lightweight/edge distributions whose serving certificates rarely match the
    /// address written into their kubeconfig
    pub fn is_lightweight(&self) -> bool {
        matches!(
            self,
            Distribution::K3s | Distribution::K0s | Distribution::MicroK8s
        )
    }

    /// Identify a distribution from a kubeconfig location
    pub fn from_path(path: &Path) -> Option<Distribution> {
        Self::ALL
            .into_iter()
            .find(|d| Path::new(d.kubeconfig_path()) == path)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Distribution::K3s => "k3s",
            Distribution::Rke2 => "rke2",
            Distribution::MicroK8s => "microk8s",
            Distribution::K0s => "k0s",
            Distribution::Kubeadm => "kubeadm",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// Running as a workload inside the target cluster
    InCluster,
    /// Path taken from the KUBECONFIG environment variable
    EnvPath,
    Distribution(Distribution),
    /// Kubeconfig under the user's home directory
    UserPath,
    /// Configuration synthesized from the service-account files
    ServiceAccount,
}

/// One possible way to reach a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCandidate {
    pub kind: CandidateKind,
    pub location: Option<PathBuf>,
    /// Position in the enumeration order, lower wins
    pub priority: usize,
}

impl ConnectionCandidate {
    pub fn is_in_cluster(&self) -> bool {
        matches!(
            self.kind,
            CandidateKind::InCluster | CandidateKind::ServiceAccount
        )
    }

    /// Distribution this candidate belongs to, either by kind or by location
    pub fn distribution(&self) -> Option<Distribution> {
        match self.kind {
            CandidateKind::Distribution(d) => Some(d),
            _ => self.location.as_deref().and_then(Distribution::from_path),
        }
    }
}

impl fmt::Display for ConnectionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = self
            .location
            .as_ref()
            .map(|p| p.display().to_string());
        match (&self.kind, location) {
            (CandidateKind::InCluster, Some(l)) => write!(
                f,
                "in-cluster service account ({}, {}/{})",
                l,
                env::SERVICE_HOST,
                env::SERVICE_PORT
            ),
            (CandidateKind::EnvPath, Some(l)) => write!(f, "{} ({})", env::KUBECONFIG, l),
            (CandidateKind::EnvPath, None) => write!(f, "{} (unset)", env::KUBECONFIG),
            (CandidateKind::Distribution(d), Some(l)) => write!(f, "{} kubeconfig ({})", d, l),
            (CandidateKind::UserPath, Some(l)) => write!(f, "user kubeconfig ({})", l),
            (CandidateKind::UserPath, None) => {
                write!(f, "user kubeconfig ({} unset)", env::HOME)
            }
            (CandidateKind::ServiceAccount, Some(l)) => {
                write!(f, "synthesized service-account config ({})", l)
            }
            (kind, _) => write!(f, "{:?}", kind),
        }
    }
}

/// Enumerate every candidate in priority order.
///
/// Unset variables still produce a location-less candidate so that an
/// exhaustion error can name what the operator should set.
pub fn enumerate_candidates<P: ConfigSourceProvider + ?Sized>(
    sources: &P,
) -> Vec<ConnectionCandidate> {
    let mut found: Vec<(CandidateKind, Option<PathBuf>)> = vec![(
        CandidateKind::InCluster,
        Some(PathBuf::from(paths::SERVICE_ACCOUNT_TOKEN)),
    )];

    match sources.env(env::KUBECONFIG) {
        Some(value) => found.extend(
            std::env::split_paths(&value)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| (CandidateKind::EnvPath, Some(p))),
        ),
        None => found.push((CandidateKind::EnvPath, None)),
    }

    found.extend(Distribution::ALL.into_iter().map(|d| {
        (
            CandidateKind::Distribution(d),
            Some(PathBuf::from(d.kubeconfig_path())),
        )
    }));

    match sources.home_dir() {
        Some(home) => found.extend(
            paths::USER_CONFIGS
                .iter()
                .map(|rel| (CandidateKind::UserPath, Some(home.join(rel)))),
        ),
        None => found.push((CandidateKind::UserPath, None)),
    }

    found.push((
        CandidateKind::ServiceAccount,
        Some(PathBuf::from(paths::SERVICE_ACCOUNT_TOKEN)),
    ));

    found
        .into_iter()
        .enumerate()
        .map(|(priority, (kind, location))| ConnectionCandidate {
            kind,
            location,
            priority,
        })
        .collect()
}

/// Existence check for a candidate. Says nothing about whether it can be built.
pub fn check_present<P: ConfigSourceProvider + ?Sized>(
    sources: &P,
    candidate: &ConnectionCandidate,
) -> Result<(), CandidateError> {
    match (&candidate.kind, candidate.location.as_deref()) {
        (CandidateKind::InCluster, token) => {
            let has_token = token.is_some_and(|p| sources.exists(p));
            let has_env =
                sources.env(env::SERVICE_HOST).is_some() && sources.env(env::SERVICE_PORT).is_some();
            if has_token || has_env {
                Ok(())
            } else {
                Err(CandidateError::Unavailable(format!(
                    "no service account token and {}/{} not set",
                    env::SERVICE_HOST,
                    env::SERVICE_PORT
                )))
            }
        }
        (CandidateKind::EnvPath, None) => Err(CandidateError::Unavailable(format!(
            "{} is not set",
            env::KUBECONFIG
        ))),
        (CandidateKind::UserPath, None) => Err(CandidateError::Unavailable(format!(
            "{} is not set",
            env::HOME
        ))),
        (_, Some(path)) if sources.exists(path) => Ok(()),
        (_, Some(path)) => Err(CandidateError::Unavailable(format!(
            "{} does not exist",
            path.display()
        ))),
        (kind, None) => Err(CandidateError::Unavailable(format!(
            "no location for {:?}",
            kind
        ))),
    }
}
