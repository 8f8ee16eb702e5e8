// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::kubernetes::probe::ConnectionCandidate;
use thiserror::Error;

/// Failure of a single call against the cluster resource API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Conflict updating {0}: resource version is stale")]
    ResourceConflict(String),

    #[error("API request failed: {0}")]
    Request(String),
}

impl ApiError {
    /// Classify a kube client error for the named resource
    pub fn from_kube(err: kube::Error, resource: &str) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => {
                ApiError::ResourceNotFound(resource.to_string())
            }
            kube::Error::Api(resp) if resp.code == 409 => {
                ApiError::ResourceConflict(resource.to_string())
            }
            other => ApiError::Request(other.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::ResourceNotFound(_))
    }
}

/// Why a connection candidate could not be used. Never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    #[error("not available: {0}")]
    Unavailable(String),

    #[error("invalid: {0}")]
    Invalid(String),
}

/// One candidate that was tried during resolution and why it was rejected
#[derive(Debug, Clone)]
pub struct CandidateAttempt {
    pub candidate: ConnectionCandidate,
    pub failure: CandidateError,
}

#[derive(Error, Debug)]
pub enum TerminusError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(
        "No usable Kubernetes configuration found. Set KUBECONFIG to a kubeconfig file or run inside a cluster with a mounted service account. Tried:{}",
        describe_attempts(.attempts)
    )]
    ResolutionExhausted { attempts: Vec<CandidateAttempt> },

    #[error("Connectivity test using {origin} failed: {reason}")]
    ConnectivityFailed { origin: String, reason: String },

    #[error("Strategy {strategy} failed for namespace {namespace}: {reason}")]
    StrategyFailed {
        namespace: String,
        strategy: String,
        reason: String,
    },

    #[error(
        "Namespace {namespace} is still present, all strategies exhausted: {}",
        .strategies.join(", ")
    )]
    TerminationExhausted {
        namespace: String,
        strategies: Vec<String>,
    },

    #[error("Termination of namespace {namespace} cancelled during {stage}")]
    Cancelled { namespace: String, stage: String },
}

fn describe_attempts(attempts: &[CandidateAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("\n  - {}: {}", a.candidate, a.failure))
        .collect()
}

pub type Result<T> = std::result::Result<T, TerminusError>;
