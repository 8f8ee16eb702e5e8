// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace operations the resolver and the termination orchestrator depend on

use crate::error::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, ResourceExt,
};
use serde_json::Value;
use tracing::{debug, instrument};

/// How a patch body is interpreted by the API server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    Merge,
    Strategic,
}

/// Capability surface over the cluster's namespace resource.
///
/// Every error distinguishes `ResourceNotFound` and `ResourceConflict` from
/// other failures.
#[async_trait]
pub trait NamespaceApi: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace, ApiError>;

    /// Replace the namespace; fails with `ResourceConflict` on a stale resource version
    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, ApiError>;

    /// Replace the namespace through its `finalize` subresource
    async fn update_namespace_finalize(&self, namespace: &Namespace)
        -> Result<Namespace, ApiError>;

    async fn patch_namespace(
        &self,
        name: &str,
        patch: &Value,
        kind: PatchKind,
    ) -> Result<Namespace, ApiError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), ApiError>;

    async fn list_namespaces(&self, limit: u32) -> Result<Vec<Namespace>, ApiError>;

    /// Git version reported by the API server
    async fn server_version(&self) -> Result<String, ApiError>;
}

/// `NamespaceApi` backed by a kube client
#[derive(Clone)]
pub struct KubeNamespaceApi {
    client: Client,
}

impl KubeNamespaceApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }
}

fn object_name(namespace: &Namespace) -> Result<String, ApiError> {
    namespace
        .metadata
        .name
        .clone()
        .ok_or_else(|| ApiError::Request("namespace object has no name".to_string()))
}

#[async_trait]
impl NamespaceApi for KubeNamespaceApi {
    #[instrument(skip(self))]
    async fn get_namespace(&self, name: &str) -> Result<Namespace, ApiError> {
        self.namespaces()
            .get(name)
            .await
            .map_err(|e| ApiError::from_kube(e, name))
    }

    #[instrument(skip(self, namespace), fields(namespace = %namespace.name_any()))]
    async fn update_namespace(&self, namespace: &Namespace) -> Result<Namespace, ApiError> {
        let name = object_name(namespace)?;
        self.namespaces()
            .replace(&name, &PostParams::default(), namespace)
            .await
            .map_err(|e| ApiError::from_kube(e, &name))
    }

    #[instrument(skip(self, namespace), fields(namespace = %namespace.name_any()))]
    async fn update_namespace_finalize(
        &self,
        namespace: &Namespace,
    ) -> Result<Namespace, ApiError> {
        let name = object_name(namespace)?;
        let body = serde_json::to_vec(namespace)
            .map_err(|e| ApiError::Request(format!("Failed to encode namespace {}: {}", name, e)))?;
        self.namespaces()
            .replace_subresource("finalize", &name, &PostParams::default(), body)
            .await
            .map_err(|e| ApiError::from_kube(e, &name))
    }

    #[instrument(skip(self, patch))]
    async fn patch_namespace(
        &self,
        name: &str,
        patch: &Value,
        kind: PatchKind,
    ) -> Result<Namespace, ApiError> {
        let patch = match kind {
            PatchKind::Merge => Patch::Merge(patch),
            PatchKind::Strategic => Patch::Strategic(patch),
        };
        self.namespaces()
            .patch(name, &PatchParams::default(), &patch)
            .await
            .map_err(|e| ApiError::from_kube(e, name))
    }

    #[instrument(skip(self))]
    async fn delete_namespace(&self, name: &str) -> Result<(), ApiError> {
        self.namespaces()
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| debug!("Delete request for namespace {} accepted", name))
            .map_err(|e| ApiError::from_kube(e, name))
    }

    async fn list_namespaces(&self, limit: u32) -> Result<Vec<Namespace>, ApiError> {
        let list = self
            .namespaces()
            .list(&ListParams::default().limit(limit))
            .await
            .map_err(|e| ApiError::from_kube(e, "namespaces"))?;
        Ok(list.items)
    }

    async fn server_version(&self) -> Result<String, ApiError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| ApiError::from_kube(e, "version"))?;
        Ok(info.git_version)
    }
}
