// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for connection resolution and namespace access.

pub mod api;
pub mod probe;
pub mod resolver;

pub use api::{KubeNamespaceApi, NamespaceApi, PatchKind};
pub use probe::{ConfigSourceProvider, ConnectionCandidate, SystemSources};
pub use resolver::{resolve_connection, ResolvedConnection, Resolver};
