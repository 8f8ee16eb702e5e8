// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Result};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use terminus::config::Config;
use terminus::kubernetes::resolve_connection;
use terminus::termination::Terminator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting terminus");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespaces={}",
        config.namespaces.join(",")
    );

    let connection = resolve_connection().await?;
    if !connection.secure {
        warn!("Connection to the cluster is NOT verified by TLS");
    }
    info!(
        "Connected to Kubernetes {} via {}",
        connection.server_version, connection.source
    );

    let terminator =
        Terminator::with_policy(connection.api().clone(), config.termination_policy());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, aborting termination");
            on_signal.cancel();
        }
    });
    if let Some(timeout) = config.overall_timeout {
        let on_timeout = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("Overall timeout of {:?} reached, aborting termination", timeout);
            on_timeout.cancel();
        });
    }

    // Different namespaces are independent and run concurrently
    let outcomes = join_all(
        config
            .namespaces
            .iter()
            .map(|ns| terminator.terminate(ns, &cancel)),
    )
    .await;

    let mut failed = 0;
    for outcome in &outcomes {
        match (&outcome.terminal_error, outcome.succeeded_at) {
            (None, Some(strategy)) => info!(
                "Namespace {} deleted via {} in {:?}",
                outcome.namespace, strategy, outcome.elapsed
            ),
            (None, None) => info!("Namespace {} was already absent", outcome.namespace),
            (Some(e), _) => {
                failed += 1;
                error!(
                    "Namespace {} not deleted (last strategy: {}): {}",
                    outcome.namespace,
                    outcome
                        .last_attempted()
                        .map_or("none".to_string(), |s| s.to_string()),
                    e
                );
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} namespaces could not be terminated", failed, outcomes.len());
    }
    Ok(())
}
