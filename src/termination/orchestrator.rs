// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Drives a namespace to deletion, escalating through the strategies until it
//! is observed absent or every strategy is exhausted.

use crate::error::{ApiError, TerminusError};
use crate::kubernetes::api::{NamespaceApi, PatchKind};
use crate::termination::phase::{Event, Phase, Terminal};
use crate::termination::strategy::{Action, Strategy, TerminationAttempt, TerminationPolicy};
use k8s_openapi::api::core::v1::{Namespace, NamespaceSpec};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Result of a termination run
#[derive(Debug)]
pub struct TerminationOutcome {
    pub namespace: String,
    /// Strategy in progress when the namespace disappeared; `None` if it was never there
    pub succeeded_at: Option<Strategy>,
    pub elapsed: Duration,
    /// `None` on success
    pub terminal_error: Option<TerminusError>,
    /// Strategies started, in order
    pub attempted: Vec<Strategy>,
    /// Soft failures of individual strategy steps
    pub failures: Vec<TerminusError>,
}

impl TerminationOutcome {
    pub fn is_success(&self) -> bool {
        self.terminal_error.is_none()
    }

    pub fn last_attempted(&self) -> Option<Strategy> {
        self.attempted.last().copied()
    }

    pub fn into_result(self) -> Result<Option<Strategy>, TerminusError> {
        match self.terminal_error {
            None => Ok(self.succeeded_at),
            Some(e) => Err(e),
        }
    }
}

/// Race a future against cancellation
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn clear_spec_finalizers(namespace: &mut Namespace) {
    namespace
        .spec
        .get_or_insert_with(NamespaceSpec::default)
        .finalizers = Some(Vec::new());
}

fn clear_metadata_finalizers(namespace: &mut Namespace) {
    namespace.metadata.finalizers = Some(Vec::new());
}

fn finalizer_count(namespace: &Namespace) -> usize {
    let spec = namespace
        .spec
        .as_ref()
        .and_then(|s| s.finalizers.as_ref())
        .map_or(0, Vec::len);
    let metadata = namespace.metadata.finalizers.as_ref().map_or(0, Vec::len);
    spec + metadata
}

/// Merge patch overwriting both finalizer lists
pub fn finalizer_patch() -> serde_json::Value {
    serde_json::json!({
        "metadata": { "finalizers": [] },
        "spec": { "finalizers": [] }
    })
}

pub struct Terminator<A> {
    api: A,
    policy: TerminationPolicy,
}

impl<A: NamespaceApi> Terminator<A> {
    pub fn new(api: A) -> Self {
        Self::with_policy(api, TerminationPolicy::default())
    }

    pub fn with_policy(api: A, policy: TerminationPolicy) -> Self {
        Self { api, policy }
    }

    /// Drive `namespace` to deleted state. Cancelling the token aborts the run
    /// at the next API call or poll.
    #[instrument(skip(self, cancel))]
    pub async fn terminate(&self, namespace: &str, cancel: &CancellationToken) -> TerminationOutcome {
        let started = Instant::now();
        let mut attempted = Vec::new();
        let mut failures = Vec::new();
        let mut phase = Phase::Requested;
        debug!(
            "Termination plan for {}: {}",
            namespace,
            self.policy
                .plan()
                .iter()
                .map(|a| format!("{} ({:?})", a.strategy_name(), a.wait_budget))
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let terminal = loop {
            if let Phase::Terminal(t) = &phase {
                break t.clone();
            }

            let event = match (phase.action(), phase.strategy()) {
                (Some(Action::Probe), _) => self.probe(namespace, cancel).await,
                (Some(_), Some(strategy)) => {
                    attempted.push(strategy);
                    let attempt = self.policy.attempt(strategy);
                    let event = self.apply(namespace, &attempt, cancel).await;
                    if let Event::Failed(reason) = &event {
                        let failure = TerminusError::StrategyFailed {
                            namespace: namespace.to_string(),
                            strategy: strategy.to_string(),
                            reason: reason.clone(),
                        };
                        warn!("{}", failure);
                        failures.push(failure);
                    }
                    event
                }
                (Some(_), None) => break Terminal::Exhausted,
                (None, strategy) => {
                    let budget = strategy
                        .map(|s| self.policy.wait_budget(s))
                        .unwrap_or_default();
                    self.wait_for_absence(namespace, budget, cancel).await
                }
            };

            let next = phase.clone().transition(event);
            debug!("Namespace {}: {} -> {}", namespace, phase.name(), next.name());
            phase = next;
        };

        let elapsed = started.elapsed();
        let escalations = || {
            attempted
                .iter()
                .filter(|s| s.is_escalation())
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        };

        let (succeeded_at, terminal_error) = match terminal {
            Terminal::Success { at } => {
                info!(
                    "Namespace {} deleted after {:?} ({})",
                    namespace,
                    elapsed,
                    at.map_or("already absent", |s| s.name())
                );
                (at, None)
            }
            Terminal::Exhausted => (
                None,
                Some(TerminusError::TerminationExhausted {
                    namespace: namespace.to_string(),
                    strategies: escalations(),
                }),
            ),
            Terminal::Cancelled { stage } => {
                let stage = match attempted.last() {
                    Some(s) => format!("{} ({})", stage, s),
                    None => stage.to_string(),
                };
                (
                    None,
                    Some(TerminusError::Cancelled {
                        namespace: namespace.to_string(),
                        stage,
                    }),
                )
            }
        };

        if let Some(err) = &terminal_error {
            error!("{}", err);
        }

        TerminationOutcome {
            namespace: namespace.to_string(),
            succeeded_at,
            elapsed,
            terminal_error,
            attempted,
            failures,
        }
    }

    /// Existence check. Errors other than not-found count as present.
    async fn probe(&self, namespace: &str, cancel: &CancellationToken) -> Event {
        match cancellable(cancel, self.api.get_namespace(namespace)).await {
            None => Event::Cancelled,
            Some(Ok(_)) => Event::Present,
            Some(Err(ApiError::ResourceNotFound(_))) => Event::Absent,
            Some(Err(e)) => {
                warn!("Existence check for namespace {} failed: {}", namespace, e);
                Event::Present
            }
        }
    }

    /// Execute one strategy step, retrying it once on a resource version conflict
    async fn apply(
        &self,
        namespace: &str,
        attempt: &TerminationAttempt,
        cancel: &CancellationToken,
    ) -> Event {
        info!(
            "Namespace {}: attempting {} (wait budget {:?})",
            namespace,
            attempt.strategy_name(),
            attempt.wait_budget
        );

        let mut retried = false;
        loop {
            match cancellable(cancel, self.execute(namespace, attempt.action)).await {
                None => return Event::Cancelled,
                Some(Ok(())) => return Event::Applied,
                Some(Err(ApiError::ResourceNotFound(_))) => return Event::Absent,
                Some(Err(ApiError::ResourceConflict(_))) if !retried => {
                    warn!(
                        "Conflict during {} on namespace {}, re-fetching and retrying",
                        attempt.strategy_name(),
                        namespace
                    );
                    retried = true;
                }
                Some(Err(e)) => return Event::Failed(e.to_string()),
            }
        }
    }

    async fn execute(&self, namespace: &str, action: Action) -> Result<(), ApiError> {
        if action == Action::Delete {
            return self.api.delete_namespace(namespace).await;
        }

        // Always act on the latest object; earlier steps changed its resource version
        let mut current = self.api.get_namespace(namespace).await?;
        debug!(
            "Namespace {} has {} finalizers before {:?}",
            namespace,
            finalizer_count(&current),
            action
        );

        match action {
            Action::ClearSpecFinalizers => {
                clear_spec_finalizers(&mut current);
                self.api.update_namespace(&current).await?;
            }
            Action::ClearMetadataFinalizers => {
                clear_metadata_finalizers(&mut current);
                self.api.update_namespace(&current).await?;
            }
            Action::FinalizeSubresource => {
                clear_spec_finalizers(&mut current);
                clear_metadata_finalizers(&mut current);
                self.api.update_namespace_finalize(&current).await?;
            }
            Action::RawPatch => {
                self.api
                    .patch_namespace(namespace, &finalizer_patch(), PatchKind::Merge)
                    .await?;
            }
            Action::Probe | Action::Delete => {}
        }
        Ok(())
    }

    /// Poll until the namespace is gone or `budget` elapses
    async fn wait_for_absence(
        &self,
        namespace: &str,
        budget: Duration,
        cancel: &CancellationToken,
    ) -> Event {
        let deadline = Instant::now() + budget;
        loop {
            let now = Instant::now();
            if now >= deadline {
                debug!("Namespace {} still present after {:?}", namespace, budget);
                return Event::WaitElapsed;
            }

            let pause = self.policy.poll_interval.min(deadline - now);
            if cancellable(cancel, sleep(pause)).await.is_none() {
                return Event::Cancelled;
            }

            match cancellable(cancel, self.api.get_namespace(namespace)).await {
                None => return Event::Cancelled,
                Some(Err(ApiError::ResourceNotFound(_))) => return Event::Absent,
                Some(Ok(_)) => {}
                Some(Err(e)) => warn!("Polling namespace {} failed: {}", namespace, e),
            }
        }
    }
}
