// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Escalation strategies and their wait budgets

use crate::constants::termination;
use std::fmt;
use std::time::Duration;

/// Termination strategies, ordered from least to most invasive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    GracefulDelete,
    SpecFinalizerClear,
    MetadataFinalizerClear,
    FinalizeSubresource,
    RawPatch,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::GracefulDelete => "graceful-delete",
            Strategy::SpecFinalizerClear => "spec-finalizer-clear",
            Strategy::MetadataFinalizerClear => "metadata-finalizer-clear",
            Strategy::FinalizeSubresource => "finalize-subresource",
            Strategy::RawPatch => "raw-patch",
        }
    }

    /// The next, more invasive strategy
    pub fn next(&self) -> Option<Strategy> {
        match self {
            Strategy::GracefulDelete => Some(Strategy::SpecFinalizerClear),
            Strategy::SpecFinalizerClear => Some(Strategy::MetadataFinalizerClear),
            Strategy::MetadataFinalizerClear => Some(Strategy::FinalizeSubresource),
            Strategy::FinalizeSubresource => Some(Strategy::RawPatch),
            Strategy::RawPatch => None,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Strategy::GracefulDelete => Action::Delete,
            Strategy::SpecFinalizerClear => Action::ClearSpecFinalizers,
            Strategy::MetadataFinalizerClear => Action::ClearMetadataFinalizers,
            Strategy::FinalizeSubresource => Action::FinalizeSubresource,
            Strategy::RawPatch => Action::RawPatch,
        }
    }

    /// Escalation strategies only, i.e. everything after the graceful delete
    pub fn is_escalation(&self) -> bool {
        !matches!(self, Strategy::GracefulDelete)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a strategy does to the namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Existence check, no mutation
    Probe,
    Delete,
    ClearSpecFinalizers,
    ClearMetadataFinalizers,
    /// Clear both finalizer lists through the finalize subresource
    FinalizeSubresource,
    /// Merge patch overwriting both finalizer lists, no resource version precondition
    RawPatch,
}

impl Action {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Action::Probe)
    }
}

/// One step in the escalation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationAttempt {
    pub strategy: Strategy,
    pub action: Action,
    pub wait_budget: Duration,
}

impl TerminationAttempt {
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}

/// Timing of a termination run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub poll_interval: Duration,
    pub graceful_wait: Duration,
    pub spec_finalizer_wait: Duration,
    pub metadata_finalizer_wait: Duration,
    pub finalize_subresource_wait: Duration,
    pub raw_patch_wait: Duration,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(termination::POLL_INTERVAL_SECS),
            graceful_wait: Duration::from_secs(termination::GRACEFUL_WAIT_SECS),
            spec_finalizer_wait: Duration::from_secs(termination::SPEC_FINALIZER_WAIT_SECS),
            metadata_finalizer_wait: Duration::from_secs(
                termination::METADATA_FINALIZER_WAIT_SECS,
            ),
            finalize_subresource_wait: Duration::from_secs(
                termination::FINALIZE_SUBRESOURCE_WAIT_SECS,
            ),
            raw_patch_wait: Duration::from_secs(termination::RAW_PATCH_WAIT_SECS),
        }
    }
}

impl TerminationPolicy {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn wait_budget(&self, strategy: Strategy) -> Duration {
        match strategy {
            Strategy::GracefulDelete => self.graceful_wait,
            Strategy::SpecFinalizerClear => self.spec_finalizer_wait,
            Strategy::MetadataFinalizerClear => self.metadata_finalizer_wait,
            Strategy::FinalizeSubresource => self.finalize_subresource_wait,
            Strategy::RawPatch => self.raw_patch_wait,
        }
    }

    pub fn attempt(&self, strategy: Strategy) -> TerminationAttempt {
        TerminationAttempt {
            strategy,
            action: strategy.action(),
            wait_budget: self.wait_budget(strategy),
        }
    }

    /// Every attempt in escalation order
    pub fn plan(&self) -> Vec<TerminationAttempt> {
        std::iter::successors(Some(Strategy::GracefulDelete), Strategy::next)
            .map(|s| self.attempt(s))
            .collect()
    }
}
