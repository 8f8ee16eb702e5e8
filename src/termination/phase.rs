// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Termination state machine. Transitions are pure; the orchestrator performs
//! the I/O for each phase and feeds the observed event back in.

use crate::termination::strategy::{Action, Strategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Initial existence check
    Requested,
    GracefulDeleting,
    PollingGraceful,
    /// Clearing finalizers with one of the update-based strategies
    EscalatingFinalizers(Strategy),
    PollingEscalation(Strategy),
    Patching,
    PollingPatch,
    /// Final existence check after every strategy ran
    Verifying,
    Terminal(Terminal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// Namespace observed absent; `at` is the strategy in progress, `None` if it was never there
    Success { at: Option<Strategy> },
    /// Every strategy ran and the namespace is still present
    Exhausted,
    Cancelled { stage: &'static str },
}

/// What the orchestrator observed while executing a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Namespace reported not-found
    Absent,
    Present,
    /// A mutating call was accepted
    Applied,
    /// A mutating call failed outright
    Failed(String),
    /// The wait budget elapsed with the namespace still present
    WaitElapsed,
    Cancelled,
}

impl Phase {
    /// Phase that executes `strategy`
    pub fn entering(strategy: Strategy) -> Phase {
        match strategy {
            Strategy::GracefulDelete => Phase::GracefulDeleting,
            Strategy::RawPatch => Phase::Patching,
            other => Phase::EscalatingFinalizers(other),
        }
    }

    /// Strategy in progress, if any
    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Phase::Requested | Phase::Terminal(_) => None,
            Phase::GracefulDeleting | Phase::PollingGraceful => Some(Strategy::GracefulDelete),
            Phase::EscalatingFinalizers(s) | Phase::PollingEscalation(s) => Some(*s),
            Phase::Patching | Phase::PollingPatch | Phase::Verifying => Some(Strategy::RawPatch),
        }
    }

    /// Action performed by this phase; polling phases only wait
    pub fn action(&self) -> Option<Action> {
        match self {
            Phase::Requested | Phase::Verifying => Some(Action::Probe),
            Phase::GracefulDeleting | Phase::EscalatingFinalizers(_) | Phase::Patching => {
                self.strategy().map(|s| s.action())
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Requested => "requested",
            Phase::GracefulDeleting => "graceful-deleting",
            Phase::PollingGraceful => "polling-graceful",
            Phase::EscalatingFinalizers(_) => "escalating-finalizers",
            Phase::PollingEscalation(_) => "polling-escalation",
            Phase::Patching => "patching",
            Phase::PollingPatch => "polling-patch",
            Phase::Verifying => "verifying",
            Phase::Terminal(_) => "terminal",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Terminal(_))
    }

    /// Phase following a strategy whose wait elapsed
    fn after(strategy: Strategy) -> Phase {
        match strategy.next() {
            Some(next) => Phase::entering(next),
            None => Phase::Verifying,
        }
    }

    pub fn transition(self, event: Event) -> Phase {
        match (self, event) {
            (Phase::Terminal(t), _) => Phase::Terminal(t),
            (phase, Event::Absent) => Phase::Terminal(Terminal::Success {
                at: phase.strategy(),
            }),
            (phase, Event::Cancelled) => Phase::Terminal(Terminal::Cancelled {
                stage: phase.name(),
            }),

            (Phase::Requested, Event::Present) => Phase::GracefulDeleting,

            // A failed step still waits out its budget before the next one starts
            (Phase::GracefulDeleting, Event::Applied | Event::Failed(_)) => Phase::PollingGraceful,
            (Phase::PollingGraceful, Event::WaitElapsed) => Phase::after(Strategy::GracefulDelete),

            (Phase::EscalatingFinalizers(s), Event::Applied | Event::Failed(_)) => {
                Phase::PollingEscalation(s)
            }
            (Phase::PollingEscalation(s), Event::WaitElapsed) => Phase::after(s),

            (Phase::Patching, Event::Applied | Event::Failed(_)) => Phase::PollingPatch,
            (Phase::PollingPatch, Event::WaitElapsed) => Phase::Verifying,

            (Phase::Verifying, Event::Present) => Phase::Terminal(Terminal::Exhausted),

            // Events that carry no meaning for the phase leave it unchanged
            (phase, _) => phase,
        }
    }
}
