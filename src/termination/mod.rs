// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace termination with escalating finalizer removal.

pub mod orchestrator;
pub mod phase;
pub mod strategy;

pub use orchestrator::{TerminationOutcome, Terminator};
pub use phase::{Event, Phase, Terminal};
pub use strategy::{Action, Strategy, TerminationAttempt, TerminationPolicy};
