// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::termination::TerminationPolicy;
use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespaces to terminate, deduplicated, in the order given
    pub namespaces: Vec<String>,
    pub poll_interval: Option<Duration>,
    /// Overall deadline for the whole run
    pub overall_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = lookup("TARGET_NAMESPACES")
            .context("TARGET_NAMESPACES environment variable not set")?;

        let mut namespaces: Vec<String> = Vec::new();
        for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !namespaces.iter().any(|n| n == name) {
                namespaces.push(name.to_string());
            }
        }
        if namespaces.is_empty() {
            bail!("TARGET_NAMESPACES does not name any namespace");
        }

        let poll_interval = seconds(&lookup, "POLL_INTERVAL_SECS")?;
        if poll_interval == Some(Duration::ZERO) {
            bail!("POLL_INTERVAL_SECS must be at least 1 second");
        }
        let overall_timeout = seconds(&lookup, "TERMINATION_TIMEOUT_SECS")?;

        Ok(Config {
            namespaces,
            poll_interval,
            overall_timeout,
        })
    }

    pub fn termination_policy(&self) -> TerminationPolicy {
        let policy = TerminationPolicy::default();
        match self.poll_interval {
            Some(interval) => policy.with_poll_interval(interval),
            None => policy,
        }
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, v))
                .map(Duration::from_secs)
        })
        .transpose()
}
