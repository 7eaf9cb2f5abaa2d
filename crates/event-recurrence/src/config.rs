//! Generation policy -- how much to materialize when a specification is created.

use std::env;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, Result};
use crate::generator::GenerateRequest;

/// Longest accepted horizon: a century past the anchor.
pub const MAX_HORIZON_DAYS: i64 = 36_525;

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Defaults applied by creation-time generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPolicy {
    /// Occurrences to materialize from the anchor onwards.
    pub default_count: u32,
    /// Optional upper bound on the window, in days after the anchor.
    pub horizon_days: Option<i64>,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            default_count: 30,
            horizon_days: None,
        }
    }
}

impl GenerationPolicy {
    /// Read `EVENT_RECURRENCE_DEFAULT_COUNT` and `EVENT_RECURRENCE_HORIZON_DAYS`,
    /// falling back to the defaults for unset, unparseable or out-of-range values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let horizon_days = env_opt("EVENT_RECURRENCE_HORIZON_DAYS")
            .and_then(|v| v.parse().ok())
            .filter(|days| {
                let ok = horizon_in_range(*days);
                if !ok {
                    tracing::warn!(days, "ignoring out-of-range EVENT_RECURRENCE_HORIZON_DAYS");
                }
                ok
            });
        Self {
            default_count: env_opt("EVENT_RECURRENCE_DEFAULT_COUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_count),
            horizon_days,
        }
    }

    /// # Errors
    /// Returns `RecurrenceError::Config` wrapping the JSON error message, or
    /// naming a horizon outside `0..=MAX_HORIZON_DAYS`.
    pub fn from_json(text: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(text)
            .map_err(|e| RecurrenceError::Config(format!("generation policy: {}", e)))?;
        policy.validate()?;
        Ok(policy)
    }

    /// # Errors
    /// Returns `RecurrenceError::Config` if `horizon_days` is negative or beyond
    /// [`MAX_HORIZON_DAYS`].
    pub fn validate(&self) -> Result<()> {
        match self.horizon_days {
            Some(days) if !horizon_in_range(days) => Err(RecurrenceError::Config(format!(
                "generation policy: horizon_days {} is outside 0..={}",
                days, MAX_HORIZON_DAYS
            ))),
            _ => Ok(()),
        }
    }

    /// The request creation-time generation issues for an anchor.
    ///
    /// A horizon that cannot be represented past `anchor` leaves the window
    /// open; `default_count` still bounds it.
    pub fn request_for(&self, anchor: DateTime<Utc>) -> GenerateRequest {
        let request = GenerateRequest::new(anchor).count(self.default_count);
        let to = self
            .horizon_days
            .and_then(|days| Duration::try_days(days.max(0)))
            .and_then(|horizon| anchor.checked_add_signed(horizon));
        match to {
            Some(to) => request.to(to),
            None => request,
        }
    }
}

fn horizon_in_range(days: i64) -> bool {
    (0..=MAX_HORIZON_DAYS).contains(&days)
}
