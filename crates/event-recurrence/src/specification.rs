//! Event specifications -- an anchor instant plus the recurrence it repeats by.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{Recurrence, RecurrenceParams};
use crate::error::{RecurrenceError, Result};
use crate::rule::{compile, RecurrenceRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecificationId(Uuid);

impl SpecificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpecificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpecificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifies whatever entity owns a set of specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated event specification.
///
/// The recurrence is compiled once at construction and the rule cached, so a
/// `Specification` value always carries a valid descriptor. Deserialization goes
/// through the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpecificationRecord")]
pub struct Specification {
    id: SpecificationId,
    owner: Option<OwnerId>,
    description: String,
    start_at: DateTime<Utc>,
    recurrence: Recurrence,
    rule: Option<RecurrenceRule>,
}

impl Specification {
    /// Create a specification anchored at `start_at` (truncated to whole seconds).
    ///
    /// # Errors
    /// Returns `RecurrenceError::Validation` if the recurrence is out of range.
    pub fn new(start_at: DateTime<Utc>, recurrence: Recurrence) -> Result<Self> {
        let rule = compile(&recurrence).map_err(|errors| {
            tracing::warn!(%errors, "rejected recurrence descriptor");
            RecurrenceError::Validation(errors)
        })?;
        Ok(Self {
            id: SpecificationId::new(),
            owner: None,
            description: String::new(),
            start_at: start_at.trunc_subsecs(0),
            recurrence,
            rule,
        })
    }

    /// Create a specification from a loose attribute bag.
    ///
    /// # Errors
    /// Returns `RecurrenceError::Validation` listing every offending field.
    pub fn from_params(start_at: DateTime<Utc>, params: &RecurrenceParams) -> Result<Self> {
        let recurrence = Recurrence::try_from(params).map_err(|errors| {
            tracing::warn!(%errors, "rejected recurrence parameters");
            RecurrenceError::Validation(errors)
        })?;
        Self::new(start_at, recurrence)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn id(&self) -> SpecificationId {
        self.id
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn recurrence(&self) -> &Recurrence {
        &self.recurrence
    }

    /// The compiled rule; `None` for a single-shot specification.
    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.rule.as_ref()
    }

    pub fn is_recurring(&self) -> bool {
        self.rule.is_some()
    }
}

/// Wire shape of a specification; the cached rule is recomputed, never trusted.
#[derive(Deserialize)]
struct SpecificationRecord {
    id: SpecificationId,
    #[serde(default)]
    owner: Option<OwnerId>,
    #[serde(default)]
    description: String,
    start_at: DateTime<Utc>,
    #[serde(default)]
    recurrence: Recurrence,
}

impl TryFrom<SpecificationRecord> for Specification {
    type Error = RecurrenceError;

    fn try_from(record: SpecificationRecord) -> Result<Self> {
        let mut spec = Specification::new(record.start_at, record.recurrence)?
            .with_description(record.description);
        spec.id = record.id;
        spec.owner = record.owner;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn anchor_is_truncated_to_seconds() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 15).unwrap()
            + chrono::Duration::milliseconds(750);
        let spec = Specification::new(start, Recurrence::None).unwrap();
        assert_eq!(
            spec.start_at(),
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 15).unwrap()
        );
    }

    #[test]
    fn deserialization_revalidates_the_descriptor() {
        let value = json!({
            "id": "6f1c1c0e-8a55-4a8e-9b0e-2a9f3f1f7a10",
            "start_at": "2026-05-01T09:00:00Z",
            "recurrence": {"repeat": "yearly", "frequency": 1, "months": []}
        });
        assert!(serde_json::from_value::<Specification>(value).is_err());
    }

    #[test]
    fn serialized_specification_roundtrips() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let spec = Specification::new(start, Recurrence::daily(2))
            .unwrap()
            .with_description("water the plants");
        let text = serde_json::to_string(&spec).unwrap();
        let back: Specification = serde_json::from_str(&text).unwrap();
        assert_eq!(back, spec);
        assert_eq!(back.rule().unwrap().as_str(), "FREQ=DAILY;INTERVAL=2");
    }
}
