//! Error types for recurrence compilation and occurrence generation.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::specification::SpecificationId;

/// A single rejected field of a recurrence descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Descriptor field name (`repeat`, `frequency`, `on`, `on_the`, `target`).
    pub field: &'static str,
    pub message: String,
}

/// Every field-level problem found while validating one descriptor.
///
/// Validation does not stop at the first failure; callers get the full list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The offending field names, in the order they were reported.
    pub fn fields(&self) -> Vec<&'static str> {
        self.errors.iter().map(|e| e.field).collect()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// `Ok(value)` when nothing was reported, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Failures raised by an [`OccurrenceStore`](crate::store::OccurrenceStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An occurrence for this (specification, instant) pair is already persisted.
    #[error("occurrence for specification {specification} at {at} already exists")]
    Conflict {
        specification: SpecificationId,
        at: DateTime<Utc>,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum RecurrenceError {
    #[error("Invalid recurrence: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Invalid window: to ({to}) is before from ({from})")]
    InvalidWindow {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// Occurrences only come out of generation; anything else is API misuse.
    #[error("Illegal mutation: {0}")]
    IllegalMutation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RecurrenceError>;
