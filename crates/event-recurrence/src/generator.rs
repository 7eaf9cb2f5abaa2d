//! Occurrence generation -- expand a specification and persist what is missing.
//!
//! This is the only code path that creates occurrences. For every candidate
//! instant the generator reuses the persisted occurrence if there is one and
//! inserts a new one otherwise, so repeated or overlapping queries never
//! duplicate rows. A uniqueness conflict raised by the store (another caller
//! inserted the same instant first) is resolved by reading the winner's row.

use chrono::{DateTime, Utc};

use crate::error::{RecurrenceError, Result, StoreError};
use crate::expander::{expand, Window};
use crate::specification::Specification;
use crate::store::{NewOccurrence, Occurrence, OccurrenceStore};

/// Bounds of one generation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateRequest {
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
    pub count: Option<u32>,
}

impl GenerateRequest {
    pub fn new(from: DateTime<Utc>) -> Self {
        Self {
            from,
            to: None,
            count: None,
        }
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

/// Materialize the occurrences of `spec` selected by `request`.
///
/// Returns every occurrence for the expanded instants, pre-existing and new,
/// in chronological order. A single-shot specification always yields its one
/// occurrence at the anchor, whatever the window.
///
/// # Errors
/// Returns `RecurrenceError::InvalidWindow` if `to` is before `from`,
/// `RecurrenceError::InvalidRule` if the compiled rule cannot be expanded, and
/// `RecurrenceError::Store` for backend failures. Uniqueness conflicts are
/// recovered, not returned.
#[tracing::instrument(
    skip(store, spec, request),
    fields(specification = %spec.id(), from = %request.from, to = ?request.to, count = ?request.count)
)]
pub fn generate<S>(store: &S, spec: &Specification, request: &GenerateRequest) -> Result<Vec<Occurrence>>
where
    S: OccurrenceStore + ?Sized,
{
    let window = Window::new(request.from, request.to)?;
    let expansion = expand(spec.rule(), spec.start_at(), window, request.count)?;

    let mut occurrences = Vec::new();
    let mut created = 0usize;

    for at in &expansion {
        if let Some(existing) = store.find(spec.id(), at)? {
            occurrences.push(existing);
            continue;
        }

        match store.insert(NewOccurrence::new(spec.id(), spec.owner(), at)) {
            Ok(occurrence) => {
                tracing::debug!(%at, "created occurrence");
                created += 1;
                occurrences.push(occurrence);
            }
            Err(StoreError::Conflict { .. }) => {
                tracing::debug!(%at, "occurrence created concurrently, reusing it");
                let existing = store.find(spec.id(), at)?.ok_or_else(|| {
                    StoreError::Backend(format!(
                        "conflict reported for {} at {} but no row found",
                        spec.id(),
                        at
                    ))
                })?;
                occurrences.push(existing);
            }
            Err(e) => return Err(RecurrenceError::Store(e)),
        }
    }

    tracing::info!(
        created,
        reused = occurrences.len() - created,
        "generated occurrences"
    );
    Ok(occurrences)
}

/// Occurrences of `spec` already persisted in `[from, to]`, without generating.
///
/// # Errors
/// Returns `RecurrenceError::InvalidWindow` if `to` is before `from`.
pub fn persisted<S>(
    store: &S,
    spec: &Specification,
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<Occurrence>>
where
    S: OccurrenceStore + ?Sized,
{
    let window = Window::new(from, to)?;
    Ok(store.between(spec.id(), window.from(), window.to())?)
}
