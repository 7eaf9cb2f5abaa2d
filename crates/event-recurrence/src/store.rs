//! Occurrence persistence.
//!
//! An [`Occurrence`] can only be minted from a [`NewOccurrence`], and only the
//! generator can create one of those. Stores enforce the uniqueness of
//! (specification, instant) and report a clash as [`StoreError::Conflict`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::specification::{OwnerId, SpecificationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OccurrenceId(Uuid);

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One materialized instant of a specification. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    id: OccurrenceId,
    specification: SpecificationId,
    owner: Option<OwnerId>,
    at: DateTime<Utc>,
}

impl Occurrence {
    pub fn id(&self) -> OccurrenceId {
        self.id
    }

    pub fn specification(&self) -> SpecificationId {
        self.specification
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

/// An occurrence the generator has decided to persist.
#[derive(Debug)]
pub struct NewOccurrence {
    specification: SpecificationId,
    owner: Option<OwnerId>,
    at: DateTime<Utc>,
}

impl NewOccurrence {
    pub(crate) fn new(
        specification: SpecificationId,
        owner: Option<OwnerId>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            specification,
            owner,
            at,
        }
    }

    pub fn specification(&self) -> SpecificationId {
        self.specification
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Assign an id. Stores call this once the row is accepted.
    pub fn into_occurrence(self) -> Occurrence {
        Occurrence {
            id: OccurrenceId(Uuid::new_v4()),
            specification: self.specification,
            owner: self.owner,
            at: self.at,
        }
    }
}

/// Persistence boundary for occurrences.
///
/// Implementations must reject a second occurrence for the same
/// (specification, instant) with [`StoreError::Conflict`]. Every listing is in
/// chronological order.
pub trait OccurrenceStore: Send + Sync {
    fn insert(&self, occurrence: NewOccurrence) -> Result<Occurrence, StoreError>;

    fn find(
        &self,
        specification: SpecificationId,
        at: DateTime<Utc>,
    ) -> Result<Option<Occurrence>, StoreError>;

    /// Occurrences of one specification with `from <= at <= to` (`to` open when `None`).
    fn between(
        &self,
        specification: SpecificationId,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Occurrence>, StoreError>;

    fn for_owner(&self, owner: OwnerId) -> Result<Vec<Occurrence>, StoreError>;

    /// Delete every occurrence of a specification, returning how many went.
    fn remove_specification(&self, specification: SpecificationId) -> Result<usize, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

type Rows = BTreeMap<(SpecificationId, DateTime<Utc>), Occurrence>;

/// In-process store keyed by (specification, instant).
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Rows>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Backend("occurrence table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Rows>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Backend("occurrence table lock poisoned".to_string()))
    }
}

impl OccurrenceStore for MemoryStore {
    fn insert(&self, occurrence: NewOccurrence) -> Result<Occurrence, StoreError> {
        let key = (occurrence.specification, occurrence.at);
        let mut rows = self.write()?;
        if rows.contains_key(&key) {
            return Err(StoreError::Conflict {
                specification: key.0,
                at: key.1,
            });
        }
        let occurrence = occurrence.into_occurrence();
        rows.insert(key, occurrence.clone());
        Ok(occurrence)
    }

    fn find(
        &self,
        specification: SpecificationId,
        at: DateTime<Utc>,
    ) -> Result<Option<Occurrence>, StoreError> {
        Ok(self.read()?.get(&(specification, at)).cloned())
    }

    fn between(
        &self,
        specification: SpecificationId,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Occurrence>, StoreError> {
        let rows = self.read()?;
        let found = match to {
            Some(to) if to < from => Vec::new(),
            Some(to) => rows
                .range((specification, from)..=(specification, to))
                .map(|(_, o)| o.clone())
                .collect(),
            None => rows
                .range((specification, from)..)
                .take_while(|((spec, _), _)| *spec == specification)
                .map(|(_, o)| o.clone())
                .collect(),
        };
        Ok(found)
    }

    fn for_owner(&self, owner: OwnerId) -> Result<Vec<Occurrence>, StoreError> {
        let mut found: Vec<Occurrence> = self
            .read()?
            .values()
            .filter(|o| o.owner == Some(owner))
            .cloned()
            .collect();
        found.sort_by_key(|o| (o.at, o.specification));
        Ok(found)
    }

    fn remove_specification(&self, specification: SpecificationId) -> Result<usize, StoreError> {
        let mut rows = self.write()?;
        let before = rows.len();
        rows.retain(|(spec, _), _| *spec != specification);
        Ok(before - rows.len())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }
}
