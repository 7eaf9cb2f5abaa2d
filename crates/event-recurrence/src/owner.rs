//! Owner-level glue: a set of specifications and a read-only view of their events.
//!
//! [`EventOwner`] fans generation out across its specifications and exposes the
//! persisted occurrences through [`Events`], which has no way to add an
//! occurrence. Its `append`/`build`/`create` entry points exist only to turn
//! attempts at direct insertion into [`RecurrenceError::IllegalMutation`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::GenerationPolicy;
use crate::error::{RecurrenceError, Result};
use crate::generator::{generate, GenerateRequest};
use crate::specification::{OwnerId, Specification, SpecificationId};
use crate::store::{Occurrence, OccurrenceStore};

/// Options for [`EventOwner::create_specification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOptions {
    /// Run default generation right after creation.
    pub generate: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self { generate: true }
    }
}

impl CreateOptions {
    /// Skip creation-time generation (bulk setup).
    pub fn deferred() -> Self {
        Self { generate: false }
    }
}

pub struct EventOwner<S: OccurrenceStore> {
    id: OwnerId,
    store: Arc<S>,
    policy: GenerationPolicy,
    specifications: Vec<Specification>,
}

impl<S: OccurrenceStore> EventOwner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, GenerationPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, policy: GenerationPolicy) -> Self {
        Self {
            id: OwnerId::new(),
            store,
            policy,
            specifications: Vec::new(),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn policy(&self) -> &GenerationPolicy {
        &self.policy
    }

    pub fn specifications(&self) -> &[Specification] {
        &self.specifications
    }

    pub fn specification(&self, id: SpecificationId) -> Option<&Specification> {
        self.specifications.iter().find(|s| s.id() == id)
    }

    /// Attach `spec` to this owner and, unless deferred, generate its default
    /// occurrences (from the anchor, bounded by the [`GenerationPolicy`]).
    ///
    /// # Errors
    /// Propagates generation failures. The specification is then not attached
    /// and any occurrences already written for it are removed.
    pub fn create_specification(
        &mut self,
        spec: Specification,
        options: CreateOptions,
    ) -> Result<SpecificationId> {
        let spec = spec.with_owner(self.id);
        let id = spec.id();

        if options.generate {
            let request = self.policy.request_for(spec.start_at());
            if let Err(e) = generate(self.store.as_ref(), &spec, &request) {
                let removed = self.store.remove_specification(id)?;
                tracing::warn!(specification = %id, removed, error = %e, "creation-time generation failed");
                return Err(e);
            }
        }

        self.specifications.push(spec);
        Ok(id)
    }

    /// Generate across every specification; results are merged chronologically.
    ///
    /// # Errors
    /// Stops at the first specification whose generation fails.
    pub fn generate(&self, request: &GenerateRequest) -> Result<Vec<Occurrence>> {
        let mut all = Vec::new();
        for spec in &self.specifications {
            all.extend(generate(self.store.as_ref(), spec, request)?);
        }
        all.sort_by_key(|o| (o.at(), o.specification()));
        tracing::debug!(owner = %self.id, total = all.len(), "owner generation complete");
        Ok(all)
    }

    /// Detach a specification and delete its occurrences.
    ///
    /// # Errors
    /// Returns `RecurrenceError::Store` if the occurrences cannot be removed.
    pub fn remove_specification(&mut self, id: SpecificationId) -> Result<Option<Specification>> {
        let Some(index) = self.specifications.iter().position(|s| s.id() == id) else {
            return Ok(None);
        };
        let removed = self.store.remove_specification(id)?;
        tracing::debug!(specification = %id, removed, "removed specification occurrences");
        Ok(Some(self.specifications.remove(index)))
    }

    /// A snapshot of this owner's persisted occurrences.
    ///
    /// # Errors
    /// Returns `RecurrenceError::Store` if the store cannot be read.
    pub fn events(&self) -> Result<Events> {
        Ok(Events {
            occurrences: self.store.for_owner(self.id)?,
        })
    }
}

/// Read-only, chronologically ordered view of an owner's occurrences.
#[derive(Debug, Clone, Default)]
pub struct Events {
    occurrences: Vec<Occurrence>,
}

impl Events {
    pub fn iter(&self) -> std::slice::Iter<'_, Occurrence> {
        self.occurrences.iter()
    }

    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    pub fn as_slice(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// Occurrences at or after `now`.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<&Occurrence> {
        self.iter().filter(|o| o.at() >= now).collect()
    }

    /// Occurrences strictly before `now`.
    pub fn past(&self, now: DateTime<Utc>) -> Vec<&Occurrence> {
        self.iter().filter(|o| o.at() < now).collect()
    }

    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Occurrence> {
        self.iter().filter(|o| o.at() >= from && o.at() <= to).collect()
    }

    /// Always rejected: occurrences are only created by generation.
    pub fn append(&mut self, _occurrence: Occurrence) -> Result<()> {
        Err(rejected("append"))
    }

    /// Always rejected: occurrences are only created by generation.
    pub fn build(&self, _attributes: Value) -> Result<Occurrence> {
        Err(rejected("build"))
    }

    /// Always rejected: occurrences are only created by generation.
    pub fn create(&self, _attributes: Value) -> Result<Occurrence> {
        Err(rejected("create"))
    }
}

fn rejected(operation: &str) -> RecurrenceError {
    tracing::warn!(operation, "rejected direct occurrence mutation");
    RecurrenceError::IllegalMutation(format!(
        "cannot {} occurrences directly; use generate",
        operation
    ))
}

impl<'a> IntoIterator for &'a Events {
    type Item = &'a Occurrence;
    type IntoIter = std::slice::Iter<'a, Occurrence>;

    fn into_iter(self) -> Self::IntoIter {
        self.occurrences.iter()
    }
}
