//! # event-recurrence
//!
//! Recurrence rule compilation and idempotent occurrence generation.
//!
//! A [`Specification`] pairs an anchor instant with a [`Recurrence`]. The
//! recurrence compiles to a canonical RFC 5545 rule string, the rule expands
//! (via the `rrule` crate) into instants within a query window, and the
//! generator persists exactly the instants that are not stored yet.
//!
//! ## Modules
//!
//! - [`descriptor`] -- typed recurrence descriptors and the loose `RecurrenceParams` bag
//! - [`rule`] -- descriptor to canonical RRULE string, and back
//! - [`expander`] -- RRULE, anchor and window to a lazy sequence of instants
//! - [`generator`] -- expand a specification and persist new occurrences
//! - [`store`] -- `OccurrenceStore` trait and the in-memory store
//! - [`owner`] -- owner-level fan-out and the read-only `Events` view
//! - [`config`] -- creation-time generation policy
//! - [`error`] -- Error types

pub mod config;
pub mod descriptor;
pub mod error;
pub mod expander;
pub mod generator;
pub mod owner;
pub mod rule;
pub mod specification;
pub mod store;

pub use config::GenerationPolicy;
pub use descriptor::{
    DaySymbol, MonthlySelector, Ordinal, Position, Recurrence, RecurrenceParams, Target,
};
pub use error::{FieldError, RecurrenceError, StoreError, ValidationErrors};
pub use expander::{expand, expand_rule, Expansion, Window};
pub use generator::{generate, GenerateRequest};
pub use owner::{CreateOptions, EventOwner, Events};
pub use rule::{compile, compile_params, RecurrenceRule};
pub use specification::{OwnerId, Specification, SpecificationId};
pub use store::{MemoryStore, NewOccurrence, Occurrence, OccurrenceStore};
