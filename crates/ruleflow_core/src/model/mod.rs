//! Typed domain model for rule inputs and outputs.
//!
//! # Responsibility
//! - Define one record shape per entity kind the rules read or write.
//! - Carry partial-record presence as an explicit `FieldSet`.
//! - Define the mutation event delivered by the host dispatcher.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - A field set only contains fields that belong to the record's entity kind.
//! - Derived fields are only ever written through `RecordPatch` values.

pub mod entity;
pub mod event;
pub mod grade;
pub mod record;
