//! Mutation events delivered by the host dispatcher.
//!
//! # Invariants
//! - `changed_fields` lists the fields carried by `target`; for a create it is
//!   the set of fields supplied on creation.
//! - `entity_kind` is the host's logical name and may name kinds this engine
//!   does not know.

use crate::model::entity::{EntityKind, FieldSet};
use crate::model::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Operation kind reported by the host pipeline.
///
/// Travels as the plain message name and is read back through `parse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Create,
    Update,
    /// Any other host message (delete, assign, ...), lowercased.
    Other(String),
}

impl Operation {
    /// Parses a host message name, case-insensitively.
    pub fn parse(message: &str) -> Self {
        match message.trim().to_ascii_lowercase().as_str() {
            "create" => Self::Create,
            "update" => Self::Update,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Operation> for String {
    fn from(value: Operation) -> Self {
        value.to_string()
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// One mutation observed on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub operation: Operation,
    pub entity_kind: String,
    pub changed_fields: FieldSet,
    /// Partial snapshot of the mutated record, if the host supplied one.
    pub target: Option<Record>,
}

impl MutationEvent {
    /// Builds a create event; every populated field counts as supplied.
    pub fn created(record: Record) -> Self {
        let changed_fields = record.populated_fields();
        Self::for_record(Operation::Create, record, changed_fields)
    }

    /// Builds an update event carrying `changed_fields` of `record`.
    pub fn updated(record: Record, changed_fields: FieldSet) -> Self {
        Self::for_record(Operation::Update, record, changed_fields)
    }

    fn for_record(operation: Operation, record: Record, changed_fields: FieldSet) -> Self {
        Self {
            operation,
            entity_kind: record.kind().logical_name().to_string(),
            changed_fields,
            target: Some(record),
        }
    }

    /// Resolves the host logical name to a known entity kind.
    pub fn entity(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.entity_kind)
    }
}
