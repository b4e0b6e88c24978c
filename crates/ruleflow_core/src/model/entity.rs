//! Entity kinds and field identifiers.
//!
//! # Responsibility
//! - Name every entity kind the engine understands, with its host logical name.
//! - Name every field, replacing string-keyed attribute access.
//!
//! # Invariants
//! - `EntityKind::parse(kind.logical_name()) == Some(kind)` for every kind.
//! - `Field::name()` doubles as the storage column name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Set of fields carried by a partial record, a projection or a patch.
pub type FieldSet = BTreeSet<Field>;

/// Entity kinds known to the rule engine.
///
/// Serialized under the host logical name, same as `logical_name()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Account-like owner of dependents.
    #[serde(rename = "account")]
    Parent,
    /// Contact-like record mirroring its parent's address.
    #[serde(rename = "contact")]
    Dependent,
    /// Registration of one student in one course.
    #[serde(rename = "registration")]
    Enrollment,
    Course,
    Material,
    Student,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Parent,
        EntityKind::Dependent,
        EntityKind::Enrollment,
        EntityKind::Course,
        EntityKind::Material,
        EntityKind::Student,
    ];

    /// Host-facing logical name used in mutation events.
    pub fn logical_name(self) -> &'static str {
        match self {
            Self::Parent => "account",
            Self::Dependent => "contact",
            Self::Enrollment => "registration",
            Self::Course => "course",
            Self::Material => "material",
            Self::Student => "student",
        }
    }

    /// Resolves a host logical name. Matching is exact after trimming.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.logical_name() == trimmed)
    }

    /// Fields that belong to this entity kind, excluding the id.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::Parent => &[Field::Address],
            Self::Dependent => &[Field::ParentId, Field::Address],
            Self::Enrollment => &[
                Field::StudentId,
                Field::CourseId,
                Field::Grade,
                Field::Passed,
                Field::CreditsEarned,
                Field::MaterialsNeeded,
            ],
            Self::Course => &[Field::Credits],
            Self::Material => &[Field::CourseId, Field::Name],
            Self::Student => &[Field::TotalCredits, Field::Gpa],
        }
    }

    /// Returns the full field set for this kind.
    pub fn all_fields(self) -> FieldSet {
        self.fields().iter().copied().collect()
    }

    /// Returns whether `field` belongs to this kind.
    pub fn has_field(self, field: Field) -> bool {
        self.fields().contains(&field)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// Typed field identifiers across all entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Address,
    ParentId,
    StudentId,
    CourseId,
    Grade,
    Passed,
    CreditsEarned,
    MaterialsNeeded,
    Credits,
    Name,
    TotalCredits,
    Gpa,
}

impl Field {
    /// Stable snake_case name, also used as the storage column.
    pub fn name(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::ParentId => "parent_id",
            Self::StudentId => "student_id",
            Self::CourseId => "course_id",
            Self::Grade => "grade",
            Self::Passed => "passed",
            Self::CreditsEarned => "credits_earned",
            Self::MaterialsNeeded => "materials_needed",
            Self::Credits => "credits",
            Self::Name => "name",
            Self::TotalCredits => "total_credits",
            Self::Gpa => "gpa",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
