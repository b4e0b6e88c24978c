//! Typed records and partial updates.
//!
//! # Responsibility
//! - Define one struct per entity kind with optional fields, so a projected
//!   read or a partial payload can leave fields unset.
//! - Define `RecordPatch`, the only shape in which rules write.
//!
//! # Invariants
//! - `Record::kind()` always matches the wrapped struct.
//! - `RecordPatch::fields()` names exactly the fields the patch writes.

use crate::model::entity::{EntityKind, Field, FieldSet};
use crate::model::grade::{Gpa, Grade};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of any record in the store.
pub type RecordId = Uuid;

/// Owner record whose address fans out to dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRecord {
    pub id: RecordId,
    pub address: Option<String>,
}

impl ParentRecord {
    pub fn new(address: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
        }
    }
}

/// Child record mirroring its parent's address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentRecord {
    pub id: RecordId,
    pub parent_id: Option<RecordId>,
    pub address: Option<String>,
}

impl DependentRecord {
    pub fn new(parent_id: Option<RecordId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            address: None,
        }
    }
}

/// Registration of a student in a course.
///
/// `passed`, `credits_earned` and `materials_needed` are derived and owned by
/// the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub id: RecordId,
    pub student_id: Option<RecordId>,
    pub course_id: Option<RecordId>,
    pub grade: Option<Grade>,
    pub passed: Option<bool>,
    pub credits_earned: Option<u32>,
    pub materials_needed: Option<String>,
}

impl EnrollmentRecord {
    /// Creates an enrollment with a generated id and no grade.
    pub fn new(student_id: Option<RecordId>, course_id: Option<RecordId>) -> Self {
        Self::with_id(Uuid::new_v4(), student_id, course_id)
    }

    pub fn with_id(
        id: RecordId,
        student_id: Option<RecordId>,
        course_id: Option<RecordId>,
    ) -> Self {
        Self {
            id,
            student_id,
            course_id,
            grade: None,
            passed: None,
            credits_earned: None,
            materials_needed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: RecordId,
    pub credits: Option<u32>,
}

impl CourseRecord {
    pub fn new(credits: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            credits: Some(credits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: RecordId,
    pub course_id: Option<RecordId>,
    pub name: Option<String>,
}

impl MaterialRecord {
    pub fn new(course_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id: Some(course_id),
            name: Some(name.into()),
        }
    }
}

/// Student aggregate; both fields are derived from the student's enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: RecordId,
    pub total_credits: Option<u32>,
    pub gpa: Option<Gpa>,
}

impl StudentRecord {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            total_credits: None,
            gpa: None,
        }
    }
}

impl Default for StudentRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Any record, tagged with its entity kind's host logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Record {
    #[serde(rename = "account")]
    Parent(ParentRecord),
    #[serde(rename = "contact")]
    Dependent(DependentRecord),
    #[serde(rename = "registration")]
    Enrollment(EnrollmentRecord),
    Course(CourseRecord),
    Material(MaterialRecord),
    Student(StudentRecord),
}

/// A record did not have the entity kind its reader expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnexpectedKind {
    pub expected: EntityKind,
    pub actual: EntityKind,
}

impl Display for UnexpectedKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected a `{}` record, got `{}`",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for UnexpectedKind {}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Parent(_) => EntityKind::Parent,
            Self::Dependent(_) => EntityKind::Dependent,
            Self::Enrollment(_) => EntityKind::Enrollment,
            Self::Course(_) => EntityKind::Course,
            Self::Material(_) => EntityKind::Material,
            Self::Student(_) => EntityKind::Student,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Parent(record) => record.id,
            Self::Dependent(record) => record.id,
            Self::Enrollment(record) => record.id,
            Self::Course(record) => record.id,
            Self::Material(record) => record.id,
            Self::Student(record) => record.id,
        }
    }

    /// Fields holding a value (not `None`) on this record.
    ///
    /// Useful for hosts building a create event from a full snapshot.
    pub fn populated_fields(&self) -> FieldSet {
        let mut fields = FieldSet::new();
        let mut mark = |field: Field, present: bool| {
            if present {
                fields.insert(field);
            }
        };
        match self {
            Self::Parent(record) => mark(Field::Address, record.address.is_some()),
            Self::Dependent(record) => {
                mark(Field::ParentId, record.parent_id.is_some());
                mark(Field::Address, record.address.is_some());
            }
            Self::Enrollment(record) => {
                mark(Field::StudentId, record.student_id.is_some());
                mark(Field::CourseId, record.course_id.is_some());
                mark(Field::Grade, record.grade.is_some());
                mark(Field::Passed, record.passed.is_some());
                mark(Field::CreditsEarned, record.credits_earned.is_some());
                mark(Field::MaterialsNeeded, record.materials_needed.is_some());
            }
            Self::Course(record) => mark(Field::Credits, record.credits.is_some()),
            Self::Material(record) => {
                mark(Field::CourseId, record.course_id.is_some());
                mark(Field::Name, record.name.is_some());
            }
            Self::Student(record) => {
                mark(Field::TotalCredits, record.total_credits.is_some());
                mark(Field::Gpa, record.gpa.is_some());
            }
        }
        fields
    }

    pub fn into_dependent(self) -> Result<DependentRecord, UnexpectedKind> {
        match self {
            Self::Dependent(record) => Ok(record),
            other => Err(other.mismatch(EntityKind::Dependent)),
        }
    }

    pub fn into_enrollment(self) -> Result<EnrollmentRecord, UnexpectedKind> {
        match self {
            Self::Enrollment(record) => Ok(record),
            other => Err(other.mismatch(EntityKind::Enrollment)),
        }
    }

    pub fn into_course(self) -> Result<CourseRecord, UnexpectedKind> {
        match self {
            Self::Course(record) => Ok(record),
            other => Err(other.mismatch(EntityKind::Course)),
        }
    }

    pub fn into_material(self) -> Result<MaterialRecord, UnexpectedKind> {
        match self {
            Self::Material(record) => Ok(record),
            other => Err(other.mismatch(EntityKind::Material)),
        }
    }

    pub fn into_student(self) -> Result<StudentRecord, UnexpectedKind> {
        match self {
            Self::Student(record) => Ok(record),
            other => Err(other.mismatch(EntityKind::Student)),
        }
    }

    fn mismatch(&self, expected: EntityKind) -> UnexpectedKind {
        UnexpectedKind {
            expected,
            actual: self.kind(),
        }
    }
}

/// Partial update issued by a rule.
///
/// Each variant writes only the fields it names; every other field on the
/// target record is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "patch", rename_all = "snake_case")]
pub enum RecordPatch {
    DependentAddress { address: Option<String> },
    EnrollmentResult { passed: bool, credits_earned: u32 },
    EnrollmentMaterials { materials_needed: String },
    StudentStats { total_credits: u32, gpa: Gpa },
}

impl RecordPatch {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::DependentAddress { .. } => EntityKind::Dependent,
            Self::EnrollmentResult { .. } | Self::EnrollmentMaterials { .. } => {
                EntityKind::Enrollment
            }
            Self::StudentStats { .. } => EntityKind::Student,
        }
    }

    pub fn fields(&self) -> FieldSet {
        let fields: &[Field] = match self {
            Self::DependentAddress { .. } => &[Field::Address],
            Self::EnrollmentResult { .. } => &[Field::Passed, Field::CreditsEarned],
            Self::EnrollmentMaterials { .. } => &[Field::MaterialsNeeded],
            Self::StudentStats { .. } => &[Field::TotalCredits, Field::Gpa],
        };
        fields.iter().copied().collect()
    }
}
