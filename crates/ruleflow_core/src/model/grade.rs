//! Validated grade and fixed-point GPA values.
//!
//! # Invariants
//! - `Grade` is always within `0..=100`.
//! - `Gpa` is stored as an exact count of hundredths; no float arithmetic is
//!   involved in computing it.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Highest grade a record may carry.
pub const MAX_GRADE: i64 = 100;
/// Lowest grade that counts as passed and earns grade points.
pub const PASSING_GRADE: u8 = 51;

/// Validation failures for model value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    GradeOutOfRange(i64),
    NegativeCredits(i64),
    GpaOutOfRange(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GradeOutOfRange(value) => {
                write!(f, "grade `{value}` is outside 0..={MAX_GRADE}")
            }
            Self::NegativeCredits(value) => write!(f, "credits must not be negative, got `{value}`"),
            Self::GpaOutOfRange(value) => write!(f, "gpa `{value}` is not a valid decimal"),
        }
    }
}

impl Error for ModelValidationError {}

/// Enrollment grade on a 0..=100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Grade(u8);

impl Grade {
    /// Creates a grade, rejecting values outside `0..=100`.
    pub fn new(value: i64) -> Result<Self, ModelValidationError> {
        if (0..=MAX_GRADE).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ModelValidationError::GradeOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_GRADE
    }
}

impl TryFrom<i64> for Grade {
    type Error = ModelValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Grade> for i64 {
    fn from(value: Grade) -> Self {
        i64::from(value.0)
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grade point average with two fractional digits.
///
/// Serialized as the integer number of hundredths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gpa(u32);

impl Gpa {
    pub const ZERO: Gpa = Gpa(0);

    pub fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    /// Converts a stored decimal column back into hundredths.
    ///
    /// Rejects negative and non-finite values.
    pub fn from_decimal(value: f64) -> Result<Self, ModelValidationError> {
        let scaled = (value * 100.0).round();
        if !scaled.is_finite() || scaled < 0.0 || scaled > f64::from(u32::MAX) {
            return Err(ModelValidationError::GpaOutOfRange(value.to_string()));
        }
        Ok(Self(scaled as u32))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl Display for Gpa {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}
