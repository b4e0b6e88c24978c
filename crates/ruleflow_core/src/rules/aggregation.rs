//! Student aggregate calculator.
//!
//! Pure functions; no store access. The grade-credits rule gathers inputs and
//! writes the result.
//!
//! # Invariants
//! - `total_credits` sums `credits_earned` of passed enrollments only.
//! - GPA is `round2(Σ points·credits / Σ credits)` over graded enrollments
//!   whose course was resolved, or zero when no credits were attempted.
//! - Rounding is half-to-even on the exact quotient.

use crate::model::grade::{Gpa, Grade, PASSING_GRADE};

/// One enrollment as seen by the aggregate recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedEnrollment {
    pub passed: bool,
    pub credits_earned: u32,
    pub grade: Option<Grade>,
    /// Credits of the referenced course, when the grade counts toward GPA.
    pub course_credits: Option<u32>,
}

/// Aggregates written to the student record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentStats {
    pub total_credits: u32,
    pub attempted_credits: u32,
    pub gpa: Gpa,
}

/// Grade points in half-point units (`8` == 4.0).
pub fn grade_half_points(grade: Grade) -> u32 {
    match grade.value() {
        90..=u8::MAX => 8,
        80..=89 => 6,
        70..=79 => 4,
        60..=69 => 2,
        PASSING_GRADE..=59 => 1,
        _ => 0,
    }
}

/// Grade points on the 0.0–4.0 scale.
pub fn grade_points(grade: Grade) -> f64 {
    f64::from(grade_half_points(grade)) / 2.0
}

/// Running sums for one student.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsAccumulator {
    total_credits: u64,
    attempted_credits: u64,
    weighted_half_points: u64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, enrollment: &GradedEnrollment) {
        if enrollment.passed {
            self.total_credits += u64::from(enrollment.credits_earned);
        }
        if let (Some(grade), Some(credits)) = (enrollment.grade, enrollment.course_credits) {
            self.weighted_half_points += u64::from(grade_half_points(grade)) * u64::from(credits);
            self.attempted_credits += u64::from(credits);
        }
    }

    pub fn finish(&self) -> StudentStats {
        StudentStats {
            total_credits: saturate(self.total_credits),
            attempted_credits: saturate(self.attempted_credits),
            gpa: weighted_average(self.weighted_half_points, self.attempted_credits),
        }
    }
}

/// Computes a student's aggregates over the full set of enrollments.
pub fn aggregate<'a>(enrollments: impl IntoIterator<Item = &'a GradedEnrollment>) -> StudentStats {
    let mut accumulator = StatsAccumulator::new();
    for enrollment in enrollments {
        accumulator.add(enrollment);
    }
    accumulator.finish()
}

fn weighted_average(weighted_half_points: u64, attempted_credits: u64) -> Gpa {
    if attempted_credits == 0 {
        return Gpa::ZERO;
    }
    // hundredths = weighted_half_points * 100 / (2 * attempted)
    let numerator = weighted_half_points * 100;
    let denominator = attempted_credits * 2;
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient % 2),
        std::cmp::Ordering::Less => quotient,
    };
    Gpa::from_hundredths(saturate(rounded))
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
