//! Enrollment result derivation with cascading student aggregates.
//!
//! # Responsibility
//! - Derive `passed` and `credits_earned` from an enrollment's grade.
//! - Recompute the owning student's `total_credits` and `gpa` over all of the
//!   student's enrollments.
//!
//! # Invariants
//! - `passed == grade >= PASSING_GRADE`; a null grade is never passed.
//! - `credits_earned` comes from a fresh course read, never from a cache.
//! - Any store failure aborts the invocation; no partial tally exists here.
//!
//! # Known property
//! Concurrent grade changes for one student may race; the last student write
//! wins and can reflect only one of them.

use crate::config::RuleConfig;
use crate::model::entity::{EntityKind, Field, FieldSet};
use crate::model::event::{MutationEvent, Operation};
use crate::model::record::{EnrollmentRecord, Record, RecordId, RecordPatch};
use crate::rules::aggregation::{GradedEnrollment, StatsAccumulator};
use crate::rules::{
    fatal, match_target, skipped, GradeOutcome, Rule, RuleOutcome, RuleResult, SkipReason,
    StudentUpdate,
};
use crate::store::{retrieve_all, RecordQuery, RecordStore, StoreResult};
use log::{debug, info};

pub const GRADE_CREDITS_RULE: &str = "GradeCreditsRule";

/// Derives enrollment results and student aggregates from grades.
#[derive(Debug, Clone)]
pub struct GradeCreditsRule {
    page_size: u32,
}

impl GradeCreditsRule {
    pub fn new(config: &RuleConfig) -> Self {
        Self {
            page_size: config.page_size,
        }
    }

    fn trigger<'e>(&self, event: &'e MutationEvent) -> Result<&'e EnrollmentRecord, SkipReason> {
        match_target(
            event,
            |op| matches!(op, Operation::Create | Operation::Update),
            EntityKind::Enrollment,
        )?;
        let Some(Record::Enrollment(enrollment)) = event.target.as_ref() else {
            return Err(SkipReason::MissingTarget);
        };
        if event.operation == Operation::Update && !event.changed_fields.contains(&Field::Grade) {
            return Err(SkipReason::FieldNotChanged(Field::Grade));
        }
        Ok(enrollment)
    }

    fn apply(
        &self,
        store: &dyn RecordStore,
        event: &MutationEvent,
        target: &EnrollmentRecord,
    ) -> StoreResult<GradeOutcome> {
        let stored = store
            .retrieve(
                EntityKind::Enrollment,
                target.id,
                &FieldSet::from([Field::StudentId, Field::CourseId, Field::Grade]),
            )?
            .into_enrollment()?;

        let grade = if event.changed_fields.contains(&Field::Grade) {
            target.grade
        } else {
            stored.grade
        };

        let (passed, credits_earned) = match grade {
            None => {
                debug!("event=grade_resolved module=rules rule={GRADE_CREDITS_RULE} grade=NULL passed=false");
                (false, 0)
            }
            Some(grade) => {
                let passed = grade.is_passing();
                debug!(
                    "event=grade_resolved module=rules rule={GRADE_CREDITS_RULE} grade={grade} passed={passed}"
                );
                let credits = if passed {
                    self.earned_credits(store, stored.course_id)?
                } else {
                    0
                };
                (passed, credits)
            }
        };

        store.update(
            target.id,
            &RecordPatch::EnrollmentResult {
                passed,
                credits_earned,
            },
        )?;

        let student = match stored.student_id {
            Some(student_id) => Some(self.recalculate_student(store, student_id)?),
            None => {
                info!(
                    "event=student_skip module=rules status=skip rule={GRADE_CREDITS_RULE} enrollment={} reason=no_student",
                    target.id
                );
                None
            }
        };

        Ok(GradeOutcome {
            enrollment_id: target.id,
            passed,
            credits_earned,
            student,
        })
    }

    fn earned_credits(&self, store: &dyn RecordStore, course_id: Option<RecordId>) -> StoreResult<u32> {
        let Some(course_id) = course_id else {
            info!(
                "event=course_missing module=rules status=skip rule={GRADE_CREDITS_RULE} credits=0"
            );
            return Ok(0);
        };
        course_credits(store, course_id)
    }

    fn recalculate_student(
        &self,
        store: &dyn RecordStore,
        student_id: RecordId,
    ) -> StoreResult<StudentUpdate> {
        let query = RecordQuery::new(EntityKind::Enrollment)
            .columns([
                Field::CreditsEarned,
                Field::Grade,
                Field::Passed,
                Field::CourseId,
            ])
            .filter_eq(Field::StudentId, student_id);
        let records = retrieve_all(store, &query, self.page_size)?;
        debug!(
            "event=student_enrollments module=rules rule={GRADE_CREDITS_RULE} student={student_id} count={}",
            records.len()
        );

        let mut accumulator = StatsAccumulator::new();
        for record in records {
            let enrollment = record.into_enrollment()?;
            // Credits for GPA are re-read per enrollment, even for the one just written.
            let course_credits = match (enrollment.grade, enrollment.course_id) {
                (Some(_), Some(course_id)) => Some(course_credits(store, course_id)?),
                _ => None,
            };
            accumulator.add(&GradedEnrollment {
                passed: enrollment.passed == Some(true),
                credits_earned: enrollment.credits_earned.unwrap_or(0),
                grade: enrollment.grade,
                course_credits,
            });
        }

        let stats = accumulator.finish();
        store.update(
            student_id,
            &RecordPatch::StudentStats {
                total_credits: stats.total_credits,
                gpa: stats.gpa,
            },
        )?;
        info!(
            "event=student_stats module=rules status=ok rule={GRADE_CREDITS_RULE} student={student_id} total_credits={} attempted_credits={} gpa={}",
            stats.total_credits, stats.attempted_credits, stats.gpa
        );

        Ok(StudentUpdate {
            student_id,
            total_credits: stats.total_credits,
            gpa: stats.gpa,
        })
    }
}

fn course_credits(store: &dyn RecordStore, course_id: RecordId) -> StoreResult<u32> {
    let course = store
        .retrieve(
            EntityKind::Course,
            course_id,
            &FieldSet::from([Field::Credits]),
        )?
        .into_course()?;
    Ok(course.credits.unwrap_or(0))
}

impl Rule for GradeCreditsRule {
    fn name(&self) -> &'static str {
        GRADE_CREDITS_RULE
    }

    fn execute(&self, store: &dyn RecordStore, event: &MutationEvent) -> RuleResult<RuleOutcome> {
        let target = match self.trigger(event) {
            Ok(target) => target,
            Err(reason) => return Ok(skipped(GRADE_CREDITS_RULE, reason)),
        };

        info!(
            "event=rule_start module=rules status=start rule={GRADE_CREDITS_RULE} enrollment={} operation={}",
            target.id, event.operation
        );
        let outcome = self
            .apply(store, event, target)
            .map_err(|err| fatal(GRADE_CREDITS_RULE, err))?;
        info!(
            "event=rule_done module=rules status=ok rule={GRADE_CREDITS_RULE} enrollment={} passed={} credits_earned={}",
            outcome.enrollment_id, outcome.passed, outcome.credits_earned
        );
        Ok(RuleOutcome::GradeApplied(outcome))
    }
}
