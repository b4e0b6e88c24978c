//! Change-triggered rules and their shared execution contract.
//!
//! # Responsibility
//! - Define `Rule`: filter, fetch, compute, write against a `RecordStore`.
//! - Define outcomes, skip reasons and the fatal `RuleError`.
//!
//! # Invariants
//! - A filtered-out event returns `Ok(RuleOutcome::Skipped(..))` and makes no
//!   store call.
//! - Rules hold no mutable state between invocations.
//! - Fatal errors always name the failing rule.

use crate::model::entity::{EntityKind, Field};
use crate::model::event::{MutationEvent, Operation};
use crate::model::grade::Gpa;
use crate::model::record::RecordId;
use crate::store::{RecordStore, StoreError};
use log::{debug, error};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address_sync;
pub mod aggregation;
pub mod engine;
pub mod grade_credits;
pub mod materials;

pub type RuleResult<T> = Result<T, RuleError>;

/// One rule reacting to mutation events.
pub trait Rule: Send + Sync {
    /// Stable, unique rule name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Runs the rule for one event.
    ///
    /// # Errors
    /// Returns `RuleError` only for failures the host must treat as an
    /// aborted operation.
    fn execute(&self, store: &dyn RecordStore, event: &MutationEvent) -> RuleResult<RuleOutcome>;
}

/// Why a rule returned without doing any work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Operation kind is not one the rule reacts to.
    Operation(String),
    /// Entity kind is not the rule's trigger entity.
    Entity(String),
    /// The event carried no target record of the expected kind.
    MissingTarget,
    /// The payload does not touch the rule's trigger field.
    FieldNotChanged(Field),
    /// A foreign key the rule needs is unset.
    MissingReference(Field),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operation(name) => write!(f, "operation `{name}` not handled"),
            Self::Entity(name) => write!(f, "entity `{name}` not handled"),
            Self::MissingTarget => write!(f, "no target record in event"),
            Self::FieldNotChanged(field) => write!(f, "`{field}` not in payload"),
            Self::MissingReference(field) => write!(f, "`{field}` reference is unset"),
        }
    }
}

/// Result of a fan-out over dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutTally {
    pub attempted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Values written by the grade-credits rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeOutcome {
    pub enrollment_id: RecordId,
    pub passed: bool,
    pub credits_earned: u32,
    /// `None` when the enrollment has no student to aggregate for.
    pub student: Option<StudentUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentUpdate {
    pub student_id: RecordId,
    pub total_credits: u32,
    pub gpa: Gpa,
}

/// What a rule did for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Skipped(SkipReason),
    AddressSynced(FanOutTally),
    GradeApplied(GradeOutcome),
    MaterialsListed { enrollment_id: RecordId, summary: String },
}

impl RuleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Fatal rule failure, surfaced to the host as an aborted operation.
#[derive(Debug)]
pub struct RuleError {
    rule: &'static str,
    source: StoreError,
}

impl RuleError {
    pub fn new(rule: &'static str, source: StoreError) -> Self {
        Self { rule, source }
    }

    pub fn rule(&self) -> &'static str {
        self.rule
    }

    pub fn store_error(&self) -> &StoreError {
        &self.source
    }
}

impl Display for RuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "an error occurred in {}: {}", self.rule, self.source)
    }
}

impl Error for RuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Shared applicability checks for operation and entity kind.
fn match_target(
    event: &MutationEvent,
    accepts: impl Fn(&Operation) -> bool,
    entity: EntityKind,
) -> Result<(), SkipReason> {
    if !accepts(&event.operation) {
        return Err(SkipReason::Operation(event.operation.to_string()));
    }
    if event.entity() != Some(entity) {
        return Err(SkipReason::Entity(event.entity_kind.clone()));
    }
    Ok(())
}

/// Logs a skip decision and wraps it as an outcome.
fn skipped(rule: &'static str, reason: SkipReason) -> RuleOutcome {
    debug!("event=rule_skip module=rules status=skip rule={rule} reason=\"{reason}\"");
    RuleOutcome::Skipped(reason)
}

/// Logs a fatal failure and wraps it with the rule name.
fn fatal(rule: &'static str, err: impl Into<StoreError>) -> RuleError {
    let err = err.into();
    error!("event=rule_failed module=rules status=error rule={rule} error={err}");
    RuleError::new(rule, err)
}
