//! Change-triggered derived-state recomputation rules.
//! This crate owns every derived field the rules write.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod rules;
pub mod store;

pub use config::{ConfigError, RuleConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{EntityKind, Field, FieldSet};
pub use model::event::{MutationEvent, Operation};
pub use model::grade::{Gpa, Grade, ModelValidationError, PASSING_GRADE};
pub use model::record::{
    CourseRecord, DependentRecord, EnrollmentRecord, MaterialRecord, ParentRecord, Record,
    RecordId, RecordPatch, StudentRecord, UnexpectedKind,
};
pub use rules::address_sync::{AddressSyncRule, ADDRESS_SYNC_RULE};
pub use rules::aggregation::{aggregate, grade_points, GradedEnrollment, StudentStats};
pub use rules::engine::{DispatchReport, EngineError, RuleEngine, RuleRun};
pub use rules::grade_credits::{GradeCreditsRule, GRADE_CREDITS_RULE};
pub use rules::materials::{MaterialsListRule, MATERIALS_LIST_RULE};
pub use rules::{
    FanOutTally, GradeOutcome, Rule, RuleError, RuleOutcome, RuleResult, SkipReason,
    StudentUpdate,
};
pub use store::sqlite::SqliteRecordStore;
pub use store::{
    retrieve_all, PageRequest, PageToken, RecordPage, RecordQuery, RecordStore, SortDirection,
    StoreError, StoreResult,
};

/// Minimal health-check API for host integration probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
