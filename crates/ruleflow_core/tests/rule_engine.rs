mod common;

use common::{load_address, load_enrollment, seed, setup, RecordingStore};
use pretty_assertions::assert_eq;
use ruleflow_core::{
    AddressSyncRule, ConfigError, CourseRecord, DependentRecord, EngineError, EnrollmentRecord,
    EntityKind, FanOutTally, Grade, MaterialRecord, MutationEvent, Operation, ParentRecord,
    Record, RuleConfig, RuleEngine, RuleOutcome, SkipReason, SqliteRecordStore, StudentRecord,
    ADDRESS_SYNC_RULE, GRADE_CREDITS_RULE, MATERIALS_LIST_RULE,
};

#[test]
fn default_engine_registers_rules_in_order() {
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();

    assert_eq!(
        engine.rule_names(),
        vec![ADDRESS_SYNC_RULE, GRADE_CREDITS_RULE, MATERIALS_LIST_RULE]
    );
    assert_eq!(engine.len(), 3);
    assert!(!engine.is_empty());
}

#[test]
fn duplicate_rule_names_are_rejected() {
    let mut engine = RuleEngine::new();
    engine
        .register(Box::new(AddressSyncRule::new(&RuleConfig::default())))
        .unwrap();

    let err = engine
        .register(Box::new(AddressSyncRule::new(&RuleConfig::default())))
        .unwrap_err();

    assert_eq!(err, EngineError::DuplicateRule(ADDRESS_SYNC_RULE.to_string()));
    assert_eq!(engine.len(), 1);
}

#[test]
fn invalid_config_is_rejected_before_rules_are_built() {
    let config = RuleConfig {
        page_size: 0,
        ..RuleConfig::default()
    };

    let err = RuleEngine::with_default_rules(&config).err().unwrap();

    assert_eq!(
        err,
        EngineError::InvalidConfig(ConfigError::PageSizeOutOfRange(0))
    );
}

#[test]
fn enrollment_create_runs_grade_and_materials_rules() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let student = StudentRecord::new();
    let course = CourseRecord::new(4);
    let mut enrollment = EnrollmentRecord::new(Some(student.id), Some(course.id));
    enrollment.grade = Some(Grade::new(68).unwrap());
    seed(
        &store,
        [
            Record::Student(student),
            Record::Course(course.clone()),
            Record::Material(MaterialRecord::new(course.id, "Goggles")),
            Record::Enrollment(enrollment.clone()),
        ],
    );
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();

    let report = engine
        .dispatch(&store, &MutationEvent::created(Record::Enrollment(enrollment.clone())))
        .unwrap();

    assert_eq!(report.runs.len(), 3);
    assert_eq!(report.applied_count(), 2);
    assert_eq!(
        report.outcome(ADDRESS_SYNC_RULE),
        Some(&RuleOutcome::Skipped(SkipReason::Operation(
            "create".to_string()
        )))
    );
    assert!(matches!(
        report.outcome(GRADE_CREDITS_RULE),
        Some(RuleOutcome::GradeApplied(_))
    ));
    let stored = load_enrollment(&store, enrollment.id);
    assert_eq!(stored.passed, Some(true));
    assert_eq!(stored.credits_earned, Some(4));
    assert_eq!(stored.materials_needed.as_deref(), Some("Goggles"));
}

#[test]
fn fatal_error_stops_dispatch_but_keeps_earlier_writes() {
    let conn = setup();
    let sqlite = SqliteRecordStore::try_new(&conn).unwrap();
    let course = CourseRecord::new(2);
    let mut enrollment = EnrollmentRecord::new(None, Some(course.id));
    enrollment.grade = Some(Grade::new(30).unwrap());
    seed(
        &sqlite,
        [
            Record::Course(course),
            Record::Enrollment(enrollment.clone()),
        ],
    );
    let store = RecordingStore::new(&sqlite).fail_reads_of(EntityKind::Material);
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();

    let err = engine
        .dispatch(&store, &MutationEvent::created(Record::Enrollment(enrollment.clone())))
        .unwrap_err();

    assert_eq!(err.rule(), MATERIALS_LIST_RULE);
    let stored = load_enrollment(&sqlite, enrollment.id);
    assert_eq!(stored.passed, Some(false));
    assert_eq!(stored.materials_needed, None);
}

#[test]
fn unknown_entity_is_skipped_by_every_rule() {
    let conn = setup();
    let sqlite = SqliteRecordStore::try_new(&conn).unwrap();
    let store = RecordingStore::new(&sqlite);
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();
    let event = MutationEvent {
        operation: Operation::Update,
        entity_kind: "lead".to_string(),
        changed_fields: Default::default(),
        target: None,
    };

    let report = engine.dispatch(&store, &event).unwrap();

    assert_eq!(report.applied_count(), 0);
    assert_eq!(
        report.outcome(GRADE_CREDITS_RULE),
        Some(&RuleOutcome::Skipped(SkipReason::Entity("lead".to_string())))
    );
    assert_eq!(
        report.outcome(MATERIALS_LIST_RULE),
        Some(&RuleOutcome::Skipped(SkipReason::Operation(
            "update".to_string()
        )))
    );
    assert_eq!(store.calls(), 0);
}

#[test]
fn host_event_json_dispatches_address_sync() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let parent = ParentRecord::new(None);
    let dependent = DependentRecord::new(Some(parent.id));
    seed(
        &store,
        [
            Record::Parent(parent.clone()),
            Record::Dependent(dependent.clone()),
        ],
    );
    let payload = serde_json::json!({
        "operation": "Update",
        "entity_kind": "account",
        "changed_fields": ["address"],
        "target": {
            "entity": "account",
            "id": parent.id,
            "address": "5 Bay Road"
        }
    });
    let event: MutationEvent = serde_json::from_value(payload).unwrap();
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();

    let report = engine.dispatch(&store, &event).unwrap();

    assert_eq!(
        report.outcome(ADDRESS_SYNC_RULE),
        Some(&RuleOutcome::AddressSynced(FanOutTally {
            attempted: 1,
            updated: 1,
            failed: 0,
        }))
    );
    assert_eq!(
        load_address(&store, dependent.id),
        Some("5 Bay Road".to_string())
    );
}

#[test]
fn host_delete_event_is_skipped_by_every_rule() {
    let conn = setup();
    let sqlite = SqliteRecordStore::try_new(&conn).unwrap();
    let parent = ParentRecord::new(Some("5 Bay Road".to_string()));
    seed(
        &sqlite,
        [
            Record::Parent(parent.clone()),
            Record::Dependent(DependentRecord::new(Some(parent.id))),
        ],
    );
    let store = RecordingStore::new(&sqlite);
    let payload = serde_json::json!({
        "operation": "delete",
        "entity_kind": "account",
        "changed_fields": ["address"],
        "target": {
            "entity": "account",
            "id": parent.id,
            "address": null
        }
    });
    let event: MutationEvent = serde_json::from_value(payload).unwrap();
    let engine = RuleEngine::with_default_rules(&RuleConfig::default()).unwrap();

    let report = engine.dispatch(&store, &event).unwrap();

    assert_eq!(event.operation, Operation::Other("delete".to_string()));
    assert_eq!(report.runs.len(), 3);
    assert!(report.runs.iter().all(|run| run.outcome
        == RuleOutcome::Skipped(SkipReason::Operation("delete".to_string()))));
    assert_eq!(store.calls(), 0);
}
