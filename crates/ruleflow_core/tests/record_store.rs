mod common;

use common::{load_enrollment, load_student, seed, setup};
use pretty_assertions::assert_eq;
use ruleflow_core::{
    retrieve_all, CourseRecord, DependentRecord, EnrollmentRecord, EntityKind, Field, FieldSet,
    Gpa, Grade, MaterialRecord, PageRequest, PageToken, ParentRecord, Record, RecordPatch,
    RecordQuery, RecordStore, SortDirection, SqliteRecordStore, StoreError, StudentRecord,
};
use rusqlite::params;
use uuid::Uuid;

#[test]
fn retrieve_returns_only_requested_fields() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let student = StudentRecord::new();
    let course = CourseRecord::new(3);
    let mut enrollment = EnrollmentRecord::new(Some(student.id), Some(course.id));
    enrollment.grade = Some(Grade::new(77).unwrap());
    enrollment.materials_needed = Some("Book".to_string());
    seed(
        &store,
        [
            Record::Student(student.clone()),
            Record::Course(course.clone()),
            Record::Enrollment(enrollment.clone()),
        ],
    );

    let projected = store
        .retrieve(
            EntityKind::Enrollment,
            enrollment.id,
            &FieldSet::from([Field::Grade, Field::CourseId]),
        )
        .unwrap()
        .into_enrollment()
        .unwrap();

    assert_eq!(projected.id, enrollment.id);
    assert_eq!(projected.grade, Some(Grade::new(77).unwrap()));
    assert_eq!(projected.course_id, Some(course.id));
    assert_eq!(projected.student_id, None);
    assert_eq!(projected.materials_needed, None);
}

#[test]
fn retrieve_missing_record_returns_not_found() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = store
        .retrieve(EntityKind::Course, missing, &FieldSet::from([Field::Credits]))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::NotFound { kind: EntityKind::Course, id } if id == missing
    ));
}

#[test]
fn retrieve_rejects_field_of_another_entity() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let course = CourseRecord::new(4);
    seed(&store, [Record::Course(course.clone())]);

    let err = store
        .retrieve(EntityKind::Course, course.id, &FieldSet::from([Field::Grade]))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::UnknownField {
            kind: EntityKind::Course,
            field: Field::Grade
        }
    ));
}

#[test]
fn retrieve_page_reports_continuation_until_last_page() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let parent = ParentRecord::new(None);
    seed(&store, [Record::Parent(parent.clone())]);
    seed(
        &store,
        (0..5).map(|_| Record::Dependent(DependentRecord::new(Some(parent.id)))),
    );
    let query = RecordQuery::new(EntityKind::Dependent).filter_eq(Field::ParentId, parent.id);

    let first = store.retrieve_page(&query, &PageRequest::first(2)).unwrap();
    assert_eq!(first.records.len(), 2);
    assert!(first.more_records);
    let token = first.continuation.clone().unwrap();

    let second = store
        .retrieve_page(&query, &PageRequest::first(2).next(token))
        .unwrap();
    assert_eq!(second.records.len(), 2);
    assert!(second.more_records);

    let all = retrieve_all(&store, &query, 2).unwrap();
    assert_eq!(all.len(), 5);
    let mut ids = all.iter().map(Record::id).collect::<Vec<_>>();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[test]
fn retrieve_page_exact_fit_has_no_continuation() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let course = CourseRecord::new(2);
    seed(&store, [Record::Course(course.clone())]);
    seed(
        &store,
        ["A", "B"].map(|name| Record::Material(MaterialRecord::new(course.id, name))),
    );
    let query = RecordQuery::new(EntityKind::Material).filter_eq(Field::CourseId, course.id);

    let page = store.retrieve_page(&query, &PageRequest::first(2)).unwrap();

    assert_eq!(page.records.len(), 2);
    assert!(!page.more_records);
    assert_eq!(page.continuation, None);
}

#[test]
fn retrieve_page_orders_names_case_insensitively() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let course = CourseRecord::new(2);
    seed(&store, [Record::Course(course.clone())]);
    seed(
        &store,
        ["pen", "Book", "notebook", "Atlas"]
            .map(|name| Record::Material(MaterialRecord::new(course.id, name))),
    );
    let query = RecordQuery::new(EntityKind::Material)
        .columns([Field::Name])
        .filter_eq(Field::CourseId, course.id)
        .order_by(Field::Name, SortDirection::Ascending);

    let names = retrieve_all(&store, &query, 3)
        .unwrap()
        .into_iter()
        .map(|record| record.into_material().unwrap().name.unwrap())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["Atlas", "Book", "notebook", "pen"]);
}

#[test]
fn retrieve_page_rejects_malformed_token() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let query = RecordQuery::new(EntityKind::Student);

    let err = store
        .retrieve_page(
            &query,
            &PageRequest::first(10).next(PageToken::new("not-a-number")),
        )
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidData(message) if message.contains("not-a-number")));
}

#[test]
fn update_writes_only_patched_fields() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let student = StudentRecord::new();
    let course = CourseRecord::new(3);
    let mut enrollment = EnrollmentRecord::new(Some(student.id), Some(course.id));
    enrollment.grade = Some(Grade::new(88).unwrap());
    enrollment.materials_needed = Some("Atlas".to_string());
    seed(
        &store,
        [
            Record::Student(student.clone()),
            Record::Course(course),
            Record::Enrollment(enrollment.clone()),
        ],
    );

    store
        .update(
            enrollment.id,
            &RecordPatch::EnrollmentResult {
                passed: true,
                credits_earned: 3,
            },
        )
        .unwrap();
    store
        .update(
            student.id,
            &RecordPatch::StudentStats {
                total_credits: 3,
                gpa: Gpa::from_hundredths(350),
            },
        )
        .unwrap();

    let stored = load_enrollment(&store, enrollment.id);
    assert_eq!(stored.passed, Some(true));
    assert_eq!(stored.credits_earned, Some(3));
    assert_eq!(stored.grade, enrollment.grade);
    assert_eq!(stored.materials_needed, Some("Atlas".to_string()));

    let stored_student = load_student(&store, student.id);
    assert_eq!(stored_student.total_credits, Some(3));
    assert_eq!(stored_student.gpa, Some(Gpa::from_hundredths(350)));
}

#[test]
fn update_of_missing_record_returns_not_found() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = store
        .update(
            missing,
            &RecordPatch::DependentAddress {
                address: Some("1 Main St".to_string()),
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::NotFound {
            kind: EntityKind::Dependent,
            ..
        }
    ));
}

#[test]
fn out_of_range_stored_grade_reads_as_absent() {
    let conn = setup();
    let store = SqliteRecordStore::try_new(&conn).unwrap();
    let enrollment = EnrollmentRecord::new(None, None);
    seed(&store, [Record::Enrollment(enrollment.clone())]);
    conn.execute(
        "UPDATE registrations SET grade = ?1 WHERE id = ?2;",
        params![140_i64, enrollment.id.to_string()],
    )
    .unwrap();

    let stored = load_enrollment(&store, enrollment.id);

    assert_eq!(stored.grade, None);
}
