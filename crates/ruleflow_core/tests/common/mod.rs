#![allow(dead_code)]

use ruleflow_core::db::open_db_in_memory;
use ruleflow_core::{
    EnrollmentRecord, EntityKind, Field, FieldSet, MutationEvent, PageRequest, Record, RecordId,
    RecordPage, RecordPatch, RecordQuery, RecordStore, SqliteRecordStore, StoreError,
    StoreResult, StudentRecord,
};
use rusqlite::{params, Connection};
use std::cell::RefCell;
use std::collections::HashSet;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn seed(store: &SqliteRecordStore<'_>, records: impl IntoIterator<Item = Record>) {
    for record in records {
        store.insert(&record).unwrap();
    }
}

/// Writes a grade the way the host does before dispatching the event.
pub fn set_grade(conn: &Connection, enrollment_id: RecordId, grade: Option<i64>) {
    conn.execute(
        "UPDATE registrations SET grade = ?1 WHERE id = ?2;",
        params![grade, enrollment_id.to_string()],
    )
    .unwrap();
}

/// Stores `grade` and builds the matching update event.
pub fn grade_changed(conn: &Connection, enrollment_id: RecordId, grade: Option<i64>) -> MutationEvent {
    set_grade(conn, enrollment_id, grade);
    let mut payload = EnrollmentRecord::with_id(enrollment_id, None, None);
    payload.grade = grade.map(|value| ruleflow_core::Grade::new(value).unwrap());
    MutationEvent::updated(Record::Enrollment(payload), FieldSet::from([Field::Grade]))
}

pub fn load_enrollment(store: &dyn RecordStore, id: RecordId) -> EnrollmentRecord {
    store
        .retrieve(
            EntityKind::Enrollment,
            id,
            &EntityKind::Enrollment.all_fields(),
        )
        .unwrap()
        .into_enrollment()
        .unwrap()
}

pub fn load_student(store: &dyn RecordStore, id: RecordId) -> StudentRecord {
    store
        .retrieve(EntityKind::Student, id, &EntityKind::Student.all_fields())
        .unwrap()
        .into_student()
        .unwrap()
}

pub fn load_address(store: &dyn RecordStore, dependent_id: RecordId) -> Option<String> {
    store
        .retrieve(
            EntityKind::Dependent,
            dependent_id,
            &FieldSet::from([Field::Address]),
        )
        .unwrap()
        .into_dependent()
        .unwrap()
        .address
}

/// Store wrapper that records calls and injects failures.
pub struct RecordingStore<'a> {
    inner: &'a dyn RecordStore,
    failing_updates: HashSet<RecordId>,
    failing_kinds: HashSet<EntityKind>,
    reads: RefCell<Vec<EntityKind>>,
    pages: RefCell<Vec<PageRequest>>,
    updates: RefCell<Vec<(RecordId, RecordPatch)>>,
}

impl<'a> RecordingStore<'a> {
    pub fn new(inner: &'a dyn RecordStore) -> Self {
        Self {
            inner,
            failing_updates: HashSet::new(),
            failing_kinds: HashSet::new(),
            reads: RefCell::new(Vec::new()),
            pages: RefCell::new(Vec::new()),
            updates: RefCell::new(Vec::new()),
        }
    }

    /// Updates addressed to these ids fail with a backend error.
    pub fn fail_updates_for(mut self, ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.failing_updates.extend(ids);
        self
    }

    /// Reads and queries of this entity kind fail with a backend error.
    pub fn fail_reads_of(mut self, kind: EntityKind) -> Self {
        self.failing_kinds.insert(kind);
        self
    }

    pub fn calls(&self) -> usize {
        self.reads.borrow().len() + self.pages.borrow().len() + self.updates.borrow().len()
    }

    pub fn reads_of(&self, kind: EntityKind) -> usize {
        self.reads
            .borrow()
            .iter()
            .filter(|read| **read == kind)
            .count()
    }

    pub fn pages(&self) -> Vec<PageRequest> {
        self.pages.borrow().clone()
    }

    pub fn updates(&self) -> Vec<(RecordId, RecordPatch)> {
        self.updates.borrow().clone()
    }
}

impl RecordStore for RecordingStore<'_> {
    fn retrieve(&self, kind: EntityKind, id: RecordId, fields: &FieldSet) -> StoreResult<Record> {
        self.reads.borrow_mut().push(kind);
        if self.failing_kinds.contains(&kind) {
            return Err(StoreError::Backend(format!("{kind} reads unavailable")));
        }
        self.inner.retrieve(kind, id, fields)
    }

    fn retrieve_page(&self, query: &RecordQuery, page: &PageRequest) -> StoreResult<RecordPage> {
        self.pages.borrow_mut().push(page.clone());
        if self.failing_kinds.contains(&query.kind) {
            return Err(StoreError::Backend(format!("{} queries unavailable", query.kind)));
        }
        self.inner.retrieve_page(query, page)
    }

    fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<()> {
        self.updates.borrow_mut().push((id, patch.clone()));
        if self.failing_updates.contains(&id) {
            return Err(StoreError::Backend(format!("update of {id} rejected")));
        }
        self.inner.update(id, patch)
    }
}
