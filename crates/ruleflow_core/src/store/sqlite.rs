//! SQLite-backed record store.
//!
//! # Responsibility
//! - Implement `RecordStore` over the tables created by `db::migrations`.
//! - Provide `insert` so hosts and tests can seed records the rules never
//!   create themselves.
//!
//! # Invariants
//! - Only requested columns are selected; unrequested fields stay `None`.
//! - Result order is always total: the requested order, then `id ASC`.
//! - Stored grades outside `0..=100` read back as absent.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::entity::{EntityKind, Field, FieldSet};
use crate::model::grade::{Gpa, Grade, ModelValidationError};
use crate::model::record::{
    CourseRecord, DependentRecord, EnrollmentRecord, MaterialRecord, ParentRecord, Record,
    RecordId, RecordPatch, StudentRecord,
};
use crate::store::{
    PageRequest, PageToken, RecordPage, RecordQuery, RecordStore, SortDirection, StoreError,
    StoreResult,
};
use log::{debug, warn};
use rusqlite::types::{FromSql, Value};
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

/// Record store over one borrowed SQLite connection.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a connection whose schema is at the latest migration.
    ///
    /// # Errors
    /// - `DbError::SchemaNotReady` when the connection was not opened through
    ///   `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let db_version = current_user_version(conn)?;
        let expected = latest_version();
        if db_version != expected {
            return Err(DbError::SchemaNotReady {
                db_version,
                expected,
            }
            .into());
        }
        Ok(Self { conn })
    }

    /// Inserts a full record. Unset fields are stored as NULL.
    pub fn insert(&self, record: &Record) -> StoreResult<()> {
        match record {
            Record::Parent(parent) => self.conn.execute(
                "INSERT INTO accounts (id, address) VALUES (?1, ?2);",
                params![parent.id.to_string(), parent.address.as_deref()],
            )?,
            Record::Dependent(dependent) => self.conn.execute(
                "INSERT INTO contacts (id, parent_id, address) VALUES (?1, ?2, ?3);",
                params![
                    dependent.id.to_string(),
                    dependent.parent_id.map(|id| id.to_string()),
                    dependent.address.as_deref(),
                ],
            )?,
            Record::Enrollment(enrollment) => self.conn.execute(
                "INSERT INTO registrations (
                    id,
                    student_id,
                    course_id,
                    grade,
                    passed,
                    credits_earned,
                    materials_needed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    enrollment.id.to_string(),
                    enrollment.student_id.map(|id| id.to_string()),
                    enrollment.course_id.map(|id| id.to_string()),
                    enrollment.grade.map(i64::from),
                    enrollment.passed.map(bool_to_int),
                    enrollment.credits_earned,
                    enrollment.materials_needed.as_deref(),
                ],
            )?,
            Record::Course(course) => self.conn.execute(
                "INSERT INTO courses (id, credits) VALUES (?1, ?2);",
                params![course.id.to_string(), course.credits],
            )?,
            Record::Material(material) => self.conn.execute(
                "INSERT INTO materials (id, course_id, name) VALUES (?1, ?2, ?3);",
                params![
                    material.id.to_string(),
                    material.course_id.map(|id| id.to_string()),
                    material.name.as_deref(),
                ],
            )?,
            Record::Student(student) => self.conn.execute(
                "INSERT INTO students (id, total_credits, gpa) VALUES (?1, ?2, ?3);",
                params![
                    student.id.to_string(),
                    student.total_credits,
                    student.gpa.map(Gpa::as_f64),
                ],
            )?,
        };
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn retrieve(&self, kind: EntityKind, id: RecordId, fields: &FieldSet) -> StoreResult<Record> {
        ensure_fields(kind, fields.iter().copied())?;

        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1;",
            select_list(fields),
            table_name(kind)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id.to_string()])?;

        if let Some(row) = rows.next()? {
            return parse_record(kind, row, fields);
        }

        Err(StoreError::NotFound { kind, id })
    }

    fn retrieve_page(&self, query: &RecordQuery, page: &PageRequest) -> StoreResult<RecordPage> {
        let referenced = query
            .columns
            .iter()
            .copied()
            .chain(query.filters.iter().map(|(field, _)| *field))
            .chain(query.order.map(|order| order.field));
        ensure_fields(query.kind, referenced)?;

        if page.size == 0 {
            return Err(StoreError::InvalidData(
                "page size must be positive".to_string(),
            ));
        }
        let offset = parse_offset(page.token.as_ref())?;

        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list(&query.columns),
            table_name(query.kind)
        );
        let mut bind_values: Vec<Value> = Vec::new();

        for (index, (field, value)) in query.filters.iter().enumerate() {
            sql.push_str(if index == 0 { " WHERE " } else { " AND " });
            sql.push_str(field.name());
            sql.push_str(" = ?");
            bind_values.push(Value::Text(value.to_string()));
        }

        match query.order {
            Some(order) => {
                let collation = if is_text(order.field) {
                    " COLLATE NOCASE"
                } else {
                    ""
                };
                let direction = match order.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY {}{collation} {direction}, id ASC",
                    order.field.name()
                ));
            }
            None => sql.push_str(" ORDER BY id ASC"),
        }

        // One extra row tells whether another page exists.
        sql.push_str(" LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(page.size) + 1));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record(query.kind, row, &query.columns)?);
        }

        let page_len = page.size as usize;
        let more_records = records.len() > page_len;
        records.truncate(page_len);
        let continuation =
            more_records.then(|| PageToken::new((offset + i64::from(page.size)).to_string()));

        debug!(
            "event=store_page module=store status=ok kind={} page={} rows={} more={}",
            query.kind,
            page.number,
            records.len(),
            more_records
        );

        Ok(RecordPage {
            records,
            more_records,
            continuation,
        })
    }

    fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<()> {
        let id_text = id.to_string();
        let changed = match patch {
            RecordPatch::DependentAddress { address } => self.conn.execute(
                "UPDATE contacts SET address = ?1 WHERE id = ?2;",
                params![address.as_deref(), id_text],
            )?,
            RecordPatch::EnrollmentResult {
                passed,
                credits_earned,
            } => self.conn.execute(
                "UPDATE registrations
                 SET
                    passed = ?1,
                    credits_earned = ?2
                 WHERE id = ?3;",
                params![bool_to_int(*passed), credits_earned, id_text],
            )?,
            RecordPatch::EnrollmentMaterials { materials_needed } => self.conn.execute(
                "UPDATE registrations SET materials_needed = ?1 WHERE id = ?2;",
                params![materials_needed.as_str(), id_text],
            )?,
            RecordPatch::StudentStats { total_credits, gpa } => self.conn.execute(
                "UPDATE students
                 SET
                    total_credits = ?1,
                    gpa = ?2
                 WHERE id = ?3;",
                params![total_credits, gpa.as_f64(), id_text],
            )?,
        };

        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: patch.entity_kind(),
                id,
            });
        }

        Ok(())
    }
}

fn table_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Parent => "accounts",
        EntityKind::Dependent => "contacts",
        EntityKind::Enrollment => "registrations",
        EntityKind::Course => "courses",
        EntityKind::Material => "materials",
        EntityKind::Student => "students",
    }
}

fn is_text(field: Field) -> bool {
    matches!(field, Field::Address | Field::Name | Field::MaterialsNeeded)
}

fn ensure_fields(kind: EntityKind, fields: impl IntoIterator<Item = Field>) -> StoreResult<()> {
    for field in fields {
        if !kind.has_field(field) {
            return Err(StoreError::UnknownField { kind, field });
        }
    }
    Ok(())
}

fn select_list(fields: &FieldSet) -> String {
    let mut columns = vec!["id"];
    columns.extend(fields.iter().map(|field| field.name()));
    columns.join(", ")
}

fn parse_offset(token: Option<&PageToken>) -> StoreResult<i64> {
    let Some(token) = token else {
        return Ok(0);
    };
    token
        .as_str()
        .parse::<i64>()
        .ok()
        .filter(|offset| *offset >= 0)
        .ok_or_else(|| {
            StoreError::InvalidData(format!("malformed page token `{}`", token.as_str()))
        })
}

fn parse_record(kind: EntityKind, row: &Row<'_>, fields: &FieldSet) -> StoreResult<Record> {
    let id_text: String = row.get("id")?;
    let id = parse_id(&id_text, kind, "id")?;
    let reader = ColumnReader {
        row,
        fields,
        kind,
        id,
    };

    let record = match kind {
        EntityKind::Parent => Record::Parent(ParentRecord {
            id,
            address: reader.value(Field::Address)?,
        }),
        EntityKind::Dependent => Record::Dependent(DependentRecord {
            id,
            parent_id: reader.reference(Field::ParentId)?,
            address: reader.value(Field::Address)?,
        }),
        EntityKind::Enrollment => Record::Enrollment(EnrollmentRecord {
            id,
            student_id: reader.reference(Field::StudentId)?,
            course_id: reader.reference(Field::CourseId)?,
            grade: reader.grade()?,
            passed: reader.flag(Field::Passed)?,
            credits_earned: reader.count(Field::CreditsEarned)?,
            materials_needed: reader.value(Field::MaterialsNeeded)?,
        }),
        EntityKind::Course => Record::Course(CourseRecord {
            id,
            credits: reader.count(Field::Credits)?,
        }),
        EntityKind::Material => Record::Material(MaterialRecord {
            id,
            course_id: reader.reference(Field::CourseId)?,
            name: reader.value(Field::Name)?,
        }),
        EntityKind::Student => Record::Student(StudentRecord {
            id,
            total_credits: reader.count(Field::TotalCredits)?,
            gpa: reader.gpa()?,
        }),
    };
    Ok(record)
}

/// Reads projected columns; unrequested fields read as `None`.
struct ColumnReader<'a, 'stmt> {
    row: &'a Row<'stmt>,
    fields: &'a FieldSet,
    kind: EntityKind,
    id: RecordId,
}

impl ColumnReader<'_, '_> {
    fn value<T: FromSql>(&self, field: Field) -> StoreResult<Option<T>> {
        if !self.fields.contains(&field) {
            return Ok(None);
        }
        Ok(self.row.get::<_, Option<T>>(field.name())?)
    }

    fn reference(&self, field: Field) -> StoreResult<Option<RecordId>> {
        self.value::<String>(field)?
            .map(|text| parse_id(&text, self.kind, field.name()))
            .transpose()
    }

    fn flag(&self, field: Field) -> StoreResult<Option<bool>> {
        match self.value::<i64>(field)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(other) => Err(StoreError::InvalidData(format!(
                "invalid flag value `{other}` in {}.{field}",
                table_name(self.kind)
            ))),
        }
    }

    fn count(&self, field: Field) -> StoreResult<Option<u32>> {
        let Some(value) = self.value::<i64>(field)? else {
            return Ok(None);
        };
        if value < 0 {
            return Err(ModelValidationError::NegativeCredits(value).into());
        }
        u32::try_from(value).map(Some).map_err(|_| {
            StoreError::InvalidData(format!(
                "value `{value}` in {}.{field} exceeds the supported range",
                table_name(self.kind)
            ))
        })
    }

    fn grade(&self) -> StoreResult<Option<Grade>> {
        let Some(value) = self.value::<i64>(Field::Grade)? else {
            return Ok(None);
        };
        match Grade::new(value) {
            Ok(grade) => Ok(Some(grade)),
            Err(err) => {
                warn!(
                    "event=grade_out_of_range module=store status=skip record={} error={}",
                    self.id, err
                );
                Ok(None)
            }
        }
    }

    fn gpa(&self) -> StoreResult<Option<Gpa>> {
        Ok(self
            .value::<f64>(Field::Gpa)?
            .map(Gpa::from_decimal)
            .transpose()?)
    }
}

fn parse_id(text: &str, kind: EntityKind, column: &str) -> StoreResult<RecordId> {
    Uuid::parse_str(text).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid uuid value `{text}` in {}.{column}",
            table_name(kind)
        ))
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
