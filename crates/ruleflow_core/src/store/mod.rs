//! Record store contract consumed by the rules.
//!
//! # Responsibility
//! - Define point retrieval, paged queries and partial updates.
//! - Provide `retrieve_all`, the only sanctioned way to materialize a
//!   multi-record result set.
//!
//! # Invariants
//! - `retrieve` returns only the requested fields; all others are `None`.
//! - `update` writes only the fields named by the patch.
//! - A page reporting `more_records` carries a continuation token.

use crate::db::DbError;
use crate::model::entity::{EntityKind, Field, FieldSet};
use crate::model::grade::ModelValidationError;
use crate::model::record::{Record, RecordId, RecordPatch, UnexpectedKind};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level failure, regardless of backend.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    NotFound { kind: EntityKind, id: RecordId },
    UnknownField { kind: EntityKind, field: Field },
    UnexpectedKind(UnexpectedKind),
    InvalidData(String),
    /// Failure reported by a non-SQLite host adapter.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} record not found: {id}"),
            Self::UnknownField { kind, field } => {
                write!(f, "field `{field}` does not exist on `{kind}`")
            }
            Self::UnexpectedKind(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Backend(message) => write!(f, "record store failure: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UnexpectedKind(err) => Some(err),
            Self::NotFound { .. }
            | Self::UnknownField { .. }
            | Self::InvalidData(_)
            | Self::Backend(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<UnexpectedKind> for StoreError {
    fn from(value: UnexpectedKind) -> Self {
        Self::UnexpectedKind(value)
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: Field,
    pub direction: SortDirection,
}

/// Filtered, ordered multi-record query.
///
/// Filters are conjunctive equality conditions on reference fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub kind: EntityKind,
    pub columns: FieldSet,
    pub filters: Vec<(Field, RecordId)>,
    pub order: Option<OrderBy>,
}

impl RecordQuery {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            columns: FieldSet::new(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Field>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn filter_eq(mut self, field: Field, value: RecordId) -> Self {
        self.filters.push((field, value));
        self
    }

    pub fn order_by(mut self, field: Field, direction: SortDirection) -> Self {
        self.order = Some(OrderBy { field, direction });
        self
    }
}

/// Opaque continuation marker handed back by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request for one bounded page of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// One-based page counter, kept for diagnostics.
    pub number: u32,
    pub size: u32,
    pub token: Option<PageToken>,
}

impl PageRequest {
    pub fn first(size: u32) -> Self {
        Self {
            number: 1,
            size,
            token: None,
        }
    }

    /// Request for the page after this one; the counter saturates.
    pub fn next(&self, token: PageToken) -> Self {
        Self {
            number: self.number.saturating_add(1),
            size: self.size,
            token: Some(token),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub more_records: bool,
    pub continuation: Option<PageToken>,
}

/// Storage collaborator consumed by every rule.
pub trait RecordStore {
    fn retrieve(&self, kind: EntityKind, id: RecordId, fields: &FieldSet) -> StoreResult<Record>;
    fn retrieve_page(&self, query: &RecordQuery, page: &PageRequest) -> StoreResult<RecordPage>;
    fn update(&self, id: RecordId, patch: &RecordPatch) -> StoreResult<()>;
}

/// Retrieves every page of `query` and returns the complete result set.
///
/// # Errors
/// - Propagates the first page failure; no partial result is returned.
/// - Returns `InvalidData` when a page claims more records without a token.
pub fn retrieve_all<S>(store: &S, query: &RecordQuery, page_size: u32) -> StoreResult<Vec<Record>>
where
    S: RecordStore + ?Sized,
{
    let mut request = PageRequest::first(page_size);
    let mut records = Vec::new();

    loop {
        let page = store.retrieve_page(query, &request)?;
        records.extend(page.records);

        if !page.more_records {
            return Ok(records);
        }

        let token = page.continuation.ok_or_else(|| {
            StoreError::InvalidData(format!(
                "page {} of `{}` reported more records without a continuation token",
                request.number, query.kind
            ))
        })?;
        request = request.next(token);
    }
}
