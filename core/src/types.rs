//! Wire DTOs for the Deta Base API.
//!
//! # Design
//! Items stay generic: `Base<T>` only asks that `T` round-trips through
//! serde, and the default `serde_json::Value` accepts any record. These types
//! are defined independently of the mock-server crate; integration tests
//! catch schema drift between the two.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Body of `PUT /items`.
#[derive(Debug, Serialize)]
pub(crate) struct PutItems<'a, T> {
    pub items: &'a [T],
}

/// Body of `POST /items`.
#[derive(Debug, Serialize)]
pub(crate) struct InsertItem<'a, T> {
    pub item: &'a T,
}

/// Partial mutation of a stored item, sent as the body of
/// `PATCH /items/{key}`.
///
/// Empty categories are left off the wire. A field should appear in at most
/// one category per request; the service rejects overlaps, this type does
/// not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Updates {
    /// Fields to overwrite.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,
    /// Numeric fields to increment by a delta (negative to decrement).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub increment: Map<String, Value>,
    /// List fields to extend at the end.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub append: Map<String, Value>,
    /// List fields to extend at the front.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub prepend: Map<String, Value>,
    /// Fields to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Merge every field of a serializable partial record into `set`.
    ///
    /// Fails unless `partial` serializes to a JSON object.
    pub fn set_fields<P: Serialize>(mut self, partial: &P) -> Result<Self, ApiError> {
        match serde_json::to_value(partial).map_err(|e| ApiError::SerializationError(e.to_string()))? {
            Value::Object(fields) => {
                self.set.extend(fields);
                Ok(self)
            }
            other => Err(ApiError::SerializationError(format!(
                "partial update must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn increment(mut self, field: impl Into<String>, delta: impl Into<Value>) -> Self {
        self.increment.insert(field.into(), delta.into());
        self
    }

    pub fn append<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.append.insert(field.into(), collect_array(values));
        self
    }

    pub fn prepend<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.prepend.insert(field.into(), collect_array(values));
        self
    }

    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.delete.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.increment.is_empty()
            && self.append.is_empty()
            && self.prepend.is_empty()
            && self.delete.is_empty()
    }
}

fn collect_array<I, V>(values: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::Array(values.into_iter().map(Into::into).collect())
}

/// Body of `POST /query`.
///
/// `query` is a list of filter objects forwarded unexamined. `limit` and
/// `last` are omitted from the JSON when `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Pagination block of a query response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// Number of items in this page.
    pub size: usize,
    /// Cursor for the next page; absent once the scan is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl<T> QueryResponse<T> {
    /// Cursor to pass as `last` to fetch the following page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.paging.last.as_deref()
    }
}
