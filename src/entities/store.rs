//! Document store abstraction shared by every entity.
//!
//! Entities are persisted as JSON objects grouped by collection. The store
//! owns `id`, `createdOn` and `savedOn`; everything else lives in `data`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::error::StoreError;

/// Record keys owned by the store rather than the document body.
pub const ID_FIELD: &str = "id";
pub const CREATED_ON_FIELD: &str = "createdOn";
pub const SAVED_ON_FIELD: &str = "savedOn";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub data: Map<String, Value>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
}

impl Record {
    /// Flatten the record into its document form and deserialize a model.
    ///
    /// # Errors
    /// Returns an error if the document does not match the model shape.
    pub fn into_model<M: DeserializeOwned>(self) -> Result<M, serde_json::Error> {
        let mut data = self.data;
        data.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        data.insert(
            CREATED_ON_FIELD.to_string(),
            serde_json::to_value(self.created_on)?,
        );
        data.insert(
            SAVED_ON_FIELD.to_string(),
            serde_json::to_value(self.saved_on)?,
        );
        serde_json::from_value(Value::Object(data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Desc,
        }
    }

    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchOperator {
    #[default]
    Or,
    And,
}

/// Case-insensitive substring search across document fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub query: String,
    pub fields: Vec<String>,
    pub operator: SearchOperator,
}

/// Selection passed to [`Store::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    /// Containment filter; the `id` key addresses the record id.
    pub filter: Map<String, Value>,
    pub sort: Vec<Sort>,
    pub search: Option<Search>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl StoreQuery {
    #[must_use]
    pub fn filter(filter: Map<String, Value>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Records matching a query plus the total count before pagination.
#[derive(Debug, Clone, Default)]
pub struct Found {
    pub records: Vec<Record>,
    pub total: u64,
}

#[async_trait]
pub trait Store: Send + Sync + fmt::Debug {
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Record>, StoreError>;

    async fn find(&self, collection: &'static str, query: &StoreQuery)
        -> Result<Found, StoreError>;

    /// Store a new document. No other record of `collection` may hold the
    /// same value in any of the `unique` fields.
    async fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        data: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Record, StoreError>;

    /// Merge `patch` into the top level of the stored document, with the
    /// same `unique` constraint as [`Store::insert`].
    async fn update(
        &self,
        collection: &'static str,
        id: Uuid,
        patch: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Option<Record>, StoreError>;

    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name reported by `/health`.
    fn kind(&self) -> &'static str;
}
