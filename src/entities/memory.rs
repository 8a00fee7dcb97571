//! In-memory [`Store`] used by tests and `--dsn memory://`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    error::StoreError,
    filter,
    store::{Found, Record, Store, StoreQuery},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, BTreeMap<Uuid, Record>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// First `unique` field whose value in `data` is already held by a record
/// other than `id`. Missing and `null` values never collide.
fn duplicate(
    records: Option<&BTreeMap<Uuid, Record>>,
    id: Uuid,
    data: &Map<String, Value>,
    unique: &[&'static str],
) -> Option<&'static str> {
    let records = records?;
    unique.iter().copied().find(|field| {
        data.get(*field).filter(|value| !value.is_null()).is_some_and(|value| {
            records
                .values()
                .any(|record| record.id != id && record.data.get(*field) == Some(value))
        })
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &'static str, id: Uuid) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    async fn find(
        &self,
        collection: &'static str,
        query: &StoreQuery,
    ) -> Result<Found, StoreError> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            return Ok(Found::default());
        };

        let mut selected: Vec<&Record> = records
            .values()
            .filter(|record| filter::matches(record, &query.filter))
            .filter(|record| {
                query
                    .search
                    .as_ref()
                    .map_or(true, |search| filter::matches_search(record, search))
            })
            .collect();
        selected.sort_by(|a, b| filter::compare(a, b, &query.sort));

        let total = selected.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));

        Ok(Found {
            records: selected
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            total,
        })
    }

    async fn insert(
        &self,
        collection: &'static str,
        id: Uuid,
        data: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        if let Some(field) = duplicate(collections.get(collection), id, &data, unique) {
            return Err(StoreError::Duplicate(field));
        }
        let now = Utc::now();
        let record = Record {
            id,
            data,
            created_on: now,
            saved_on: now,
        };
        collections
            .entry(collection)
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        collection: &'static str,
        id: Uuid,
        patch: Map<String, Value>,
        unique: &[&'static str],
    ) -> Result<Option<Record>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };
        if !records.contains_key(&id) {
            return Ok(None);
        }
        if let Some(field) = duplicate(Some(&*records), id, &patch, unique) {
            return Err(StoreError::Duplicate(field));
        }
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        record.data.extend(patch);
        record.saved_on = Utc::now().max(record.saved_on);
        Ok(Some(record.clone()))
    }

    async fn delete(&self, collection: &'static str, id: Uuid) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|records| records.remove(&id))
            .is_some())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
