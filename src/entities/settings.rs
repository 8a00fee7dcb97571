//! Per-user keyed settings blobs.

use async_graphql::SimpleObject;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{error::EntityError, store::StoreQuery, Entities, Entity, Model};

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct UserSettings {
    #[graphql(skip)]
    pub id: String,
    #[graphql(skip)]
    pub user: String,
    pub key: String,
    #[graphql(skip)]
    #[serde(default)]
    pub data: Value,
    #[graphql(skip)]
    pub created_on: DateTime<Utc>,
    #[graphql(skip)]
    pub saved_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SettingsInput {
    pub user: String,
    pub key: String,
    pub data: Value,
}

fn normalize_key(key: &str) -> Result<String, EntityError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(EntityError::invalid("key", "Settings key is required."));
    }
    Ok(key.to_string())
}

#[async_trait]
impl Model for UserSettings {
    type Input = SettingsInput;

    const COLLECTION: &'static str = "user_settings";
    const NAME: &'static str = "UserSettings";
    const SCOPE: &'static str = "security:user:crud";

    async fn prepare(
        _entities: &Entities,
        _id: Uuid,
        input: SettingsInput,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError> {
        let mut document = Map::new();
        if existing.is_none() {
            document.insert("user".to_string(), Value::String(input.user));
            document.insert("key".to_string(), Value::String(normalize_key(&input.key)?));
        }
        document.insert("data".to_string(), input.data);
        Ok(document)
    }
}

impl Entity<UserSettings> {
    async fn find_for(&self, user_id: &str, key: &str) -> Result<Option<UserSettings>, EntityError> {
        let mut filter = Map::new();
        filter.insert("user".to_string(), Value::String(user_id.to_string()));
        filter.insert("key".to_string(), Value::String(normalize_key(key)?));
        self.find_one(filter, Vec::new()).await
    }

    /// The settings blob stored under `key`, if any.
    ///
    /// # Errors
    /// Returns `INVALID_ATTRIBUTES` for an empty key or a store failure.
    pub async fn get_for(&self, user_id: &str, key: &str) -> Result<Option<Value>, EntityError> {
        Ok(self.find_for(user_id, key).await?.map(|settings| settings.data))
    }

    /// Replace the blob stored under `key`, creating it on first write.
    ///
    /// # Errors
    /// Returns `INVALID_ATTRIBUTES` for an empty key or a store failure.
    pub async fn update_for(
        &self,
        user_id: &str,
        key: &str,
        data: Value,
    ) -> Result<Value, EntityError> {
        let input = SettingsInput {
            user: user_id.to_string(),
            key: key.to_string(),
            data,
        };
        let settings = match self.find_for(user_id, key).await? {
            Some(existing) => self.update(&existing.id, input).await?,
            None => self.create(input).await?,
        };
        Ok(settings.data)
    }

    /// Number of settings blobs kept for a user.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn count_for(&self, user_id: &str) -> Result<u64, EntityError> {
        let mut filter = Map::new();
        filter.insert("user".to_string(), Value::String(user_id.to_string()));
        let found = self
            .entities()
            .store()
            .find(UserSettings::COLLECTION, &StoreQuery {
                limit: Some(0),
                ..StoreQuery::filter(filter)
            })
            .await?;
        Ok(found.total)
    }
}
