//! API tokens: named, non-expiring credentials carrying roles and groups.

use async_graphql::{InputObject, SimpleObject, ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{error::EntityError, role::prepare_name, user::ids, Entities, Model};

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct ApiToken {
    #[graphql(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minted on create, never changed by updates.
    pub token: String,
    #[graphql(skip)]
    #[serde(default)]
    pub roles: Vec<String>,
    #[graphql(skip)]
    #[serde(default)]
    pub groups: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct ApiTokenInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub roles: Option<Vec<ID>>,
    pub groups: Option<Vec<ID>>,
}

#[async_trait]
impl Model for ApiToken {
    type Input = ApiTokenInput;

    const COLLECTION: &'static str = "api_tokens";
    const NAME: &'static str = "ApiToken";
    const SCOPE: &'static str = "security:api-token:crud";

    async fn prepare(
        entities: &Entities,
        id: Uuid,
        input: ApiTokenInput,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError> {
        let creating = existing.is_none();
        let mut document = Map::new();

        prepare_name(&mut document, input.name, creating)?;
        if let Some(description) = input.description {
            document.insert("description".to_string(), json!(description.trim()));
        }
        match input.roles {
            Some(roles) => {
                let roles = entities.roles().ensure_exist("roles", &ids(roles)).await?;
                document.insert("roles".to_string(), json!(roles));
            }
            None if creating => {
                document.insert("roles".to_string(), json!([]));
            }
            None => {}
        }
        match input.groups {
            Some(groups) => {
                let groups = entities.groups().ensure_exist("groups", &ids(groups)).await?;
                document.insert("groups".to_string(), json!(groups));
            }
            None if creating => {
                document.insert("groups".to_string(), json!([]));
            }
            None => {}
        }
        if creating {
            let token = entities.tokens().issue_api_token(&id.to_string())?;
            document.insert("token".to_string(), Value::String(token));
        }
        Ok(document)
    }
}
