use async_graphql::{InputObject, SimpleObject, ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{
    error::EntityError,
    role::{prepare_name, prepare_slug},
    user::ids,
    Entities, Entity, Model,
};

/// A named set of roles assigned to users as a unit.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct Group {
    #[graphql(skip)]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[graphql(skip)]
    #[serde(default)]
    pub roles: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct GroupInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub roles: Option<Vec<ID>>,
}

#[async_trait]
impl Model for Group {
    type Input = GroupInput;

    const COLLECTION: &'static str = "groups";
    const NAME: &'static str = "Group";
    const SCOPE: &'static str = "security:group:crud";
    const UNIQUE: &'static [&'static str] = &["slug"];

    async fn prepare(
        entities: &Entities,
        id: Uuid,
        input: GroupInput,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError> {
        let creating = existing.is_none();
        let mut document = Map::new();

        let name = prepare_name(&mut document, input.name, creating)?;
        if let Some(slug) = prepare_slug(input.slug, name.as_deref(), creating)? {
            entities.groups().ensure_unique(id, "slug", &slug).await?;
            document.insert("slug".to_string(), Value::String(slug));
        }
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
        Ok(document)
    }
}

impl Entity<Group> {
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, EntityError> {
        let mut filter = Map::new();
        filter.insert("slug".to_string(), Value::String(slug.to_string()));
        self.find_one(filter, Vec::new()).await
    }
}
