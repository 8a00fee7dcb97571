use async_graphql::{InputObject, SimpleObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{
    error::EntityError,
    slug::{normalize_slug, SLUG_MAX},
    Entities, Entity, Model,
};

/// A named set of scopes.
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct Role {
    #[graphql(skip)]
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct RoleInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// Trim a required `name`; on create it must be present.
pub(crate) fn prepare_name(
    document: &mut Map<String, Value>,
    name: Option<String>,
    creating: bool,
) -> Result<Option<String>, EntityError> {
    match name.map(|name| name.trim().to_string()) {
        Some(name) if name.is_empty() => Err(EntityError::invalid("name", "Name is required.")),
        Some(name) => {
            document.insert("name".to_string(), Value::String(name.clone()));
            Ok(Some(name))
        }
        None if creating => Err(EntityError::invalid("name", "Name is required.")),
        None => Ok(None),
    }
}

/// Resolve the slug to store: explicit input wins, otherwise it is derived
/// from the name on create.
pub(crate) fn prepare_slug(
    slug: Option<String>,
    name: Option<&str>,
    creating: bool,
) -> Result<Option<String>, EntityError> {
    match (slug, name) {
        (Some(slug), _) => normalize_slug(&slug, SLUG_MAX)
            .map(Some)
            .ok_or_else(|| EntityError::invalid("slug", "Invalid slug.")),
        (None, Some(name)) if creating => normalize_slug(name, SLUG_MAX)
            .map(Some)
            .ok_or_else(|| EntityError::invalid("slug", "Unable to derive a slug from the name.")),
        (None, _) => Ok(None),
    }
}

fn normalize_scopes(scopes: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    scopes
        .into_iter()
        .map(|scope| scope.trim().to_string())
        .filter(|scope| !scope.is_empty() && seen.insert(scope.clone()))
        .collect()
}

#[async_trait]
impl Model for Role {
    type Input = RoleInput;

    const COLLECTION: &'static str = "roles";
    const NAME: &'static str = "Role";
    const SCOPE: &'static str = "security:role:crud";
    const UNIQUE: &'static [&'static str] = &["slug"];

    async fn prepare(
        entities: &Entities,
        id: Uuid,
        input: RoleInput,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError> {
        let creating = existing.is_none();
        let mut document = Map::new();

        let name = prepare_name(&mut document, input.name, creating)?;
        if let Some(slug) = prepare_slug(input.slug, name.as_deref(), creating)? {
            entities.roles().ensure_unique(id, "slug", &slug).await?;
            document.insert("slug".to_string(), Value::String(slug));
        }
        if let Some(description) = input.description {
            document.insert("description".to_string(), json!(description.trim()));
        }
        match input.scopes {
            Some(scopes) => {
                document.insert("scopes".to_string(), json!(normalize_scopes(scopes)));
            }
            None if creating => {
                document.insert("scopes".to_string(), json!([]));
            }
            None => {}
        }
        Ok(document)
    }
}

impl Entity<Role> {
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Role>, EntityError> {
        let mut filter = Map::new();
        filter.insert("slug".to_string(), Value::String(slug.to_string()));
        self.find_one(filter, Vec::new()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::test_support;

    #[test]
    fn scopes_are_trimmed_and_deduplicated() {
        let scopes = normalize_scopes(vec![
            " cms:page:read".to_string(),
            String::new(),
            "cms:page:read".to_string(),
            "cms:page:write".to_string(),
        ]);
        assert_eq!(scopes, vec!["cms:page:read", "cms:page:write"]);
    }

    #[tokio::test]
    async fn slug_is_derived_and_unique() {
        let entities = test_support::entities();
        let roles = entities.roles();
        let role = roles
            .create(RoleInput {
                name: Some("Content Editors".to_string()),
                ..RoleInput::default()
            })
            .await
            .unwrap();
        assert_eq!(role.slug, "content-editors");
        assert!(role.scopes.is_empty());
        assert!(roles.find_by_slug("content-editors").await.unwrap().is_some());

        let err = roles
            .create(RoleInput {
                name: Some("Other".to_string()),
                slug: Some("Content_Editors".to_string()),
                ..RoleInput::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn name_is_required() {
        let entities = test_support::entities();
        let err = entities
            .roles()
            .create(RoleInput {
                name: Some("   ".to_string()),
                ..RoleInput::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");
        let err = entities.roles().create(RoleInput::default()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");
    }

    #[tokio::test]
    async fn update_keeps_slug_when_renamed() {
        let entities = test_support::entities();
        let roles = entities.roles();
        let role = roles
            .create(RoleInput {
                name: Some("Editors".to_string()),
                scopes: Some(vec!["cms:page:read".to_string()]),
                ..RoleInput::default()
            })
            .await
            .unwrap();
        let updated = roles
            .update(
                &role.id,
                RoleInput {
                    name: Some("Writers".to_string()),
                    ..RoleInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Writers");
        assert_eq!(updated.slug, "editors");
        assert_eq!(updated.scopes, vec!["cms:page:read"]);
    }
}
