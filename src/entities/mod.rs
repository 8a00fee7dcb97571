//! Typed entity accessors over a JSON document [`Store`].
//!
//! [`Entities`] is the registry placed in the GraphQL context. Each accessor
//! ([`Entity<M>`]) offers the generic CRUD operations used by the resolver
//! factories; models plug their validation into [`Model::prepare`].

pub mod api_token;
pub mod error;
pub mod filter;
pub mod group;
pub mod identity;
pub mod install;
pub mod memory;
pub mod password;
pub mod postgres;
pub mod role;
pub mod settings;
pub mod slug;
pub mod store;
pub mod token;
pub mod user;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::{collections::BTreeSet, fmt, marker::PhantomData, sync::Arc};
use tracing::{debug, instrument};
use uuid::Uuid;

pub use self::{
    api_token::{ApiToken, ApiTokenInput},
    error::{EntityError, StoreError},
    group::{Group, GroupInput},
    identity::Identity,
    memory::MemoryStore,
    postgres::PgStore,
    role::{Role, RoleInput},
    settings::UserSettings,
    store::{Record, Search, SearchOperator, Sort, SortOrder, Store, StoreQuery},
    token::TokenKeys,
    user::{Avatar, CurrentUserInput, File, FileInput, User, UserInput, UserLogin},
};

/// Role slug granting every scope.
pub const FULL_ACCESS_ROLE: &str = "full-access";
pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 1000;

/// A persisted entity type.
#[async_trait]
pub trait Model: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Payload accepted by create and update.
    type Input: Send + Sync;

    const COLLECTION: &'static str;
    /// Human readable name used in messages.
    const NAME: &'static str;
    /// Scope required to manage this entity through the admin fields.
    const SCOPE: &'static str;
    /// Document fields holding a value unique within the collection.
    const UNIQUE: &'static [&'static str] = &[];
    /// Document fields that `where`, `sort` and `search` may not reference.
    const PRIVATE: &'static [&'static str] = &[];

    /// Validate `input` and turn it into the document (create) or patch
    /// (update, `existing` is set) to persist under `id`.
    async fn prepare(
        entities: &Entities,
        id: Uuid,
        input: Self::Input,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError>;

    async fn after_delete(_entities: &Entities, _id: Uuid) -> Result<(), EntityError> {
        Ok(())
    }
}

/// Effective permissions computed from roles and groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
    pub scopes: Vec<String>,
    /// Role slugs.
    pub roles: Vec<String>,
    pub full_access: bool,
}

impl Access {
    #[must_use]
    pub fn allows(&self, scope: &str) -> bool {
        self.full_access || self.scopes.iter().any(|granted| granted == scope)
    }
}

/// List arguments shared by every `list*` field.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub filter: Map<String, Value>,
    pub sort: Vec<Sort>,
    pub search: Option<Search>,
}

/// One page of models plus what the envelope `meta` needs.
#[derive(Debug, Clone)]
pub struct Listing<M> {
    pub items: Vec<M>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct Entities {
    store: Arc<dyn Store>,
    tokens: Arc<TokenKeys>,
}

impl fmt::Debug for Entities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entities")
            .field("store", &self.store.kind())
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl Entities {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: TokenKeys) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }

    fn entity<M: Model>(&self) -> Entity<M> {
        Entity {
            entities: self.clone(),
            model: PhantomData,
        }
    }

    #[must_use]
    pub fn users(&self) -> Entity<User> {
        self.entity()
    }

    #[must_use]
    pub fn user_settings(&self) -> Entity<UserSettings> {
        self.entity()
    }

    #[must_use]
    pub fn roles(&self) -> Entity<Role> {
        self.entity()
    }

    #[must_use]
    pub fn groups(&self) -> Entity<Group> {
        self.entity()
    }

    #[must_use]
    pub fn api_tokens(&self) -> Entity<ApiToken> {
        self.entity()
    }

    /// Union of the scopes granted by `role_ids` and by the roles of `group_ids`.
    /// Dangling ids are ignored.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn access(
        &self,
        role_ids: &[String],
        group_ids: &[String],
    ) -> Result<Access, EntityError> {
        let groups = self.groups().get_many(group_ids).await?;
        let mut ids: BTreeSet<&str> = role_ids.iter().map(String::as_str).collect();
        for group in &groups {
            ids.extend(group.roles.iter().map(String::as_str));
        }
        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        let roles = self.roles().get_many(&ids).await?;

        let mut scopes = BTreeSet::new();
        let mut slugs = BTreeSet::new();
        for role in roles {
            scopes.extend(role.scopes);
            slugs.insert(role.slug);
        }
        Ok(Access {
            full_access: slugs.contains(FULL_ACCESS_ROLE),
            scopes: scopes.into_iter().collect(),
            roles: slugs.into_iter().collect(),
        })
    }
}

pub(crate) fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id.trim()).ok()
}

fn not_queryable(argument: &str, field: &str) -> EntityError {
    EntityError::invalid(argument, format!("Field \"{field}\" cannot be queried."))
}

/// Reject selections that reference one of the `private` fields.
fn ensure_queryable(
    private: &[&str],
    filter: &Map<String, Value>,
    sort: &[Sort],
    search: Option<&Search>,
) -> Result<(), EntityError> {
    if let Some(field) = filter.keys().find(|key| private.contains(&key.as_str())) {
        return Err(not_queryable("where", field));
    }
    if let Some(Sort { field, .. }) = sort.iter().find(|sort| private.contains(&sort.field.as_str())) {
        return Err(not_queryable("sort", field));
    }
    if let Some(field) = search
        .into_iter()
        .flat_map(|search| search.fields.iter())
        .find(|field| private.contains(&field.as_str()))
    {
        return Err(not_queryable("search", field));
    }
    Ok(())
}

/// Turn a unique-field collision reported by the store into `CONFLICT`.
fn conflict<M: Model>(err: StoreError, document: &Map<String, Value>) -> EntityError {
    match err {
        StoreError::Duplicate(field) => {
            let value = document.get(field).and_then(Value::as_str).unwrap_or_default();
            EntityError::Conflict(format!("{} with {field} \"{value}\" already exists.", M::NAME))
        }
        other => other.into(),
    }
}

/// Accessor for one entity type.
pub struct Entity<M> {
    entities: Entities,
    model: PhantomData<fn() -> M>,
}

impl<M> fmt::Debug for Entity<M>
where
    M: Model,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("collection", &M::COLLECTION)
            .finish()
    }
}

impl<M: Model> Entity<M> {
    #[must_use]
    pub const fn entities(&self) -> &Entities {
        &self.entities
    }

    fn store(&self) -> &dyn Store {
        self.entities.store()
    }

    /// Load by id; malformed ids are reported as not found.
    ///
    /// # Errors
    /// Returns `NOT_FOUND` when no record exists.
    pub async fn get(&self, id: &str) -> Result<M, EntityError> {
        let id = parse_id(id).ok_or(EntityError::NotFound(M::NAME))?;
        let record = self
            .store()
            .get(M::COLLECTION, id)
            .await?
            .ok_or(EntityError::NotFound(M::NAME))?;
        Ok(record.into_model()?)
    }

    /// First record matching `filter` in `sort` order.
    ///
    /// # Errors
    /// Returns `INVALID_ATTRIBUTES` when `filter` or `sort` names a private
    /// field, or an error if the store fails.
    pub async fn find_one(
        &self,
        filter: Map<String, Value>,
        sort: Vec<Sort>,
    ) -> Result<Option<M>, EntityError> {
        ensure_queryable(M::PRIVATE, &filter, &sort, None)?;
        let query = StoreQuery {
            filter,
            sort,
            limit: Some(1),
            ..StoreQuery::default()
        };
        let found = self.store().find(M::COLLECTION, &query).await?;
        found
            .records
            .into_iter()
            .next()
            .map(Record::into_model)
            .transpose()
            .map_err(EntityError::from)
    }

    /// Load every existing id from `ids`, preserving order and skipping unknown ids.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<M>, EntityError> {
        let mut models = Vec::with_capacity(ids.len());
        for id in ids.iter().filter_map(|id| parse_id(id)) {
            if let Some(record) = self.store().get(M::COLLECTION, id).await? {
                models.push(record.into_model()?);
            }
        }
        Ok(models)
    }

    /// One page of models. Pages start at 1; `perPage` defaults to 10 and is
    /// capped at 1000; results default to `savedOn` descending.
    ///
    /// # Errors
    /// Returns `INVALID_ATTRIBUTES` when the selection names a private field,
    /// or an error if the store fails.
    #[instrument(skip(self, params), fields(collection = M::COLLECTION))]
    pub async fn list(&self, params: ListParams) -> Result<Listing<M>, EntityError> {
        ensure_queryable(
            M::PRIVATE,
            &params.filter,
            &params.sort,
            params.search.as_ref(),
        )?;
        let page = params
            .page
            .and_then(|page| u64::try_from(page).ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);
        let per_page = params
            .per_page
            .and_then(|per_page| u64::try_from(per_page).ok())
            .filter(|per_page| *per_page > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);
        let sort = if params.sort.is_empty() {
            vec![Sort::desc(store::SAVED_ON_FIELD)]
        } else {
            params.sort
        };

        let query = StoreQuery {
            filter: params.filter,
            sort,
            search: params.search,
            limit: Some(per_page),
            offset: (page - 1).saturating_mul(per_page),
        };
        let found = self.store().find(M::COLLECTION, &query).await?;
        let items = found
            .records
            .into_iter()
            .map(Record::into_model)
            .collect::<Result<Vec<M>, _>>()?;

        Ok(Listing {
            items,
            total: found.total,
            page,
            per_page,
        })
    }

    /// # Errors
    /// Returns the model's validation errors or a store failure.
    #[instrument(skip(self, input), fields(collection = M::COLLECTION))]
    pub async fn create(&self, input: M::Input) -> Result<M, EntityError> {
        let id = Uuid::now_v7();
        let document = M::prepare(&self.entities, id, input, None).await?;
        let record = self
            .store()
            .insert(M::COLLECTION, id, document.clone(), M::UNIQUE)
            .await
            .map_err(|err| conflict::<M>(err, &document))?;
        debug!(%id, "created {}", M::NAME);
        Ok(record.into_model()?)
    }

    /// Partial update: fields absent from `input` keep their stored value.
    ///
    /// # Errors
    /// Returns `NOT_FOUND`, the model's validation errors or a store failure.
    #[instrument(skip(self, input), fields(collection = M::COLLECTION))]
    pub async fn update(&self, id: &str, input: M::Input) -> Result<M, EntityError> {
        let existing = self.get(id).await?;
        let id = parse_id(id).ok_or(EntityError::NotFound(M::NAME))?;
        let patch = M::prepare(&self.entities, id, input, Some(&existing)).await?;
        let record = self
            .store()
            .update(M::COLLECTION, id, patch.clone(), M::UNIQUE)
            .await
            .map_err(|err| conflict::<M>(err, &patch))?
            .ok_or(EntityError::NotFound(M::NAME))?;
        Ok(record.into_model()?)
    }

    /// # Errors
    /// Returns `NOT_FOUND` or a store failure.
    #[instrument(skip(self), fields(collection = M::COLLECTION))]
    pub async fn delete(&self, id: &str) -> Result<(), EntityError> {
        let id = parse_id(id).ok_or(EntityError::NotFound(M::NAME))?;
        if !self.store().delete(M::COLLECTION, id).await? {
            return Err(EntityError::NotFound(M::NAME));
        }
        M::after_delete(&self.entities, id).await?;
        debug!(%id, "deleted {}", M::NAME);
        Ok(())
    }

    /// Fail early with `CONFLICT` when another record already holds `value`
    /// in `field`. The store re-checks [`Model::UNIQUE`] fields on write.
    ///
    /// # Errors
    /// Returns `CONFLICT` or a store failure.
    pub async fn ensure_unique(
        &self,
        id: Uuid,
        field: &str,
        value: &str,
    ) -> Result<(), EntityError> {
        let mut filter = Map::new();
        filter.insert(field.to_string(), Value::String(value.to_string()));
        let query = StoreQuery {
            limit: Some(2),
            ..StoreQuery::filter(filter)
        };
        let found = self.store().find(M::COLLECTION, &query).await?;
        if found.records.iter().any(|record| record.id != id) {
            return Err(EntityError::Conflict(format!(
                "{} with {field} \"{value}\" already exists.",
                M::NAME
            )));
        }
        Ok(())
    }

    /// Check that every id references an existing record and return them normalized.
    ///
    /// # Errors
    /// Returns `INVALID_ATTRIBUTES` naming `field` for unknown ids.
    pub async fn ensure_exist(&self, field: &str, ids: &[String]) -> Result<Vec<String>, EntityError> {
        let mut normalized: Vec<String> = Vec::with_capacity(ids.len());
        for raw in ids {
            let Some(id) = parse_id(raw) else {
                return Err(EntityError::invalid(
                    field,
                    format!("{} \"{raw}\" not found.", M::NAME),
                ));
            };
            if self.store().get(M::COLLECTION, id).await?.is_none() {
                return Err(EntityError::invalid(
                    field,
                    format!("{} \"{raw}\" not found.", M::NAME),
                ));
            }
            let id = id.to_string();
            if !normalized.contains(&id) {
                normalized.push(id);
            }
        }
        Ok(normalized)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use secrecy::SecretString;

    pub(crate) fn entities() -> Entities {
        Entities::new(
            Arc::new(MemoryStore::new()),
            TokenKeys::new(&SecretString::from("test-secret".to_string()), 3600),
        )
    }
}
