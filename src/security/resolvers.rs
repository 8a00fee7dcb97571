//! Generic resolver factories parameterized by an entity fetcher.
//!
//! Every admin CRUD field of every entity is one of these five functions
//! closed over a fetcher; failures are wrapped into the response envelope.

use async_graphql::{Context, Json, OutputType, ID};
use serde_json::Value;

use super::envelope::{DeleteResponse, ListResponse, Response, SearchInput};
use crate::entities::{
    filter::{parse_sort, parse_sort_str, parse_where},
    Entities, Entity, EntityError, Identity, ListParams, Listing, Model, Search, User,
};

/// Returns the data accessor for one entity type.
pub type EntityFetcher<M> = fn(&Entities) -> Entity<M>;

pub(crate) fn entities<'a>(ctx: &Context<'a>) -> Result<&'a Entities, EntityError> {
    ctx.data::<Entities>()
        .map_err(|err| EntityError::Internal(format!("entities missing from context: {}", err.message)))
}

pub(crate) fn identity<'a>(ctx: &Context<'a>) -> Option<&'a Identity> {
    ctx.data_opt::<Identity>()
}

/// The signed-in user, required by the current-user fields.
pub(crate) fn current_user<'a>(ctx: &Context<'a>) -> Result<&'a User, EntityError> {
    identity(ctx)
        .and_then(Identity::user)
        .ok_or(EntityError::Unauthorized)
}

/// Require `scope` from the caller.
pub(crate) fn authorize<'a>(ctx: &Context<'a>, scope: &'static str) -> Result<&'a Entities, EntityError> {
    let identity = identity(ctx).ok_or(EntityError::Unauthorized)?;
    if !identity.has_scope(scope) {
        return Err(EntityError::Forbidden(scope));
    }
    entities(ctx)
}

/// Arguments of every `list*` field.
#[derive(Debug, Default)]
pub struct ListArgs {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub filter: Option<Json<Value>>,
    pub sort: Option<Json<Value>>,
    pub search: Option<SearchInput>,
}

impl TryFrom<ListArgs> for ListParams {
    type Error = EntityError;

    fn try_from(args: ListArgs) -> Result<Self, Self::Error> {
        Ok(Self {
            page: args.page.map(i64::from),
            per_page: args.per_page.map(i64::from),
            filter: args
                .filter
                .map_or_else(|| Ok(serde_json::Map::new()), |Json(value)| parse_where(value))?,
            sort: match args.sort {
                Some(Json(Value::Null)) | None => Vec::new(),
                Some(Json(value)) => parse_sort(&value)?,
            },
            search: args.search.map(Search::try_from).transpose()?,
        })
    }
}

async fn get<M: Model>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    id: Option<ID>,
    filter: Option<Json<Value>>,
    sort: Option<String>,
) -> Result<M, EntityError> {
    let entity = fetcher(authorize(ctx, M::SCOPE)?);
    if let Some(id) = id {
        return entity.get(&id).await;
    }
    let filter = filter.map_or_else(|| Ok(serde_json::Map::new()), |Json(value)| parse_where(value))?;
    let sort = sort.as_deref().map(parse_sort_str).transpose()?.unwrap_or_default();
    entity
        .find_one(filter, sort)
        .await?
        .ok_or(EntityError::NotFound(M::NAME))
}

/// Load by `id`, or the first match of `where` in `sort` order.
pub async fn resolve_get<M: Model + OutputType>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    id: Option<ID>,
    filter: Option<Json<Value>>,
    sort: Option<String>,
) -> Response<M> {
    get(ctx, fetcher, id, filter, sort).await.into()
}

async fn list<M: Model>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    args: ListArgs,
) -> Result<Listing<M>, EntityError> {
    let entity = fetcher(authorize(ctx, M::SCOPE)?);
    entity.list(args.try_into()?).await
}

pub async fn resolve_list<M: Model + OutputType>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    args: ListArgs,
) -> ListResponse<M> {
    list(ctx, fetcher, args).await.into()
}

pub async fn resolve_create<M: Model + OutputType>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    data: M::Input,
) -> Response<M> {
    let result = match authorize(ctx, M::SCOPE) {
        Ok(entities) => fetcher(entities).create(data).await,
        Err(err) => Err(err),
    };
    result.into()
}

pub async fn resolve_update<M: Model + OutputType>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    id: ID,
    data: M::Input,
) -> Response<M> {
    let result = match authorize(ctx, M::SCOPE) {
        Ok(entities) => fetcher(entities).update(&id, data).await,
        Err(err) => Err(err),
    };
    result.into()
}

pub async fn resolve_delete<M: Model>(
    ctx: &Context<'_>,
    fetcher: EntityFetcher<M>,
    id: ID,
) -> DeleteResponse {
    let result = match authorize(ctx, M::SCOPE) {
        Ok(entities) => fetcher(entities).delete(&id).await,
        Err(err) => Err(err),
    };
    result.into()
}
