use async_graphql::{ComplexObject, Context, Json, Object, Result, ID};
use serde_json::Value;

use super::{
    envelope::{DeleteResponse, ListResponse, Response, SearchInput},
    resolvers::{
        entities, resolve_create, resolve_delete, resolve_get, resolve_list, resolve_update,
        EntityFetcher, ListArgs,
    },
    IntoGraphqlError,
};
use crate::entities::{ApiToken, ApiTokenInput, Entities, Group, Role};

const API_TOKEN_FETCHER: EntityFetcher<ApiToken> = Entities::api_tokens;

#[ComplexObject]
impl ApiToken {
    async fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    async fn roles(&self, ctx: &Context<'_>) -> Result<Vec<Role>> {
        let entities = entities(ctx).into_graphql()?;
        entities.roles().get_many(&self.roles).await.into_graphql()
    }

    async fn groups(&self, ctx: &Context<'_>) -> Result<Vec<Group>> {
        let entities = entities(ctx).into_graphql()?;
        entities.groups().get_many(&self.groups).await.into_graphql()
    }

    async fn scopes(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let entities = entities(ctx).into_graphql()?;
        entities
            .access(&self.roles, &self.groups)
            .await
            .map(|access| access.scopes)
            .into_graphql()
    }
}

#[derive(Default)]
pub struct ApiTokenQuery;

#[Object]
impl ApiTokenQuery {
    async fn get_api_token(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<String>,
    ) -> Response<ApiToken> {
        resolve_get(ctx, API_TOKEN_FETCHER, id, filter, sort).await
    }

    async fn list_api_tokens(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
        per_page: Option<i32>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<Json<Value>>,
        search: Option<SearchInput>,
    ) -> ListResponse<ApiToken> {
        let args = ListArgs {
            page,
            per_page,
            filter,
            sort,
            search,
        };
        resolve_list(ctx, API_TOKEN_FETCHER, args).await
    }
}

#[derive(Default)]
pub struct ApiTokenMutation;

#[Object]
impl ApiTokenMutation {
    async fn create_api_token(&self, ctx: &Context<'_>, data: ApiTokenInput) -> Response<ApiToken> {
        resolve_create(ctx, API_TOKEN_FETCHER, data).await
    }

    async fn update_api_token(
        &self,
        ctx: &Context<'_>,
        id: ID,
        data: ApiTokenInput,
    ) -> Response<ApiToken> {
        resolve_update(ctx, API_TOKEN_FETCHER, id, data).await
    }

    async fn delete_api_token(&self, ctx: &Context<'_>, id: ID) -> DeleteResponse {
        resolve_delete(ctx, API_TOKEN_FETCHER, id).await
    }
}
