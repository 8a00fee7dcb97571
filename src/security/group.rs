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
use crate::entities::{Entities, Group, GroupInput, Role};

const GROUP_FETCHER: EntityFetcher<Group> = Entities::groups;

#[ComplexObject]
impl Group {
    async fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    async fn roles(&self, ctx: &Context<'_>) -> Result<Vec<Role>> {
        let entities = entities(ctx).into_graphql()?;
        entities.roles().get_many(&self.roles).await.into_graphql()
    }
}

#[derive(Default)]
pub struct GroupQuery;

#[Object]
impl GroupQuery {
    async fn get_group(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<String>,
    ) -> Response<Group> {
        resolve_get(ctx, GROUP_FETCHER, id, filter, sort).await
    }

    async fn list_groups(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
        per_page: Option<i32>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<Json<Value>>,
        search: Option<SearchInput>,
    ) -> ListResponse<Group> {
        let args = ListArgs {
            page,
            per_page,
            filter,
            sort,
            search,
        };
        resolve_list(ctx, GROUP_FETCHER, args).await
    }
}

#[derive(Default)]
pub struct GroupMutation;

#[Object]
impl GroupMutation {
    async fn create_group(&self, ctx: &Context<'_>, data: GroupInput) -> Response<Group> {
        resolve_create(ctx, GROUP_FETCHER, data).await
    }

    async fn update_group(&self, ctx: &Context<'_>, id: ID, data: GroupInput) -> Response<Group> {
        resolve_update(ctx, GROUP_FETCHER, id, data).await
    }

    async fn delete_group(&self, ctx: &Context<'_>, id: ID) -> DeleteResponse {
        resolve_delete(ctx, GROUP_FETCHER, id).await
    }
}
