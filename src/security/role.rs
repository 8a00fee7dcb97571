use async_graphql::{ComplexObject, Context, Json, Object, ID};
use serde_json::Value;

use super::{
    envelope::{DeleteResponse, ListResponse, Response, SearchInput},
    resolvers::{
        resolve_create, resolve_delete, resolve_get, resolve_list, resolve_update, EntityFetcher,
        ListArgs,
    },
};
use crate::entities::{Entities, Role, RoleInput};

const ROLE_FETCHER: EntityFetcher<Role> = Entities::roles;

#[ComplexObject]
impl Role {
    async fn id(&self) -> ID {
        ID::from(self.id.clone())
    }
}

#[derive(Default)]
pub struct RoleQuery;

#[Object]
impl RoleQuery {
    async fn get_role(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<String>,
    ) -> Response<Role> {
        resolve_get(ctx, ROLE_FETCHER, id, filter, sort).await
    }

    async fn list_roles(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
        per_page: Option<i32>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<Json<Value>>,
        search: Option<SearchInput>,
    ) -> ListResponse<Role> {
        let args = ListArgs {
            page,
            per_page,
            filter,
            sort,
            search,
        };
        resolve_list(ctx, ROLE_FETCHER, args).await
    }
}

#[derive(Default)]
pub struct RoleMutation;

#[Object]
impl RoleMutation {
    async fn create_role(&self, ctx: &Context<'_>, data: RoleInput) -> Response<Role> {
        resolve_create(ctx, ROLE_FETCHER, data).await
    }

    async fn update_role(&self, ctx: &Context<'_>, id: ID, data: RoleInput) -> Response<Role> {
        resolve_update(ctx, ROLE_FETCHER, id, data).await
    }

    async fn delete_role(&self, ctx: &Context<'_>, id: ID) -> DeleteResponse {
        resolve_delete(ctx, ROLE_FETCHER, id).await
    }
}
