use async_graphql::{ComplexObject, Context, Json, Object, Result, SimpleObject, ID};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{
    envelope::{DeleteResponse, ListResponse, Response, SearchInput},
    resolvers::{
        current_user, entities, resolve_create, resolve_delete, resolve_get, resolve_list,
        resolve_update, EntityFetcher, ListArgs,
    },
    IntoGraphqlError,
};
use crate::entities::{
    Access, CurrentUserInput, Entities, Group, Role, User, UserInput, UserLogin, UserSettings,
};

const USER_FETCHER: EntityFetcher<User> = Entities::users;
const USER_SETTINGS_FETCHER: EntityFetcher<UserSettings> = Entities::user_settings;

/// Effective permissions of a user.
#[derive(Debug, Clone, SimpleObject)]
pub struct UserAccess {
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    pub full_access: bool,
}

impl From<Access> for UserAccess {
    fn from(access: Access) -> Self {
        Self {
            scopes: access.scopes,
            roles: access.roles,
            full_access: access.full_access,
        }
    }
}

fn full_name(user: &User) -> String {
    [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{}", hex::encode(digest))
}

#[ComplexObject]
impl User {
    async fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    async fn full_name(&self) -> String {
        full_name(self)
    }

    async fn gravatar(&self) -> String {
        gravatar_url(&self.email)
    }

    async fn groups(&self, ctx: &Context<'_>) -> Result<Vec<Group>> {
        let entities = entities(ctx).into_graphql()?;
        entities.groups().get_many(&self.groups).await.into_graphql()
    }

    async fn roles(&self, ctx: &Context<'_>) -> Result<Vec<Role>> {
        let entities = entities(ctx).into_graphql()?;
        entities.roles().get_many(&self.roles).await.into_graphql()
    }

    async fn scopes(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        Ok(self.access(ctx).await?.scopes)
    }

    async fn access(&self, ctx: &Context<'_>) -> Result<UserAccess> {
        let entities = entities(ctx).into_graphql()?;
        entities
            .access(&self.roles, &self.groups)
            .await
            .map(UserAccess::from)
            .into_graphql()
    }
}

#[ComplexObject]
impl UserSettings {
    async fn data(&self) -> Json<Value> {
        Json(self.data.clone())
    }
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// Get current user
    async fn get_current_user(&self, ctx: &Context<'_>) -> Response<User> {
        let result = match (current_user(ctx), entities(ctx)) {
            (Ok(user), Ok(entities)) => USER_FETCHER(entities).get(&user.id).await,
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        result.into()
    }

    /// Get settings of current user
    async fn get_current_user_settings(
        &self,
        ctx: &Context<'_>,
        key: String,
    ) -> Result<Option<Json<Value>>> {
        let user = current_user(ctx).into_graphql()?;
        let settings = USER_SETTINGS_FETCHER(entities(ctx).into_graphql()?);
        let data = settings.get_for(&user.id, &key).await.into_graphql()?;
        Ok(data.map(Json))
    }

    /// Get a single user by id or specific search criteria
    async fn get_user(
        &self,
        ctx: &Context<'_>,
        id: Option<ID>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<String>,
    ) -> Response<User> {
        resolve_get(ctx, USER_FETCHER, id, filter, sort).await
    }

    /// Get a list of users
    async fn list_users(
        &self,
        ctx: &Context<'_>,
        page: Option<i32>,
        per_page: Option<i32>,
        #[graphql(name = "where")] filter: Option<Json<Value>>,
        sort: Option<Json<Value>>,
        search: Option<SearchInput>,
    ) -> ListResponse<User> {
        let args = ListArgs {
            page,
            per_page,
            filter,
            sort,
            search,
        };
        resolve_list(ctx, USER_FETCHER, args).await
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Login user
    async fn login_user(
        &self,
        ctx: &Context<'_>,
        username: String,
        #[graphql(secret)] password: String,
        remember: Option<bool>,
    ) -> Response<UserLogin> {
        let result = match entities(ctx) {
            Ok(entities) => {
                USER_FETCHER(entities)
                    .login(&username, &password, remember.unwrap_or_default())
                    .await
            }
            Err(err) => Err(err),
        };
        result.into()
    }

    /// Login user using token
    async fn login_using_token(&self, ctx: &Context<'_>, token: String) -> Response<UserLogin> {
        let result = match entities(ctx) {
            Ok(entities) => USER_FETCHER(entities).login_using_token(&token).await,
            Err(err) => Err(err),
        };
        result.into()
    }

    /// Update current user
    async fn update_current_user(
        &self,
        ctx: &Context<'_>,
        data: CurrentUserInput,
    ) -> Response<User> {
        let result = match (current_user(ctx), entities(ctx)) {
            (Ok(user), Ok(entities)) => USER_FETCHER(entities).update_current(&user.id, data).await,
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        result.into()
    }

    /// Update settings of current user
    async fn update_current_user_settings(
        &self,
        ctx: &Context<'_>,
        key: String,
        data: Json<Value>,
    ) -> Result<Option<Json<Value>>> {
        let user = current_user(ctx).into_graphql()?;
        let settings = USER_SETTINGS_FETCHER(entities(ctx).into_graphql()?);
        let saved = settings
            .update_for(&user.id, &key, data.0)
            .await
            .into_graphql()?;
        Ok(Some(Json(saved)))
    }

    async fn create_user(&self, ctx: &Context<'_>, data: UserInput) -> Response<User> {
        resolve_create(ctx, USER_FETCHER, data).await
    }

    async fn update_user(&self, ctx: &Context<'_>, id: ID, data: UserInput) -> Response<User> {
        resolve_update(ctx, USER_FETCHER, id, data).await
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> DeleteResponse {
        resolve_delete(ctx, USER_FETCHER, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravatar_hashes_normalized_email() {
        assert_eq!(gravatar_url(" Ada@Example.com "), gravatar_url("ada@example.com"));
        let url = gravatar_url("ada@example.com");
        let hash = url.trim_start_matches("https://www.gravatar.com/avatar/");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|ch| ch.is_ascii_hexdigit()));
    }
}
