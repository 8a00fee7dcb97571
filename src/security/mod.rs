//! GraphQL schema of the security module.
//!
//! Every field lives under `query { security { … } }` and
//! `mutation { security { … } }`. Admin CRUD fields are wired to the generic
//! factories in [`resolvers`]; login and current-user fields are thin wrappers
//! around the same entity accessors.

pub mod api_token;
pub mod envelope;
pub mod group;
pub mod resolvers;
pub mod role;
pub mod user;

use async_graphql::{EmptySubscription, ErrorExtensions, MergedObject, Object, Schema};

use self::{
    api_token::{ApiTokenMutation, ApiTokenQuery},
    envelope::ErrorResponse,
    group::{GroupMutation, GroupQuery},
    role::{RoleMutation, RoleQuery},
    user::{UserMutation, UserQuery},
};
use crate::entities::{Avatar, Entities, EntityError, UserSettings};

pub type SecuritySchema = Schema<Query, Mutation, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct SecurityQuery(UserQuery, RoleQuery, GroupQuery, ApiTokenQuery);

#[derive(MergedObject, Default)]
pub struct SecurityMutation(UserMutation, RoleMutation, GroupMutation, ApiTokenMutation);

#[derive(Default)]
pub struct Query;

#[Object]
impl Query {
    async fn security(&self) -> SecurityQuery {
        SecurityQuery::default()
    }
}

#[derive(Default)]
pub struct Mutation;

#[Object]
impl Mutation {
    async fn security(&self) -> SecurityMutation {
        SecurityMutation::default()
    }
}

/// Build the schema with `entities` available to every resolver.
#[must_use]
pub fn schema(entities: Entities) -> SecuritySchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(entities)
        .register_output_type::<UserSettings>()
        .register_output_type::<Avatar>()
        .finish()
}

/// Convert an entity error into a GraphQL error for fields that return plain
/// JSON instead of an envelope. The envelope code is kept in `extensions.code`.
pub(crate) fn graphql_error(err: EntityError) -> async_graphql::Error {
    let ErrorResponse { code, message, .. } = ErrorResponse::from(err);
    async_graphql::Error::new(message).extend_with(|_, extensions| extensions.set("code", code))
}

pub(crate) trait IntoGraphqlError<T> {
    fn into_graphql(self) -> async_graphql::Result<T>;
}

impl<T> IntoGraphqlError<T> for Result<T, EntityError> {
    fn into_graphql(self) -> async_graphql::Result<T> {
        self.map_err(graphql_error)
    }
}
