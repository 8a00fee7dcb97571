//! Admin-side CRUD controllers driven over the GraphQL HTTP endpoint.

pub mod api_tokens;
pub mod client;
pub mod crud;

pub use self::{
    api_tokens::api_tokens,
    client::{ClientError, GraphqlClient, Transport},
    crud::{Crud, CrudConfig, Mode, Operation, Route},
};
