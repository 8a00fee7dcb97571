//! `{data, error}` and `{data, meta, error}` response envelopes.

use async_graphql::{InputObject, Json, OutputType, SimpleObject};
use serde_json::{json, Value};
use tracing::error;

use crate::entities::{
    ApiToken, EntityError, Group, Listing, Role, Search, SearchOperator, User, UserLogin,
};

/// Error payload carried by every envelope.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Error")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub data: Option<Json<Value>>,
}

impl From<EntityError> for ErrorResponse {
    fn from(err: EntityError) -> Self {
        if err.is_internal() {
            error!("security resolver failed: {err}");
            return Self {
                code: err.code().to_string(),
                message: "Internal server error.".to_string(),
                data: None,
            };
        }
        let data = match &err {
            EntityError::InvalidAttributes { fields, .. } => {
                Some(Json(json!({ "invalidFields": fields })))
            }
            EntityError::Forbidden(scope) => Some(Json(json!({ "scope": scope }))),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            data,
        }
    }
}

#[derive(Debug, SimpleObject)]
#[graphql(concrete(name = "UserResponse", params(User)))]
#[graphql(concrete(name = "UserLoginResponse", params(UserLogin)))]
#[graphql(concrete(name = "RoleResponse", params(Role)))]
#[graphql(concrete(name = "GroupResponse", params(Group)))]
#[graphql(concrete(name = "ApiTokenResponse", params(ApiToken)))]
pub struct Response<T: OutputType> {
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T: OutputType> From<Result<T, EntityError>> for Response<T> {
    fn from(result: Result<T, EntityError>) -> Self {
        match result {
            Ok(data) => Self {
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                data: None,
                error: Some(err.into()),
            },
        }
    }
}

/// Pagination details of a list response.
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct ListMeta {
    pub total_count: i64,
    pub total_pages: i64,
    pub page: i64,
    pub per_page: i64,
    pub from: i64,
    pub to: i64,
    pub previous_page: Option<i64>,
    pub next_page: Option<i64>,
}

impl ListMeta {
    #[must_use]
    pub fn new(total: u64, page: u64, per_page: u64) -> Self {
        let total = i64::try_from(total).unwrap_or(i64::MAX);
        let page = i64::try_from(page).unwrap_or(i64::MAX).max(1);
        let per_page = i64::try_from(per_page).unwrap_or(i64::MAX).max(1);
        let total_pages = (total + per_page - 1) / per_page;
        let offset = (page - 1).saturating_mul(per_page);
        let (from, to) = if offset >= total {
            (0, 0)
        } else {
            (offset + 1, page.saturating_mul(per_page).min(total))
        };
        Self {
            total_count: total,
            total_pages,
            page,
            per_page,
            from,
            to,
            previous_page: (page > 1).then(|| page - 1),
            next_page: (page < total_pages).then(|| page + 1),
        }
    }
}

#[derive(Debug, SimpleObject)]
#[graphql(concrete(name = "UserListResponse", params(User)))]
#[graphql(concrete(name = "RoleListResponse", params(Role)))]
#[graphql(concrete(name = "GroupListResponse", params(Group)))]
#[graphql(concrete(name = "ApiTokenListResponse", params(ApiToken)))]
pub struct ListResponse<T: OutputType> {
    pub data: Option<Vec<T>>,
    pub meta: Option<ListMeta>,
    pub error: Option<ErrorResponse>,
}

impl<T: OutputType> From<Result<Listing<T>, EntityError>> for ListResponse<T> {
    fn from(result: Result<Listing<T>, EntityError>) -> Self {
        match result {
            Ok(listing) => Self {
                meta: Some(ListMeta::new(listing.total, listing.page, listing.per_page)),
                data: Some(listing.items),
                error: None,
            },
            Err(err) => Self {
                data: None,
                meta: None,
                error: Some(err.into()),
            },
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct DeleteResponse {
    pub data: Option<bool>,
    pub error: Option<ErrorResponse>,
}

impl From<Result<(), EntityError>> for DeleteResponse {
    fn from(result: Result<(), EntityError>) -> Self {
        match result {
            Ok(()) => Self {
                data: Some(true),
                error: None,
            },
            Err(err) => Self {
                data: None,
                error: Some(err.into()),
            },
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct SearchInput {
    pub query: String,
    pub fields: Vec<String>,
    /// `or` (default) or `and`.
    pub operator: Option<String>,
}

impl TryFrom<SearchInput> for Search {
    type Error = EntityError;

    fn try_from(input: SearchInput) -> Result<Self, Self::Error> {
        let operator = match input.operator.as_deref().map(str::trim) {
            None | Some("") => SearchOperator::Or,
            Some(op) if op.eq_ignore_ascii_case("or") => SearchOperator::Or,
            Some(op) if op.eq_ignore_ascii_case("and") => SearchOperator::And,
            Some(op) => {
                return Err(EntityError::invalid(
                    "search",
                    format!("Unknown search operator \"{op}\"."),
                ))
            }
        };
        Ok(Self {
            query: input.query,
            fields: input.fields,
            operator,
        })
    }
}
