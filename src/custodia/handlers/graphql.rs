use crate::{
    entities::{identity::authenticate, Entities},
    security::SecuritySchema,
};
use async_graphql::http::GraphiQLSource;
use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{Html, IntoResponse, Json},
};
use tracing::{debug, instrument};

/// Token from `Authorization: Bearer <token>`, if any.
fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

// axum handler for POST /graphql
#[instrument(skip_all)]
pub async fn graphql(
    Extension(schema): Extension<SecuritySchema>,
    Extension(entities): Extension<Entities>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let mut request = request;

    // An unusable token leaves the request anonymous; resolvers decide what
    // that means for each field.
    if let Some(token) = bearer(&headers) {
        match authenticate(&entities, token).await {
            Ok(identity) => request = request.data(identity),
            Err(err) => debug!("Ignoring bearer token: {}", err),
        }
    }

    Json(schema.execute(request).await)
}

// axum handler for GET /graphql
pub async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extracts_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  abc "));
        assert_eq!(bearer(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer(&headers), None);
    }
}
