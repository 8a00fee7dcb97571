//! GraphQL-over-HTTP client used by the admin CRUD controllers.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use url::Url;

use super::crud::Operation;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("graphql errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    #[error("{code}: {message}")]
    Envelope { code: String, message: String },
    #[error("response has no value at `{0}`")]
    MissingResponse(String),
}

/// Executes named GraphQL operations and returns the `data` object.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, ClientError>;
}

#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl GraphqlClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: Url) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            token: None,
        })
    }

    /// Authenticate every request with `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }
}

/// Split a GraphQL response body into its `data`, failing on `errors`.
pub(crate) fn into_data(body: Value) -> Result<Value, ClientError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|error| {
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string()
                })
                .collect();
            return Err(ClientError::GraphQl(messages));
        }
    }
    match body.get("data") {
        Some(data) if !data.is_null() => Ok(data.clone()),
        _ => Err(ClientError::MissingResponse("data".to_string())),
    }
}

#[async_trait]
impl Transport for GraphqlClient {
    async fn execute(&self, operation: &Operation, variables: Value) -> Result<Value, ClientError> {
        let span = info_span!(
            "graphql.request",
            http.method = "POST",
            url = %self.endpoint,
            operation = operation.name
        );
        let mut request = self.client.post(self.endpoint.clone()).json(&json!({
            "operationName": operation.name,
            "query": operation.document,
            "variables": variables,
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request.send().instrument(span).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        debug!(operation = operation.name, "graphql response received");
        into_data(body)
    }
}
