//! Declarative list + form CRUD binding.
//!
//! A [`CrudConfig`] pairs GraphQL operations with variable-shaping,
//! response-extraction and notification callbacks. [`Crud`] executes it and
//! keeps the view state: the route params, the current list page and the form
//! being edited.

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::client::{ClientError, Transport};

/// A named GraphQL document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub document: &'static str,
}

/// Picks the envelope out of a response `data` object.
pub type ResponsePath = fn(&Value) -> Option<&Value>;
/// Builds a user-facing notification from an entity.
pub type Snackbar = fn(&Value) -> String;
/// Shapes form data into mutation variables.
pub type VariablesFn = fn(&Value) -> Value;

/// Navigate a dotted path such as `security.tokens`.
pub fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |value, key| value.get(key))
}

#[derive(Debug, Clone)]
pub struct ListGet {
    pub query: Operation,
    /// Applied on top of caller variables; cannot be overridden.
    pub variables: Map<String, Value>,
    pub response: ResponsePath,
}

#[derive(Debug, Clone)]
pub struct ListDelete {
    pub name: &'static str,
    pub mutation: Operation,
    pub response: ResponsePath,
    pub snackbar: Snackbar,
}

#[derive(Debug, Clone)]
pub struct FormGet {
    pub query: Operation,
    pub response: ResponsePath,
}

#[derive(Debug, Clone)]
pub struct FormSave {
    pub create: Operation,
    pub update: Operation,
    pub response: ResponsePath,
    pub variables: VariablesFn,
    pub snackbar: Snackbar,
}

#[derive(Debug, Clone)]
pub struct ListConfig {
    pub get: ListGet,
    pub delete: ListDelete,
}

#[derive(Debug, Clone)]
pub struct FormConfig {
    pub get: FormGet,
    pub save: FormSave,
}

#[derive(Debug, Clone)]
pub struct CrudConfig {
    pub list: ListConfig,
    pub form: FormConfig,
}

/// Route state shared by the list and the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pub params: Map<String, Value>,
}

impl Route {
    /// Navigate to `params`, keeping other params when `merge` is set.
    /// `null` values clear a param.
    pub fn go_to_route(&mut self, params: Map<String, Value>, merge: bool) {
        if !merge {
            self.params.clear();
        }
        for (key, value) in params {
            if value.is_null() {
                self.params.remove(&key);
            } else {
                self.params.insert(key, value);
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.params.get("id").and_then(Value::as_str)
    }
}

/// Whether the form creates a new entity or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    New,
    Edit(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListState {
    pub data: Vec<Value>,
    pub meta: Value,
    pub variables: Map<String, Value>,
}

/// Fail on an envelope `error`, otherwise return the envelope.
fn envelope<'a>(
    data: &'a Value,
    path: ResponsePath,
    name: &str,
) -> Result<&'a Value, ClientError> {
    let envelope = path(data).ok_or_else(|| ClientError::MissingResponse(name.to_string()))?;
    match envelope.get("error") {
        Some(error) if !error.is_null() => Err(ClientError::Envelope {
            code: error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => Ok(envelope),
    }
}

pub struct Crud<T> {
    config: CrudConfig,
    transport: T,
    route: Route,
    list: ListState,
    form: Value,
    notifications: Vec<String>,
}

impl<T: Transport> Crud<T> {
    pub fn new(config: CrudConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            route: Route::default(),
            list: ListState::default(),
            form: Value::Object(Map::new()),
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CrudConfig {
        &self.config
    }

    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    #[must_use]
    pub const fn list(&self) -> &ListState {
        &self.list
    }

    #[must_use]
    pub const fn form(&self) -> &Value {
        &self.form
    }

    #[must_use]
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.route
            .id()
            .map_or(Mode::New, |id| Mode::Edit(id.to_string()))
    }

    /// Start creating a new entity: clear the selected id, keep other params.
    pub fn add(&mut self) {
        let mut params = Map::new();
        params.insert("id".to_string(), Value::Null);
        self.route.go_to_route(params, true);
        self.form = Value::Object(Map::new());
    }

    /// Select an entity for editing.
    pub fn select(&mut self, id: &str) {
        let mut params = Map::new();
        params.insert("id".to_string(), Value::String(id.to_string()));
        self.route.go_to_route(params, true);
    }

    /// Load the list with caller `variables` plus the fixed list variables.
    ///
    /// # Errors
    /// Returns transport, GraphQL or envelope errors.
    #[instrument(skip(self, variables))]
    pub async fn load_list(&mut self, variables: Map<String, Value>) -> Result<&ListState, ClientError> {
        let get = &self.config.list.get;
        let mut merged = variables;
        for (key, value) in &get.variables {
            merged.insert(key.clone(), value.clone());
        }

        let data = self
            .transport
            .execute(&get.query, Value::Object(merged.clone()))
            .await?;
        let envelope = envelope(&data, get.response, get.query.name)?;

        self.list = ListState {
            data: envelope
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            meta: envelope.get("meta").cloned().unwrap_or(Value::Null),
            variables: merged,
        };
        debug!(rows = self.list.data.len(), "list loaded");
        Ok(&self.list)
    }

    /// Delete `item`, notify, leave the form if it showed `item`, and reload the list.
    ///
    /// # Errors
    /// Returns transport, GraphQL or envelope errors of the delete. A failed
    /// reload is logged and leaves the previous list in place.
    #[instrument(skip(self, item))]
    pub async fn delete(&mut self, item: &Value) -> Result<String, ClientError> {
        let delete = &self.config.list.delete;
        let id = item.get("id").cloned().unwrap_or(Value::Null);
        let mut variables = Map::new();
        variables.insert("id".to_string(), id.clone());

        let data = self
            .transport
            .execute(&delete.mutation, Value::Object(variables))
            .await?;
        envelope(&data, delete.response, delete.name)?;

        let message = (delete.snackbar)(item);
        self.notifications.push(message.clone());

        if id.as_str().is_some() && self.route.id() == id.as_str() {
            self.add();
        }
        self.reload_list().await;
        Ok(message)
    }

    /// Load the form for the selected entity, or reset it in new mode.
    ///
    /// # Errors
    /// Returns transport, GraphQL or envelope errors.
    #[instrument(skip(self))]
    pub async fn load_form(&mut self) -> Result<&Value, ClientError> {
        let Mode::Edit(id) = self.mode() else {
            self.form = Value::Object(Map::new());
            return Ok(&self.form);
        };
        let get = &self.config.form.get;
        let mut variables = Map::new();
        variables.insert("id".to_string(), Value::String(id));

        let data = self
            .transport
            .execute(&get.query, Value::Object(variables))
            .await?;
        let envelope = envelope(&data, get.response, get.query.name)?;
        self.form = envelope.get("data").cloned().unwrap_or(Value::Null);
        Ok(&self.form)
    }

    /// Create or update from `form`, notify, select the saved entity and reload the list.
    ///
    /// # Errors
    /// Returns transport, GraphQL or envelope errors of the mutation. A failed
    /// reload is logged and leaves the previous list in place.
    #[instrument(skip(self, form))]
    pub async fn save(&mut self, form: &Value) -> Result<Value, ClientError> {
        let save = &self.config.form.save;
        let mut variables = match (save.variables)(form) {
            Value::Object(variables) => variables,
            _ => Map::new(),
        };
        let operation = match form.get("id").and_then(Value::as_str) {
            Some(id) => {
                variables.insert("id".to_string(), Value::String(id.to_string()));
                save.update
            }
            None => save.create,
        };

        let data = self
            .transport
            .execute(&operation, Value::Object(variables))
            .await?;
        let saved = envelope(&data, save.response, operation.name)?
            .get("data")
            .cloned()
            .unwrap_or(Value::Null);

        self.notifications.push((save.snackbar)(&saved));
        if let Some(id) = saved.get("id").and_then(Value::as_str) {
            self.select(id);
        }
        self.form = saved.clone();
        self.reload_list().await;
        Ok(saved)
    }

    /// Refresh the list with its last variables after a mutation went through.
    async fn reload_list(&mut self) {
        let variables = self.list.variables.clone();
        if let Err(err) = self.load_list(variables).await {
            warn!("Failed to reload the list: {err}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_path_navigates_dotted_keys() {
        let data = json!({"security": {"tokens": {"data": []}}});
        assert_eq!(get_path(&data, "security.tokens"), Some(&json!({"data": []})));
        assert_eq!(get_path(&data, "security.token"), None);
        assert_eq!(get_path(&json!(null), "security"), None);
    }

    #[test]
    fn go_to_route_merges_and_clears() {
        let mut route = Route::default();
        let mut params = Map::new();
        params.insert("id".to_string(), json!("t1"));
        params.insert("search".to_string(), json!("ci"));
        route.go_to_route(params, true);
        assert_eq!(route.id(), Some("t1"));

        let mut params = Map::new();
        params.insert("id".to_string(), Value::Null);
        route.go_to_route(params, true);
        assert_eq!(route.id(), None);
        assert_eq!(route.params.get("search"), Some(&json!("ci")));

        route.go_to_route(Map::new(), false);
        assert!(route.params.is_empty());
    }

    #[test]
    fn envelope_errors_are_surfaced() {
        fn path(data: &Value) -> Option<&Value> {
            get_path(data, "security.token")
        }
        let data = json!({"security": {"token": {"data": null, "error": {"code": "NOT_FOUND", "message": "ApiToken not found."}}}});
        let err = envelope(&data, path, "loadApiToken").unwrap_err();
        assert_eq!(err.to_string(), "NOT_FOUND: ApiToken not found.");

        let err = envelope(&json!({}), path, "loadApiToken").unwrap_err();
        assert!(matches!(err, ClientError::MissingResponse(name) if name == "loadApiToken"));
    }
}
