//! API tokens admin view: list on the left, form on the right.

use serde_json::{json, Map, Value};

use super::{
    client::Transport,
    crud::{
        get_path, Crud, CrudConfig, FormConfig, FormGet, FormSave, ListConfig, ListDelete,
        ListGet, Operation,
    },
};

pub const LOAD_API_TOKENS: Operation = Operation {
    name: "loadApiTokens",
    document: concat!(
        "query loadApiTokens($where: JSON, $sort: JSON, $page: Int, $perPage: Int, $search: SearchInput) {\n",
        "  security {\n",
        "    tokens: listApiTokens(where: $where, sort: $sort, page: $page, perPage: $perPage, search: $search) {\n",
        "      data { id name description createdOn savedOn }\n",
        "      meta { totalCount from to nextPage previousPage }\n",
        "      error { code message data }\n",
        "    }\n",
        "  }\n",
        "}"
    ),
};

pub const LOAD_API_TOKEN: Operation = Operation {
    name: "loadApiToken",
    document: concat!(
        "query loadApiToken($id: ID!) {\n",
        "  security {\n",
        "    token: getApiToken(id: $id) {\n",
        "      data { id name description token roles { id name } groups { id name } createdOn savedOn }\n",
        "      error { code message data }\n",
        "    }\n",
        "  }\n",
        "}"
    ),
};

pub const CREATE_API_TOKEN: Operation = Operation {
    name: "createApiToken",
    document: concat!(
        "mutation createApiToken($data: ApiTokenInput!) {\n",
        "  security {\n",
        "    token: createApiToken(data: $data) {\n",
        "      data { id name description token roles { id name } groups { id name } createdOn savedOn }\n",
        "      error { code message data }\n",
        "    }\n",
        "  }\n",
        "}"
    ),
};

pub const UPDATE_API_TOKEN: Operation = Operation {
    name: "updateApiToken",
    document: concat!(
        "mutation updateApiToken($id: ID!, $data: ApiTokenInput!) {\n",
        "  security {\n",
        "    token: updateApiToken(id: $id, data: $data) {\n",
        "      data { id name description token roles { id name } groups { id name } createdOn savedOn }\n",
        "      error { code message data }\n",
        "    }\n",
        "  }\n",
        "}"
    ),
};

pub const DELETE_API_TOKEN: Operation = Operation {
    name: "deleteApiToken",
    document: concat!(
        "mutation deleteApiToken($id: ID!) {\n",
        "  security {\n",
        "    deleteApiToken(id: $id) {\n",
        "      data\n",
        "      error { code message data }\n",
        "    }\n",
        "  }\n",
        "}"
    ),
};

pub fn tokens_response(data: &Value) -> Option<&Value> {
    get_path(data, "security.tokens")
}

pub fn token_response(data: &Value) -> Option<&Value> {
    get_path(data, "security.token")
}

pub fn delete_response(data: &Value) -> Option<&Value> {
    get_path(data, "security.deleteApiToken")
}

fn name_of(data: &Value) -> &str {
    data.get("name").and_then(Value::as_str).unwrap_or_default()
}

pub fn deleted_snackbar(data: &Value) -> String {
    format!("ApiToken {} deleted.", name_of(data))
}

pub fn saved_snackbar(data: &Value) -> String {
    format!("ApiToken {} saved successfully.", name_of(data))
}

fn ids(form: &Value, key: &str) -> Vec<Value> {
    form.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("id").cloned())
                .collect()
        })
        .unwrap_or_default()
}

/// Keep only `name` and `description`, and reduce `roles`/`groups` objects to their ids.
pub fn save_variables(form: &Value) -> Value {
    let mut data = Map::new();
    for key in ["name", "description"] {
        if let Some(value) = form.get(key) {
            data.insert(key.to_string(), value.clone());
        }
    }
    data.insert("roles".to_string(), Value::Array(ids(form, "roles")));
    data.insert("groups".to_string(), Value::Array(ids(form, "groups")));
    json!({ "data": data })
}

#[must_use]
pub fn crud_config() -> CrudConfig {
    let mut list_variables = Map::new();
    list_variables.insert("sort".to_string(), json!({ "savedOn": -1 }));

    CrudConfig {
        list: ListConfig {
            get: ListGet {
                query: LOAD_API_TOKENS,
                variables: list_variables,
                response: tokens_response,
            },
            delete: ListDelete {
                name: "deleteApiToken",
                mutation: DELETE_API_TOKEN,
                response: delete_response,
                snackbar: deleted_snackbar,
            },
        },
        form: FormConfig {
            get: FormGet {
                query: LOAD_API_TOKEN,
                response: token_response,
            },
            save: FormSave {
                create: CREATE_API_TOKEN,
                update: UPDATE_API_TOKEN,
                response: token_response,
                variables: save_variables,
                snackbar: saved_snackbar,
            },
        },
    }
}

/// The API tokens view bound to `transport`.
pub fn api_tokens<T: Transport>(transport: T) -> Crud<T> {
    Crud::new(crud_config(), transport)
}
