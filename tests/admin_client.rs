#![allow(clippy::unwrap_used, clippy::expect_used)]

use custodia::{
    admin::{api_tokens, ClientError, GraphqlClient, Mode},
    custodia::router,
    entities::{
        install::{install, AdminAccount},
        Entities, MemoryStore, TokenKeys,
    },
};
use secrecy::SecretString;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use url::Url;

struct Server {
    endpoint: Url,
    entities: Entities,
    admin_id: String,
    full_access_role: String,
}

async fn serve() -> Server {
    let entities = Entities::new(
        Arc::new(MemoryStore::new()),
        TokenKeys::new(&SecretString::from("admin-client-secret".to_string()), 3600),
    );
    let installed = install(
        &entities,
        Some(&AdminAccount {
            email: "admin@example.com".to_string(),
            password: SecretString::from("administrator".to_string()),
        }),
    )
    .await
    .expect("install failed");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(entities.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        endpoint: Url::parse(&format!("http://{addr}/graphql")).unwrap(),
        entities,
        admin_id: installed.admin.unwrap().id,
        full_access_role: installed.role.unwrap().id,
    }
}

fn admin_client(server: &Server) -> GraphqlClient {
    let token = server
        .entities
        .tokens()
        .issue_session(&server.admin_id, false)
        .unwrap()
        .token;
    GraphqlClient::new(server.endpoint.clone())
        .unwrap()
        .with_token(SecretString::from(token))
}

#[tokio::test]
async fn api_tokens_view_round_trip() {
    let server = serve().await;
    let mut view = api_tokens(admin_client(&server));

    let list = view.load_list(Map::new()).await.unwrap();
    assert!(list.data.is_empty());
    assert_eq!(list.meta["totalCount"], 0);
    assert_eq!(list.variables["sort"], json!({ "savedOn": -1 }));

    // Create: the token string is minted server side.
    let saved = view
        .save(&json!({ "name": "CI", "description": "deploys", "token": "ignored" }))
        .await
        .unwrap();
    let id = saved["id"].as_str().unwrap().to_string();
    assert_ne!(saved["token"], "ignored");
    assert_eq!(view.mode(), Mode::Edit(id.clone()));
    assert_eq!(view.notifications(), ["ApiToken CI saved successfully."]);
    assert_eq!(view.list().data.len(), 1);

    // Update: roles are sent as ids and come back as objects.
    let saved = view
        .save(&json!({
            "id": id,
            "name": "CI bot",
            "roles": [{ "id": server.full_access_role, "name": "Full access" }],
        }))
        .await
        .unwrap();
    assert_eq!(saved["name"], "CI bot");
    assert_eq!(saved["description"], "deploys");

    let form = view.load_form().await.unwrap();
    assert_eq!(form["roles"][0]["id"], server.full_access_role.as_str());

    // Delete leaves the form and reloads the list.
    let item = view.list().data[0].clone();
    let message = view.delete(&item).await.unwrap();
    assert_eq!(message, "ApiToken CI bot deleted.");
    assert_eq!(view.mode(), Mode::New);
    assert!(view.list().data.is_empty());
}

#[tokio::test]
async fn envelope_errors_reach_the_caller() {
    let server = serve().await;
    let mut view = api_tokens(admin_client(&server));

    let err = view.save(&json!({ "description": "no name" })).await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Envelope { code, .. } if code == "INVALID_ATTRIBUTES"),
        "{err}"
    );
    assert!(view.notifications().is_empty());

    view.select("0190d6a4-0000-7000-8000-000000000000");
    let err = view.load_form().await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Envelope { code, .. } if code == "NOT_FOUND"),
        "{err}"
    );
}

#[tokio::test]
async fn anonymous_clients_are_rejected() {
    let server = serve().await;
    let client = GraphqlClient::new(server.endpoint.clone()).unwrap();
    let mut view = api_tokens(client);

    let err = view.load_list(Map::new()).await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Envelope { code, .. } if code == "UNAUTHORIZED"),
        "{err}"
    );
    assert_eq!(view.list().data, Vec::<Value>::new());
}
