//! Users, their credentials and session logins.

use async_graphql::{InputObject, SimpleObject, ID};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    error::EntityError,
    password::{hash_password, verify_dummy, verify_password},
    settings::UserSettings,
    store::StoreQuery,
    token::{Claims, TokenKind},
    Entities, Entity, Model,
};

/// An uploaded file reference, used for avatars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct File {
    pub name: Option<String>,
    pub size: Option<i64>,
    #[serde(rename = "type")]
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
}

/// Avatar image metadata, declared in the schema alongside [`File`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Avatar {
    pub name: Option<String>,
    pub size: Option<i64>,
    #[serde(rename = "type")]
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
}

impl From<File> for Avatar {
    fn from(file: File) -> Self {
        Self {
            name: file.name,
            size: file.size,
            kind: file.kind,
            src: file.src,
        }
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct FileInput {
    pub name: Option<String>,
    pub size: Option<i64>,
    #[graphql(name = "type")]
    pub kind: Option<String>,
    pub src: Option<String>,
}

impl From<FileInput> for File {
    fn from(input: FileInput) -> Self {
        Self {
            name: input.name,
            size: input.size,
            kind: input.kind,
            src: input.src,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
#[serde(rename_all = "camelCase")]
#[graphql(complex)]
pub struct User {
    #[graphql(skip)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<File>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[graphql(skip)]
    #[serde(default)]
    pub groups: Vec<String>,
    #[graphql(skip)]
    #[serde(default)]
    pub roles: Vec<String>,
    /// Argon2id PHC string.
    #[graphql(skip)]
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub created_on: DateTime<Utc>,
    pub saved_on: DateTime<Utc>,
}

const fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, InputObject)]
pub struct UserInput {
    pub email: Option<String>,
    #[graphql(secret)]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<FileInput>,
    pub enabled: Option<bool>,
    pub groups: Option<Vec<ID>>,
    pub roles: Option<Vec<ID>>,
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default, InputObject)]
pub struct CurrentUserInput {
    pub email: Option<String>,
    #[graphql(secret)]
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<FileInput>,
}

impl From<CurrentUserInput> for UserInput {
    fn from(input: CurrentUserInput) -> Self {
        Self {
            email: input.email,
            password: input.password,
            first_name: input.first_name,
            last_name: input.last_name,
            avatar: input.avatar,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct UserLogin {
    pub token: String,
    /// Unix seconds.
    pub expires_on: i64,
    pub user: User,
}

pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Trim, lowercase and validate an email address.
///
/// # Errors
/// Returns `INVALID_ATTRIBUTES` for malformed addresses.
pub fn normalize_email(email: &str) -> Result<String, EntityError> {
    let email = email.trim().to_lowercase();
    if !valid_email(&email) {
        return Err(EntityError::invalid("email", "Invalid email address."));
    }
    Ok(email)
}

pub(crate) fn ids(values: Vec<ID>) -> Vec<String> {
    values.into_iter().map(|id| id.0).collect()
}

#[async_trait]
impl Model for User {
    type Input = UserInput;

    const COLLECTION: &'static str = "users";
    const NAME: &'static str = "User";
    const SCOPE: &'static str = "security:user:crud";
    const UNIQUE: &'static [&'static str] = &["email"];
    const PRIVATE: &'static [&'static str] = &["password"];

    async fn prepare(
        entities: &Entities,
        id: Uuid,
        input: UserInput,
        existing: Option<&Self>,
    ) -> Result<Map<String, Value>, EntityError> {
        let mut document = Map::new();

        match input.email {
            Some(email) => {
                let email = normalize_email(&email)?;
                entities.users().ensure_unique(id, "email", &email).await?;
                document.insert("email".to_string(), Value::String(email));
            }
            None if existing.is_none() => {
                return Err(EntityError::invalid("email", "Email is required."));
            }
            None => {}
        }

        match input.password {
            Some(password) => {
                document.insert("password".to_string(), Value::String(hash_password(&password)?));
            }
            None if existing.is_none() => {
                return Err(EntityError::invalid("password", "Password is required."));
            }
            None => {}
        }

        if let Some(first_name) = input.first_name {
            document.insert("firstName".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = input.last_name {
            document.insert("lastName".to_string(), json!(last_name.trim()));
        }
        if let Some(avatar) = input.avatar {
            document.insert("avatar".to_string(), serde_json::to_value(File::from(avatar))?);
        }

        match input.enabled {
            Some(enabled) => {
                document.insert("enabled".to_string(), Value::Bool(enabled));
            }
            None if existing.is_none() => {
                document.insert("enabled".to_string(), Value::Bool(true));
            }
            None => {}
        }

        if let Some(groups) = input.groups {
            let groups = entities.groups().ensure_exist("groups", &ids(groups)).await?;
            document.insert("groups".to_string(), json!(groups));
        } else if existing.is_none() {
            document.insert("groups".to_string(), json!([]));
        }
        if let Some(roles) = input.roles {
            let roles = entities.roles().ensure_exist("roles", &ids(roles)).await?;
            document.insert("roles".to_string(), json!(roles));
        } else if existing.is_none() {
            document.insert("roles".to_string(), json!([]));
        }

        Ok(document)
    }

    async fn after_delete(entities: &Entities, id: Uuid) -> Result<(), EntityError> {
        let mut filter = Map::new();
        filter.insert("user".to_string(), Value::String(id.to_string()));
        let store = entities.store();
        let found = store
            .find(UserSettings::COLLECTION, &StoreQuery::filter(filter))
            .await?;
        for record in found.records {
            store.delete(UserSettings::COLLECTION, record.id).await?;
        }
        Ok(())
    }
}

impl Entity<User> {
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, EntityError> {
        let mut filter = Map::new();
        filter.insert(
            "email".to_string(),
            Value::String(email.trim().to_lowercase()),
        );
        self.find_one(filter, Vec::new()).await
    }

    /// Check credentials and mint a session token.
    ///
    /// # Errors
    /// Returns `INVALID_CREDENTIALS` for unknown users or wrong passwords and
    /// `USER_DISABLED` for disabled accounts.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        remember: bool,
    ) -> Result<UserLogin, EntityError> {
        let Some(user) = self.find_by_email(username).await? else {
            verify_dummy(password);
            return Err(EntityError::InvalidCredentials);
        };
        let verified = match user.password.as_deref() {
            Some(hash) => verify_password(password, hash),
            None => verify_dummy(password),
        };
        if !verified {
            debug!(user = %user.id, "password mismatch");
            return Err(EntityError::InvalidCredentials);
        }
        if !user.enabled {
            return Err(EntityError::UserDisabled);
        }

        let issued = self.entities().tokens().issue_session(&user.id, remember)?;
        Ok(UserLogin {
            token: issued.token,
            expires_on: issued.expires_on,
            user,
        })
    }

    /// Revalidate a session token and reload its user.
    ///
    /// # Errors
    /// Returns `INVALID_TOKEN` for bad tokens or deleted users and
    /// `USER_DISABLED` for disabled accounts.
    #[instrument(skip_all)]
    pub async fn login_using_token(&self, token: &str) -> Result<UserLogin, EntityError> {
        let Claims { sub, kind, exp, .. } = self.entities().tokens().verify(token)?;
        if kind != TokenKind::User {
            return Err(EntityError::InvalidToken);
        }
        let user = self.get(&sub).await.map_err(|err| match err {
            EntityError::NotFound(_) => EntityError::InvalidToken,
            other => other,
        })?;
        if !user.enabled {
            return Err(EntityError::UserDisabled);
        }
        Ok(UserLogin {
            token: token.trim().to_string(),
            expires_on: exp.unwrap_or_default(),
            user,
        })
    }

    /// Apply a self-service profile update.
    ///
    /// # Errors
    /// Same as [`Entity::update`].
    pub async fn update_current(
        &self,
        user_id: &str,
        input: CurrentUserInput,
    ) -> Result<User, EntityError> {
        self.update(user_id, input.into()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::{test_support, ListParams, RoleInput, Search, SearchOperator, Sort};

    fn input(email: &str, password: &str) -> UserInput {
        UserInput {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            first_name: Some(" Ada ".to_string()),
            last_name: Some("Lovelace".to_string()),
            ..UserInput::default()
        }
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Ada@Example.COM ").unwrap(),
            "ada@example.com"
        );
        assert_eq!(normalize_email("nope").unwrap_err().code(), "INVALID_ATTRIBUTES");
    }

    #[tokio::test]
    async fn create_normalizes_and_hides_password() {
        let entities = test_support::entities();
        let user = entities
            .users()
            .create(input("ADA@example.com", "analytical-engine"))
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert!(user.enabled);
        assert!(user.password.as_deref().is_some_and(|hash| hash.starts_with("$argon2id$")));
        assert!(serde_json::to_value(&user).unwrap().get("password").is_none());
    }

    #[tokio::test]
    async fn create_requires_email_and_password() {
        let entities = test_support::entities();
        let err = entities
            .users()
            .create(UserInput {
                password: Some("long-enough".to_string()),
                ..UserInput::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");

        let err = entities
            .users()
            .create(UserInput {
                email: Some("a@example.com".to_string()),
                ..UserInput::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Password is required.");
    }

    #[tokio::test]
    async fn email_must_be_unique() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();
        let err = users
            .create(input(" Ada@Example.com", "password2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        // Re-saving the same address on the owner is fine.
        users
            .update(
                &ada.id,
                UserInput {
                    email: Some("ada@example.com".to_string()),
                    ..UserInput::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_keep_email_unique() {
        let entities = test_support::entities();
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let users = entities.users();
                tokio::spawn(async move {
                    users
                        .create(input("dup@example.com", &format!("password-{n}")))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert_eq!(err.code(), "CONFLICT"),
            }
        }
        assert_eq!(created, 1);

        let mut filter = Map::new();
        filter.insert("email".to_string(), json!("dup@example.com"));
        let listing = entities
            .users()
            .list(ListParams {
                filter,
                ..ListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(listing.total, 1);
    }

    #[tokio::test]
    async fn update_cannot_take_another_email() {
        let entities = test_support::entities();
        let users = entities.users();
        users.create(input("ada@example.com", "password1")).await.unwrap();
        let bob = users.create(input("bob@example.com", "password2")).await.unwrap();
        let err = users
            .update(
                &bob.id,
                UserInput {
                    email: Some("ada@example.com".to_string()),
                    ..UserInput::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(users.get(&bob.id).await.unwrap().email, "bob@example.com");
    }

    #[tokio::test]
    async fn password_hash_cannot_be_queried() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();
        let hash = ada.password.clone().unwrap();

        let err = users
            .list(ListParams {
                search: Some(Search {
                    query: "$argon2id$".to_string(),
                    fields: vec!["email".to_string(), "password".to_string()],
                    operator: SearchOperator::Or,
                }),
                ..ListParams::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");

        let mut filter = Map::new();
        filter.insert("password".to_string(), json!(hash));
        let err = users
            .list(ListParams {
                filter: filter.clone(),
                ..ListParams::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");
        let err = users.find_one(filter, Vec::new()).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");

        let err = users
            .find_one(Map::new(), vec![Sort::asc("password")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Field \"password\" cannot be queried.");

        // Public fields still work.
        let found = users
            .list(ListParams {
                search: Some(Search {
                    query: "ada@".to_string(),
                    fields: vec!["email".to_string()],
                    operator: SearchOperator::Or,
                }),
                ..ListParams::default()
            })
            .await
            .unwrap();
        assert_eq!(found.total, 1);
    }

    #[tokio::test]
    async fn update_is_partial() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();
        let updated = users
            .update(
                &ada.id,
                UserInput {
                    last_name: Some("Byron".to_string()),
                    enabled: Some(false),
                    ..UserInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name.as_deref(), Some("Ada"));
        assert_eq!(updated.last_name.as_deref(), Some("Byron"));
        assert!(!updated.enabled);
        assert_eq!(updated.password, ada.password);
        assert_eq!(updated.created_on, ada.created_on);
    }

    #[tokio::test]
    async fn roles_must_exist() {
        let entities = test_support::entities();
        let err = entities
            .users()
            .create(UserInput {
                roles: Some(vec![ID::from(Uuid::now_v7().to_string())]),
                ..input("ada@example.com", "password1")
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_ATTRIBUTES");

        let role = entities
            .roles()
            .create(RoleInput {
                name: Some("Editors".to_string()),
                ..RoleInput::default()
            })
            .await
            .unwrap();
        let user = entities
            .users()
            .create(UserInput {
                roles: Some(vec![ID::from(role.id.clone())]),
                ..input("ada@example.com", "password1")
            })
            .await
            .unwrap();
        assert_eq!(user.roles, vec![role.id]);
    }

    #[tokio::test]
    async fn login_round_trip() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();

        let login = users.login(" ADA@example.com", "password1", false).await.unwrap();
        assert_eq!(login.user.id, ada.id);

        let again = users.login_using_token(&login.token).await.unwrap();
        assert_eq!(again.user.id, ada.id);
        assert_eq!(again.expires_on, login.expires_on);
        assert_eq!(again.token, login.token);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_unknown_user_and_disabled() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();

        let err = users.login("ada@example.com", "password2", false).await.unwrap_err();
        assert!(matches!(err, EntityError::InvalidCredentials));
        let err = users.login("bob@example.com", "password1", false).await.unwrap_err();
        assert!(matches!(err, EntityError::InvalidCredentials));

        let login = users.login("ada@example.com", "password1", false).await.unwrap();
        users
            .update(
                &ada.id,
                UserInput {
                    enabled: Some(false),
                    ..UserInput::default()
                },
            )
            .await
            .unwrap();
        let err = users.login("ada@example.com", "password1", false).await.unwrap_err();
        assert!(matches!(err, EntityError::UserDisabled));
        let err = users.login_using_token(&login.token).await.unwrap_err();
        assert!(matches!(err, EntityError::UserDisabled));
    }

    #[tokio::test]
    async fn login_using_token_rejects_deleted_users_and_api_tokens() {
        let entities = test_support::entities();
        let users = entities.users();
        let ada = users.create(input("ada@example.com", "password1")).await.unwrap();
        let login = users.login("ada@example.com", "password1", true).await.unwrap();
        users.delete(&ada.id).await.unwrap();
        let err = users.login_using_token(&login.token).await.unwrap_err();
        assert!(matches!(err, EntityError::InvalidToken));

        let api = entities.tokens().issue_api_token(&ada.id).unwrap();
        let err = users.login_using_token(&api).await.unwrap_err();
        assert!(matches!(err, EntityError::InvalidToken));
    }

    #[tokio::test]
    async fn deleting_a_user_drops_their_settings() {
        let entities = test_support::entities();
        let ada = entities
            .users()
            .create(input("ada@example.com", "password1"))
            .await
            .unwrap();
        let settings = entities.user_settings();
        settings
            .update_for(&ada.id, "theme", json!({"dark": true}))
            .await
            .unwrap();
        entities.users().delete(&ada.id).await.unwrap();
        assert!(settings.get_for(&ada.id, "theme").await.unwrap().is_none());
    }
}
