//! First-run installation: the `full-access` role and an initial admin.

use async_graphql::ID;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use super::{
    error::EntityError, Entities, ListParams, Role, RoleInput, User, UserInput, FULL_ACCESS_ROLE,
};

/// Credentials for the initial admin user.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Default)]
pub struct Installed {
    pub role: Option<Role>,
    pub admin: Option<User>,
}

/// Create the `full-access` role when missing, then the admin user when
/// credentials are given and no user exists yet. Safe to run on every start.
///
/// # Errors
/// Returns validation or store errors.
#[instrument(skip_all)]
pub async fn install(
    entities: &Entities,
    admin: Option<&AdminAccount>,
) -> Result<Installed, EntityError> {
    let mut installed = Installed::default();

    let role = if let Some(role) = entities.roles().find_by_slug(FULL_ACCESS_ROLE).await? {
        role
    } else {
        let role = entities
            .roles()
            .create(RoleInput {
                name: Some("Full access".to_string()),
                slug: Some(FULL_ACCESS_ROLE.to_string()),
                description: Some("Grants every scope.".to_string()),
                scopes: None,
            })
            .await?;
        info!(role = %role.id, "created {FULL_ACCESS_ROLE} role");
        installed.role = Some(role.clone());
        role
    };

    let Some(admin) = admin else {
        return Ok(installed);
    };
    let existing = entities
        .users()
        .list(ListParams {
            per_page: Some(1),
            ..ListParams::default()
        })
        .await?;
    if existing.total > 0 {
        info!("users already present, skipping admin install");
        return Ok(installed);
    }

    let user = entities
        .users()
        .create(UserInput {
            email: Some(admin.email.clone()),
            password: Some(admin.password.expose_secret().to_string()),
            first_name: Some("Admin".to_string()),
            enabled: Some(true),
            roles: Some(vec![ID::from(role.id)]),
            ..UserInput::default()
        })
        .await?;
    info!(user = %user.id, email = %user.email, "created admin user");
    installed.admin = Some(user);

    Ok(installed)
}
