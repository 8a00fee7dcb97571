//! Request identities resolved from bearer tokens.

use tracing::{debug, instrument};

use super::{
    error::EntityError,
    token::{Claims, TokenKind},
    Access, ApiToken, Entities, User,
};

#[derive(Debug, Clone)]
pub enum Principal {
    User(Box<User>),
    ApiToken(Box<ApiToken>),
}

/// Who is calling, and what they may do.
#[derive(Debug, Clone)]
pub struct Identity {
    pub principal: Principal,
    pub access: Access,
}

impl Identity {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match &self.principal {
            Principal::User(user) => Some(user.as_ref()),
            Principal::ApiToken(_) => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match &self.principal {
            Principal::User(user) => &user.id,
            Principal::ApiToken(token) => &token.id,
        }
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.access.allows(scope)
    }
}

/// Resolve a bearer token into an [`Identity`].
///
/// User tokens must reference an enabled user. API tokens are valid only while
/// the stored token entity still carries the exact same string.
///
/// # Errors
/// Returns `INVALID_TOKEN`, `USER_DISABLED` or a store failure.
#[instrument(skip_all)]
pub async fn authenticate(entities: &Entities, token: &str) -> Result<Identity, EntityError> {
    let token = token.trim();
    let Claims { sub, kind, .. } = entities.tokens().verify(token)?;

    let not_found_is_invalid = |err: EntityError| match err {
        EntityError::NotFound(_) => EntityError::InvalidToken,
        other => other,
    };

    match kind {
        TokenKind::User => {
            let user = entities
                .users()
                .get(&sub)
                .await
                .map_err(not_found_is_invalid)?;
            if !user.enabled {
                return Err(EntityError::UserDisabled);
            }
            let access = entities.access(&user.roles, &user.groups).await?;
            debug!(user = %user.id, "authenticated user");
            Ok(Identity {
                principal: Principal::User(Box::new(user)),
                access,
            })
        }
        TokenKind::ApiToken => {
            let stored = entities
                .api_tokens()
                .get(&sub)
                .await
                .map_err(not_found_is_invalid)?;
            if stored.token != token {
                return Err(EntityError::InvalidToken);
            }
            let access = entities.access(&stored.roles, &stored.groups).await?;
            debug!(token = %stored.id, "authenticated api token");
            Ok(Identity {
                principal: Principal::ApiToken(Box::new(stored)),
                access,
            })
        }
    }
}
