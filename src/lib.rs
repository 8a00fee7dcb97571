//! # Custodia (Security & User Management API)
//!
//! `custodia` exposes users, roles, groups and API tokens through a GraphQL
//! schema mounted under the `security` namespace of the root query and
//! mutation types.
//!
//! ## Layers
//!
//! - **Schema/Resolvers** ([`security`]): every GraphQL field is wired to a
//!   generic resolver (`get`, `list`, `create`, `update`, `delete`) that is
//!   parameterized by an *entity fetcher*, a function returning the typed
//!   accessor for one entity from the request context. Login, token login,
//!   current user and user settings resolvers are thin wrappers over the same
//!   accessors.
//! - **Entities** ([`entities`]): typed accessors over a JSON document
//!   [`entities::Store`] (PostgreSQL or in-memory). Validation, uniqueness,
//!   password hashing and token minting live here.
//! - **Admin** ([`admin`]): a declarative CRUD controller for managing API
//!   tokens over the GraphQL HTTP endpoint.
//!
//! ## Envelopes
//!
//! Resolvers never fail at the transport level. Every operation returns a
//! `{data, error}` or `{data, meta, error}` envelope and failures are reported
//! through `error { code message data }`.

pub mod admin;
pub mod cli;
pub mod custodia;
pub mod entities;
pub mod security;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
