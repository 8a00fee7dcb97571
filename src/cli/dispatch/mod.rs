use crate::{
    cli::actions::{server::Args, Action},
    entities::install::AdminAccount,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --jwt-secret")?;
    let session_ttl = matches
        .get_one::<i64>("session-ttl")
        .copied()
        .unwrap_or(86_400);

    let install = match (
        matches.get_one::<String>("install-email"),
        matches.get_one::<String>("install-password"),
    ) {
        (Some(email), Some(password)) => Some(AdminAccount {
            email: email.clone(),
            password: SecretString::from(password.clone()),
        }),
        _ => None,
    };

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        session_ttl,
        install,
    }))
}
