//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_BOOTSTRAP_ADMIN_EMAIL, ARG_FRONTEND_ORIGIN, email};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let email_opts = email::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        sendgrid_api_url: email_opts.sendgrid_api_url,
        bootstrap_admin_email: non_blank(matches, ARG_BOOTSTRAP_ADMIN_EMAIL),
        frontend_origin: non_blank(matches, ARG_FRONTEND_ORIGIN),
    }))
}

fn non_blank(matches: &clap::ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
