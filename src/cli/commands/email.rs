use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::api::email::SENDGRID_API_URL;

pub const ARG_SENDGRID_API_URL: &str = "sendgrid-api-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SENDGRID_API_URL)
            .long(ARG_SENDGRID_API_URL)
            .help("SendGrid API base URL")
            .long_help(
                "SendGrid API base URL. The API key and sender address are read from the system settings, not from the command line.",
            )
            .env("ACCOUNT_API_SENDGRID_API_URL")
            .default_value(SENDGRID_API_URL),
    )
}

#[derive(Debug)]
pub struct Options {
    pub sendgrid_api_url: String,
}

impl Options {
    /// Read the email options from validated matches.
    ///
    /// # Errors
    /// Returns an error if the SendGrid URL is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let sendgrid_api_url = matches
            .get_one::<String>(ARG_SENDGRID_API_URL)
            .cloned()
            .context("missing required argument: --sendgrid-api-url")?;
        Ok(Self { sendgrid_api_url })
    }
}
