use crate::api;
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub sendgrid_api_url: String,
    pub bootstrap_admin_email: Option<String>,
    pub frontend_origin: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, bootstrap fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        sendgrid_api_url = %args.sendgrid_api_url,
        frontend_origin = ?args.frontend_origin,
        "starting server"
    );

    let config = api::ServerConfig {
        sendgrid_api_url: args.sendgrid_api_url,
        bootstrap_admin_email: args.bootstrap_admin_email,
        frontend_origin: args.frontend_origin,
    };

    api::new(args.port, args.dsn, config).await
}
