//! Transactional email dispatch through SendGrid.
//!
//! Identity flows (email confirmation, password reset) call into
//! [`EmailDispatcher`]. Whether anything is actually sent is decided per
//! attempt from the stored system settings:
//!
//! - No settings row, no API key or no "from" address: the call succeeds and
//!   nothing is sent. Email is optional for this service.
//! - Otherwise one message is built (same body as plain text and HTML, click
//!   tracking off) and submitted to the provider. Provider failures are logged
//!   and swallowed so the triggering flow still reports success.
//!
//! Links pointing back at the app are rooted at the host of the inbound
//! request, which callers pass explicitly. A missing host is a caller bug and
//! is returned as [`EmailError::MissingRequestHost`].
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::settings::{SettingsStore, SystemSettings};

/// Default SendGrid API base URL.
pub const SENDGRID_API_URL: &str = "https://api.sendgrid.com";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the dispatcher.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Submit a message or return an error describing the provider failure.
    async fn send(&self, api_key: &SecretString, message: &EmailMessage) -> Result<()>;
}

/// SendGrid v3 `mail/send` client.
#[derive(Clone, Debug)]
pub struct SendGridProvider {
    client: Client,
    endpoint: String,
}

impl SendGridProvider {
    /// Build a provider for the given API base URL.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid SendGrid API URL: {base_url}"))?;
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("Failed to build SendGrid HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/v3/mail/send", base.as_str().trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl EmailProvider for SendGridProvider {
    async fn send(&self, api_key: &SecretString, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&sendgrid_payload(message))
            .send()
            .await
            .context("SendGrid request failed")?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("SendGrid responded with {status}"))
        }
    }
}

fn sendgrid_payload(message: &EmailMessage) -> Value {
    json!({
        "personalizations": [{ "to": [{ "email": message.to }] }],
        "from": { "email": message.from },
        "subject": message.subject,
        "content": [
            { "type": "text/plain", "value": message.body },
            { "type": "text/html", "value": message.body },
        ],
        "tracking_settings": {
            "click_tracking": { "enable": false, "enable_text": false }
        },
    })
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("request host is required to build the link")]
    MissingRequestHost,
    #[error("invalid link: {0}")]
    InvalidLink(#[from] url::ParseError),
    #[error("failed to load system settings: {0}")]
    Settings(#[source] anyhow::Error),
}

pub struct EmailDispatcher {
    settings: Arc<dyn SettingsStore>,
    provider: Arc<dyn EmailProvider>,
}

impl EmailDispatcher {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsStore>, provider: Arc<dyn EmailProvider>) -> Self {
        Self { settings, provider }
    }

    /// Send one message if email is configured; otherwise do nothing.
    ///
    /// # Errors
    /// Returns an error only if the settings cannot be read. Provider failures are logged.
    #[instrument(skip(self, body))]
    pub async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let settings = self.settings.load().await.map_err(EmailError::Settings)?;
        let Some(credentials) = settings.as_ref().and_then(SystemSettings::email_credentials)
        else {
            debug!("email is not configured, skipping send");
            return Ok(());
        };

        let message = EmailMessage {
            from: credentials.from_address,
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        match self.provider.send(&credentials.api_key, &message).await {
            Ok(()) => info!("Email to {to} queued successfully"),
            Err(err) => error!("Failure email to {to}: {err:#}"),
        }

        Ok(())
    }

    /// Send the account (or changed-email) confirmation link.
    ///
    /// # Errors
    /// Returns an error if the request host is missing, the link is not a valid URL,
    /// or the settings cannot be read.
    pub async fn send_confirmation_link(
        &self,
        email: &str,
        confirmation_link: &str,
        request_host: Option<&str>,
    ) -> Result<(), EmailError> {
        let link = confirmation_link_for_app(confirmation_link, request_host)?;

        if link.query().is_some_and(|query| query.contains("changedEmail=")) {
            let body = format!(
                "You have changed your email. Please confirm your new email by <a href='{link}'>clicking here</a>. If you did not request an email change, disregard this email. Thank you."
            );
            self.send_email(email, "Confirm your changed email", &body)
                .await
        } else {
            let body =
                format!("Please confirm your account by <a href='{link}'>clicking here</a>. Thank you.");
            self.send_email(email, "Confirm your email", &body).await
        }
    }

    /// Send a password reset link as issued by the identity layer.
    ///
    /// # Errors
    /// Returns an error if the settings cannot be read.
    pub async fn send_password_reset_link(
        &self,
        email: &str,
        reset_link: &str,
    ) -> Result<(), EmailError> {
        let body = format!("Please reset your password by <a href='{reset_link}'>clicking here</a>.");
        self.send_email(email, "Reset your password", &body).await
    }

    /// Send a password reset code as a link into the app.
    ///
    /// # Errors
    /// Returns an error if the request host is missing or the settings cannot be read.
    pub async fn send_password_reset_code(
        &self,
        email: &str,
        reset_code: &str,
        request_host: Option<&str>,
    ) -> Result<(), EmailError> {
        let host = require_host(request_host)?;
        let reset_link = format!("https://{host}/password/reset/{reset_code}");
        let body = format!(
            "Please reset your password using the following link <a href='{reset_link}'>Reset Password.</a>"
        );
        self.send_email(email, "Reset your password", &body).await
    }
}

fn require_host(request_host: Option<&str>) -> Result<&str, EmailError> {
    request_host
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .ok_or(EmailError::MissingRequestHost)
}

/// Rewrite an identity-issued confirmation link so it opens the app.
///
/// The `confirmEmail` endpoint becomes the app's `confirmingEmail` page and the
/// link is re-rooted at `https://{request_host}`.
///
/// # Errors
/// Returns an error if the host is missing or either URL fails to parse.
pub fn confirmation_link_for_app(
    confirmation_link: &str,
    request_host: Option<&str>,
) -> Result<Url, EmailError> {
    let issued = Url::parse(confirmation_link)?;
    let host = require_host(request_host)?;

    let mut path_and_query = issued.path().to_string();
    if let Some(query) = issued.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    let adjusted = path_and_query.replace("confirmEmail", "confirmingEmail");

    Ok(Url::parse(&format!("https://{host}{adjusted}"))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::MemorySettings;
    use httpmock::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl RecordingProvider {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailProvider for RecordingProvider {
        async fn send(&self, _api_key: &SecretString, message: &EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Err(anyhow!("provider rejected message"))
            } else {
                Ok(())
            }
        }
    }

    fn settings(key: &str, from: &str) -> SystemSettings {
        SystemSettings {
            sendgrid_key: Some(SecretString::from(key.to_string())),
            sendgrid_system_email_address: Some(from.to_string()),
            ..SystemSettings::default()
        }
    }

    fn dispatcher(
        store: MemorySettings,
        provider: &Arc<RecordingProvider>,
    ) -> EmailDispatcher {
        EmailDispatcher::new(Arc::new(store), provider.clone())
    }

    #[tokio::test]
    async fn empty_key_sends_nothing() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(MemorySettings::with(settings("", "a@b.com")), &provider);

        let result = dispatcher
            .send_confirmation_link(
                "user@example.com",
                "https://identity.local/confirmEmail?userId=1&code=abc",
                Some("app.example.com"),
            )
            .await;

        assert!(result.is_ok());
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn missing_settings_or_from_address_sends_nothing() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(MemorySettings::default(), &provider);
        assert!(dispatcher.send_email("u@example.com", "s", "b").await.is_ok());

        let dispatcher = dispatcher_with_from("", &provider);
        assert!(dispatcher.send_email("u@example.com", "s", "b").await.is_ok());

        assert!(provider.sent().is_empty());
    }

    fn dispatcher_with_from(from: &str, provider: &Arc<RecordingProvider>) -> EmailDispatcher {
        dispatcher(MemorySettings::with(settings("SG.abc", from)), provider)
    }

    #[tokio::test]
    async fn configured_settings_send_one_message() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        dispatcher
            .send_email("user@example.com", "Hello", "<b>body</b>")
            .await
            .unwrap();

        assert_eq!(
            provider.sent(),
            vec![EmailMessage {
                from: "a@b.com".to_string(),
                to: "user@example.com".to_string(),
                subject: "Hello".to_string(),
                body: "<b>body</b>".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn provider_failure_is_not_returned() {
        let provider = Arc::new(RecordingProvider::failing());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        let result = dispatcher.send_email("user@example.com", "Hello", "body").await;

        assert!(result.is_ok());
        assert_eq!(provider.sent().len(), 1);
    }

    #[tokio::test]
    async fn confirmation_link_is_rewritten_to_app_host() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        dispatcher
            .send_confirmation_link(
                "user@example.com",
                "http://localhost:5000/confirmEmail?userId=U1&code=xyz",
                Some("app.example.com"),
            )
            .await
            .unwrap();

        let sent = provider.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Confirm your email");
        assert!(
            sent[0]
                .body
                .contains("https://app.example.com/confirmingEmail?userId=U1&code=xyz")
        );
        assert!(!sent[0].body.contains("localhost"));
    }

    #[tokio::test]
    async fn changed_email_link_uses_changed_wording() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        dispatcher
            .send_confirmation_link(
                "new@example.com",
                "http://localhost:5000/confirmEmail?userId=U1&code=xyz&changedEmail=new%40example.com",
                Some("app.example.com"),
            )
            .await
            .unwrap();

        let sent = provider.sent();
        assert_eq!(sent[0].subject, "Confirm your changed email");
        assert!(sent[0].body.starts_with("You have changed your email."));
    }

    #[tokio::test]
    async fn confirmation_without_request_host_fails() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        let result = dispatcher
            .send_confirmation_link(
                "user@example.com",
                "http://localhost:5000/confirmEmail?userId=U1",
                None,
            )
            .await;

        assert!(matches!(result, Err(EmailError::MissingRequestHost)));
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn reset_code_without_request_host_fails_even_when_unconfigured() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(MemorySettings::default(), &provider);

        let result = dispatcher
            .send_password_reset_code("user@example.com", "CODE", Some("  "))
            .await;

        assert!(matches!(result, Err(EmailError::MissingRequestHost)));
    }

    #[tokio::test]
    async fn reset_code_links_into_app() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher_with_from("a@b.com", &provider);

        dispatcher
            .send_password_reset_code("user@example.com", "CODE123", Some("app.example.com"))
            .await
            .unwrap();
        dispatcher
            .send_password_reset_link("user@example.com", "https://id.local/reset?x=1")
            .await
            .unwrap();

        let sent = provider.sent();
        assert_eq!(sent.len(), 2);
        assert!(
            sent[0]
                .body
                .contains("https://app.example.com/password/reset/CODE123")
        );
        assert!(sent[1].body.contains("https://id.local/reset?x=1"));
        assert!(sent.iter().all(|message| message.subject == "Reset your password"));
    }

    #[test]
    fn confirmation_link_rejects_invalid_url() {
        let result = confirmation_link_for_app("not a url", Some("app.example.com"));
        assert!(matches!(result, Err(EmailError::InvalidLink(_))));
    }

    #[test]
    fn sendgrid_payload_disables_click_tracking() {
        let payload = sendgrid_payload(&EmailMessage {
            from: "a@b.com".to_string(),
            to: "user@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "<p>x</p>".to_string(),
        });

        assert_eq!(payload["from"]["email"], "a@b.com");
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "user@example.com");
        assert_eq!(payload["content"][0]["value"], "<p>x</p>");
        assert_eq!(payload["content"][1]["type"], "text/html");
        assert_eq!(
            payload["tracking_settings"]["click_tracking"]["enable"],
            false
        );
    }

    #[tokio::test]
    async fn sendgrid_provider_posts_with_bearer_key() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v3/mail/send")
                .header("authorization", "Bearer SG.abc");
            then.status(202);
        });

        let provider = SendGridProvider::new(&server.base_url()).unwrap();
        let message = EmailMessage {
            from: "a@b.com".to_string(),
            to: "user@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "x".to_string(),
        };

        let result = provider
            .send(&SecretString::from("SG.abc".to_string()), &message)
            .await;

        assert!(result.is_ok());
        mock.assert();
    }

    #[tokio::test]
    async fn sendgrid_provider_reports_rejection() {
        let server = MockServer::start();
        let _mock = server.mock(|when, then| {
            when.method(POST).path("/v3/mail/send");
            then.status(401);
        });

        let provider = SendGridProvider::new(&server.base_url()).unwrap();
        let message = EmailMessage {
            from: "a@b.com".to_string(),
            to: "user@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "x".to_string(),
        };

        let result = provider
            .send(&SecretString::from("SG.bad".to_string()), &message)
            .await;

        assert!(result.is_err());
    }
}
