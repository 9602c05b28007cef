//! Outbound email delivery.
//!
//! The background runner hands fully-built messages to a `Mailer`. The
//! Mailgun variant posts to the messages API; the log variant is the local
//! dev fallback when no Mailgun credentials are configured.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::api::error::UpstreamError;
use crate::cli::globals::Config;
use crate::APP_USER_AGENT;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub enum Mailer {
    Mailgun {
        client: Client,
        domain: String,
        api_key: SecretString,
    },
    /// Local dev fallback that logs instead of sending real email.
    Log,
}

impl Mailer {
    /// Build the mailer from configuration, falling back to the log variant
    /// when Mailgun credentials are absent.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match (config.mailgun_domain.clone(), config.mailgun_api_key.clone()) {
            (Some(domain), Some(api_key)) => {
                let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
                Ok(Self::Mailgun {
                    client,
                    domain,
                    api_key,
                })
            }
            _ => {
                info!("Mailgun not configured; emails will be logged");
                Ok(Self::Log)
            }
        }
    }

    /// Deliver a message.
    ///
    /// # Errors
    /// Returns `UpstreamError` when Mailgun responds with a non-2xx status or
    /// the request itself fails.
    pub async fn send(&self, message: &EmailMessage) -> Result<(), UpstreamError> {
        debug!(
            "Sending email to '{}' with subject '{}'",
            message.to.chars().take(3).collect::<String>(),
            message.subject.chars().take(20).collect::<String>()
        );

        match self {
            Self::Log => {
                info!(
                    to = %message.to,
                    subject = %message.subject,
                    body = %message.body,
                    "email send stub"
                );
                Ok(())
            }
            Self::Mailgun {
                client,
                domain,
                api_key,
            } => {
                let response = client
                    .post(format!("https://api.mailgun.net/v3/{domain}/messages"))
                    .basic_auth("api", Some(api_key.expose_secret()))
                    .form(&[
                        ("from", format!("Socialite <mailgun@{domain}>")),
                        ("to", message.to.clone()),
                        ("subject", message.subject.clone()),
                        ("text", message.body.clone()),
                    ])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(UpstreamError::Status(response.status().as_u16()));
                }

                debug!("Mailgun accepted message to '{}'", message.to);

                Ok(())
            }
        }
    }
}
