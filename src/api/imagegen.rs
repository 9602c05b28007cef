//! DeepAI image generation client used by the background runner.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::api::error::UpstreamError;
use crate::cli::globals::Config;
use crate::APP_USER_AGENT;

const GENERATOR_URL: &str = "https://api.deepai.org/api/cute-creature-generator";

// If the API doesn't respond within 60 seconds, treat it as an error.
const GENERATOR_TIMEOUT: Duration = Duration::from_secs(60);

pub enum ImageGenerator {
    DeepAi {
        client: Client,
        api_key: SecretString,
    },
    Disabled,
}

impl ImageGenerator {
    /// Build the generator from configuration; without an API key every
    /// generation attempt fails as unconfigured.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.deepai_api_key.clone() {
            Some(api_key) => {
                let client = Client::builder()
                    .user_agent(APP_USER_AGENT)
                    .timeout(GENERATOR_TIMEOUT)
                    .build()?;
                Ok(Self::DeepAi { client, api_key })
            }
            None => Ok(Self::Disabled),
        }
    }

    /// Generate an image for `prompt` and return its URL.
    ///
    /// # Errors
    /// Returns `UpstreamError` on non-2xx responses, unparsable bodies,
    /// request failures (including the 60s timeout) or a missing API key.
    pub async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        let Self::DeepAi { client, api_key } = self else {
            return Err(UpstreamError::Unconfigured);
        };

        debug!("Generating image for prompt '{prompt}'");

        let response = client
            .post(GENERATOR_URL)
            .header("api-key", api_key.expose_secret())
            .form(&[("text", prompt)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        let body: Value = response.json().await.map_err(|_| UpstreamError::Parse)?;

        body.get("output_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(UpstreamError::Parse)
    }
}
