//! Backblaze B2 client used by the upload handler.
//!
//! Account authorization is cached in-process and refreshed when B2 rejects
//! the cached token, so steady-state uploads cost two calls (upload URL +
//! upload) instead of four.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cli::globals::Config;
use crate::APP_USER_AGENT;

const B2_AUTHORIZE_URL: &str = "https://api.backblazeb2.com/b2api/v2/b2_authorize_account";

#[derive(Debug, Clone)]
struct B2Auth {
    api_url: String,
    download_url: String,
    token: String,
    account_id: String,
}

pub enum ObjectStore {
    B2(B2Client),
    /// No B2 credentials configured; uploads fail with a server error.
    Disabled,
}

impl ObjectStore {
    /// Build the store from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        match (
            config.b2_key_id.clone(),
            config.b2_application_key.clone(),
            config.b2_bucket_name.clone(),
        ) {
            (Some(key_id), Some(application_key), Some(bucket_name)) => {
                Ok(Self::B2(B2Client::new(key_id, application_key, bucket_name)?))
            }
            _ => {
                warn!("B2 credentials not configured; uploads are disabled");
                Ok(Self::Disabled)
            }
        }
    }

    /// Upload a local file and return its download URL.
    ///
    /// # Errors
    /// Returns an error on any failure in the authorize / upload pipeline.
    pub async fn upload(&self, local_file: &Path, file_name: &str) -> Result<String> {
        match self {
            Self::B2(client) => client.upload(local_file, file_name).await,
            Self::Disabled => Err(anyhow!("object storage is not configured")),
        }
    }
}

pub struct B2Client {
    client: Client,
    key_id: String,
    application_key: SecretString,
    bucket_name: String,
    auth: RwLock<Option<B2Auth>>,
}

impl B2Client {
    fn new(key_id: String, application_key: SecretString, bucket_name: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build B2 HTTP client")?;

        Ok(Self {
            client,
            key_id,
            application_key,
            bucket_name,
            auth: RwLock::new(None),
        })
    }

    async fn upload(&self, local_file: &Path, file_name: &str) -> Result<String> {
        debug!("Uploading {} to B2 as {file_name}", local_file.display());

        match self.try_upload(local_file, file_name).await {
            Ok(url) => Ok(url),
            Err(err) => {
                // The cached authorization may have expired; refresh once.
                warn!("B2 upload failed, refreshing authorization: {err}");
                self.auth.write().await.take();
                self.try_upload(local_file, file_name).await
            }
        }
    }

    async fn try_upload(&self, local_file: &Path, file_name: &str) -> Result<String> {
        let auth = self.authorized().await?;
        let bucket_id = self.bucket_id(&auth).await?;
        let (upload_url, upload_token) = self.upload_url(&auth, &bucket_id).await?;

        let contents = tokio::fs::read(local_file)
            .await
            .context("Failed to read local file for upload")?;
        let sha1 = hex::encode(Sha1::digest(&contents));

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", &upload_token)
            .header("X-Bz-File-Name", encode_file_name(file_name))
            .header("X-Bz-Content-Sha1", sha1)
            .header("Content-Type", "b2/x-auto")
            .body(contents)
            .send()
            .await
            .context("B2 upload request failed")?
            .error_for_status()
            .context("B2 upload returned an error status")?;

        let body: Value = response
            .json()
            .await
            .context("Failed to parse B2 upload response")?;
        let file_id = body
            .get("fileId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("B2 upload response is missing fileId"))?;

        let download_url = format!(
            "{}/b2api/v2/b2_download_file_by_id?fileId={file_id}",
            auth.download_url
        );
        debug!("Uploaded {file_name} to B2, download URL {download_url}");

        Ok(download_url)
    }

    /// Return the cached authorization or perform the account authorization
    /// call and cache the result.
    async fn authorized(&self) -> Result<B2Auth> {
        if let Some(auth) = self.auth.read().await.clone() {
            return Ok(auth);
        }

        debug!("Authorizing B2 account");
        let body: Value = self
            .client
            .get(B2_AUTHORIZE_URL)
            .basic_auth(&self.key_id, Some(self.application_key.expose_secret()))
            .send()
            .await
            .context("B2 authorize request failed")?
            .error_for_status()
            .context("B2 authorize returned an error status")?
            .json()
            .await
            .context("Failed to parse B2 authorize response")?;

        let auth = B2Auth {
            api_url: required_str(&body, "apiUrl")?,
            download_url: required_str(&body, "downloadUrl")?,
            token: required_str(&body, "authorizationToken")?,
            account_id: required_str(&body, "accountId")?,
        };

        self.auth.write().await.replace(auth.clone());

        Ok(auth)
    }

    async fn bucket_id(&self, auth: &B2Auth) -> Result<String> {
        let body: Value = self
            .client
            .post(format!("{}/b2api/v2/b2_list_buckets", auth.api_url))
            .header("Authorization", &auth.token)
            .json(&json!({
                "accountId": auth.account_id,
                "bucketName": self.bucket_name,
            }))
            .send()
            .await
            .context("B2 list-buckets request failed")?
            .error_for_status()
            .context("B2 list-buckets returned an error status")?
            .json()
            .await
            .context("Failed to parse B2 list-buckets response")?;

        body.get("buckets")
            .and_then(Value::as_array)
            .and_then(|buckets| buckets.first())
            .and_then(|bucket| bucket.get("bucketId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("B2 bucket not found: {}", self.bucket_name))
    }

    async fn upload_url(&self, auth: &B2Auth, bucket_id: &str) -> Result<(String, String)> {
        let body: Value = self
            .client
            .post(format!("{}/b2api/v2/b2_get_upload_url", auth.api_url))
            .header("Authorization", &auth.token)
            .json(&json!({ "bucketId": bucket_id }))
            .send()
            .await
            .context("B2 get-upload-url request failed")?
            .error_for_status()
            .context("B2 get-upload-url returned an error status")?
            .json()
            .await
            .context("Failed to parse B2 get-upload-url response")?;

        Ok((
            required_str(&body, "uploadUrl")?,
            required_str(&body, "authorizationToken")?,
        ))
    }
}

fn required_str(body: &Value, key: &str) -> Result<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("B2 response is missing {key}"))
}

// B2 file names are percent-encoded UTF-8; keep unreserved bytes and '/'.
fn encode_file_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' | b'/' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push_str(&format!("%{other:02X}"));
            }
        }
    }
    encoded
}
