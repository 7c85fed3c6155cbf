//! Remote blob gateway backed by S3-compatible object storage.

use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::is_http_url;

const ENV_ENDPOINT: &str = "GRIDLOG_S3_ENDPOINT";
const ENV_BUCKET: &str = "GRIDLOG_S3_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "GRIDLOG_S3_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "GRIDLOG_S3_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "GRIDLOG_S3_PUBLIC_BASE_URL";

/// Abstract contract for the remote photo store.
///
/// `upload` returns a durable, permanently resolvable locator (URL) for
/// the uploaded bytes.
#[allow(async_fn_in_trait)]
pub trait BlobGateway {
    async fn upload(
        &self,
        content: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String>;
}

impl<T: BlobGateway> BlobGateway for &T {
    async fn upload(
        &self,
        content: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String> {
        (**self).upload(content, suggested_name, content_type).await
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S3Config {
    /// S3-compatible endpoint URL.
    pub endpoint: String,
    /// Bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Public URL base that minted photo locators resolve under.
    pub public_base_url: String,
}

impl S3Config {
    /// Load S3 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no S3 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| std::env::var(key).ok())
    }
}

/// S3-backed photo upload gateway.
#[derive(Clone, Debug)]
pub struct S3BlobGateway {
    config: S3Config,
    client: Client,
}

impl S3BlobGateway {
    #[must_use]
    pub fn new(config: S3Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    #[must_use]
    pub const fn config(&self) -> &S3Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }

    /// Build an object key for an uploaded meter photo.
    ///
    /// Timestamp plus UUID keeps keys unique even when the same photo is
    /// re-uploaded after an interrupted drain.
    fn build_object_key(suggested_name: &str) -> String {
        let ts = Utc::now().timestamp_millis();
        let nonce = Uuid::now_v7();
        let name = sanitize_file_name(suggested_name);
        format!("meter-photos/{ts}-{nonce}-{name}")
    }

    fn public_url(&self, object_key: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            object_key.trim_matches('/')
        )
    }
}

impl BlobGateway for S3BlobGateway {
    async fn upload(
        &self,
        content: &[u8],
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String> {
        if content.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot upload empty photo content".to_string(),
            ));
        }

        let object_key = Self::build_object_key(suggested_name);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(content.to_vec()));

        let content_type = content_type.trim();
        if !content_type.is_empty() {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, Some(&object_key), error)
        })?;

        Ok(self.public_url(&object_key))
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<S3Config>> {
    let endpoint = lookup(ENV_ENDPOINT).map(|value| value.trim().to_string());
    let bucket = lookup(ENV_BUCKET).map(|value| value.trim().to_string());
    let access_key_id = lookup(ENV_ACCESS_KEY_ID).map(|value| value.trim().to_string());
    let secret_access_key = lookup(ENV_SECRET_ACCESS_KEY).map(|value| value.trim().to_string());
    let public_base_url = lookup(ENV_PUBLIC_BASE_URL).map(|value| value.trim().to_string());

    let any_present = endpoint.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some()
        || public_base_url.is_some();

    if !any_present {
        return Ok(None);
    }

    let mut missing = Vec::new();
    if endpoint.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ENDPOINT);
    }
    if bucket.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_BUCKET);
    }
    if access_key_id.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_ACCESS_KEY_ID);
    }
    if secret_access_key.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_SECRET_ACCESS_KEY);
    }
    if public_base_url.as_ref().map_or(true, String::is_empty) {
        missing.push(ENV_PUBLIC_BASE_URL);
    }

    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "S3 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    let endpoint = endpoint.expect("validated above");
    let public_base_url = public_base_url.expect("validated above");
    if !is_http_url(&endpoint) {
        return Err(Error::InvalidInput(format!(
            "{ENV_ENDPOINT} must start with http:// or https://"
        )));
    }
    if !is_http_url(&public_base_url) {
        return Err(Error::InvalidInput(format!(
            "{ENV_PUBLIC_BASE_URL} must start with http:// or https://"
        )));
    }

    Ok(Some(S3Config {
        endpoint: endpoint.trim_end_matches('/').to_string(),
        bucket: bucket.expect("validated above"),
        access_key_id: access_key_id.expect("validated above"),
        secret_access_key: secret_access_key.expect("validated above"),
        public_base_url: public_base_url.trim_end_matches('/').to_string(),
    }))
}

fn build_s3_client(config: &S3Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "gridlog-core-s3-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("S3 {operation} failed for {target}: {error}"))
}

fn sanitize_file_name(file_name: &str) -> String {
    let trimmed = file_name.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "photo".to_string();
    }

    let (stem, ext) = trimmed
        .rsplit_once('.')
        .map_or((trimmed, ""), |parts| parts);
    let stem = sanitize_token(stem);
    let stem = if stem.is_empty() {
        "photo".to_string()
    } else {
        stem
    };
    let ext = sanitize_token(ext);

    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}
