//! Remote record gateway for the readings API.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::Reading;
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Abstract contract for the remote reading store.
///
/// The sync orchestrator depends only on this trait, so tests substitute
/// an in-memory fake and the CLI plugs in [`HttpRecordGateway`].
#[allow(async_fn_in_trait)]
pub trait RecordGateway {
    /// Create a reading remotely, returning the server-assigned id.
    async fn create(&self, payload: &Reading) -> Result<String>;

    /// Fetch the current photo-locator list of a synced reading.
    async fn fetch_photos(&self, reading_id: &str) -> Result<Vec<String>>;

    /// Replace the photo-locator list of a synced reading.
    async fn update_photos(&self, reading_id: &str, photos: &[String]) -> Result<()>;

    /// Delete a synced reading.
    async fn delete(&self, reading_id: &str) -> Result<()>;
}

impl<T: RecordGateway> RecordGateway for &T {
    async fn create(&self, payload: &Reading) -> Result<String> {
        (**self).create(payload).await
    }

    async fn fetch_photos(&self, reading_id: &str) -> Result<Vec<String>> {
        (**self).fetch_photos(reading_id).await
    }

    async fn update_photos(&self, reading_id: &str, photos: &[String]) -> Result<()> {
        (**self).update_photos(reading_id, photos).await
    }

    async fn delete(&self, reading_id: &str) -> Result<()> {
        (**self).delete(reading_id).await
    }
}

/// Configuration for the readings HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsApiConfig {
    /// API base URL, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Optional bearer token for authenticated deployments.
    pub auth_token: Option<String>,
}

impl RecordsApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when `GRIDLOG_API_BASE_URL` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let base_url = normalize_text_option(std::env::var("GRIDLOG_API_BASE_URL").ok());
        let Some(base_url) = base_url else {
            return Ok(None);
        };
        let auth_token = normalize_text_option(std::env::var("GRIDLOG_API_TOKEN").ok());
        Ok(Some(Self {
            base_url,
            auth_token,
        }))
    }
}

/// HTTP client for the readings record store.
#[derive(Debug, Clone)]
pub struct HttpRecordGateway {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateReadingResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ReadingDocument {
    #[serde(default)]
    photos: Vec<String>,
}

impl HttpRecordGateway {
    /// Build a gateway from validated configuration.
    pub fn new(config: RecordsApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "Records API base URL must include http:// or https://".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::Network(format!("Failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            auth_token: config.auth_token,
            client,
        })
    }

    /// Returns the base URL this gateway was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn check_status(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = format!("{operation} failed with HTTP {status}: {}", compact_text(&body));
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(Error::NotFound(detail))
        } else if status.is_client_error() {
            Err(Error::InvalidInput(detail))
        } else {
            // Server errors are treated as transient and left queued
            Err(Error::Network(detail))
        }
    }
}

impl RecordGateway for HttpRecordGateway {
    async fn create(&self, payload: &Reading) -> Result<String> {
        let response = self
            .request(reqwest::Method::POST, "/v1/readings")
            .json(payload)
            .send()
            .await
            .map_err(|error| Error::Network(format!("Create reading request failed: {error}")))?;
        let response = Self::check_status(response, "Create reading").await?;

        let created = response
            .json::<CreateReadingResponse>()
            .await
            .map_err(|error| Error::Network(format!("Invalid create response: {error}")))?;
        Ok(created.id)
    }

    async fn fetch_photos(&self, reading_id: &str) -> Result<Vec<String>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/readings/{reading_id}"))
            .send()
            .await
            .map_err(|error| Error::Network(format!("Fetch reading request failed: {error}")))?;
        let response = Self::check_status(response, "Fetch reading").await?;

        let document = response
            .json::<ReadingDocument>()
            .await
            .map_err(|error| Error::Network(format!("Invalid reading document: {error}")))?;
        Ok(document.photos)
    }

    async fn update_photos(&self, reading_id: &str, photos: &[String]) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, &format!("/v1/readings/{reading_id}"))
            .json(&serde_json::json!({ "photos": photos }))
            .send()
            .await
            .map_err(|error| Error::Network(format!("Update reading request failed: {error}")))?;
        Self::check_status(response, "Update reading").await?;
        Ok(())
    }

    async fn delete(&self, reading_id: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/v1/readings/{reading_id}"),
            )
            .send()
            .await
            .map_err(|error| Error::Network(format!("Delete reading request failed: {error}")))?;
        Self::check_status(response, "Delete reading").await?;
        Ok(())
    }
}
