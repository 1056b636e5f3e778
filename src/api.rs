//! REST client for the project endpoints.
//!
//! Every endpoint answers with a `{ "data": ... }` envelope and is keyed by a
//! `projectId` query parameter:
//!
//! | Endpoint               | Payload                          |
//! |------------------------|----------------------------------|
//! | `/api/project-data`    | [`Project`]                      |
//! | `/api/project-stats`   | [`ProjectStats`]                 |
//! | `/api/word-counts`     | `Vec<`[`WordCount`]`>`           |
//!
//! Fetches are single-shot: no retries. Callers decide how to degrade.

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::ApiError;
use crate::model::Project;
use crate::stats::{ProjectStats, WordCount};

pub const PROJECT_DATA_PATH: &str = "/api/project-data";
pub const PROJECT_STATS_PATH: &str = "/api/project-stats";
pub const WORD_COUNTS_PATH: &str = "/api/word-counts";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Decode a `{ "data": T }` response body.
pub fn parse_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice::<Envelope<T>>(bytes)
        .map(|e| e.data)
        .map_err(|e| ApiError::Json {
            field: "data".into(),
            detail: e.to_string(),
        })
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Start building a client aimed at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    /// Client using the base URL and timeouts from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::builder(config.api_base_url.clone())
            .connect_timeout(config.connect_timeout)
            .request_timeout(config.request_timeout)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}{path}?projectId={project_id}`, with the id percent-encoded.
    pub fn endpoint_url(&self, path: &str, project_id: &str) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse_with_params(&raw, &[("projectId", project_id)]).map_err(|e| ApiError::Url {
            url: raw,
            detail: e.to_string(),
        })
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, project_id: &str) -> Result<T, ApiError> {
        let url = self.endpoint_url(path, project_id)?;
        debug!(url = %url, "fetching");

        let resp = self.client.get(url.clone()).send().await.map_err(|e| ApiError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(ApiError::Http {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| ApiError::Json {
            field: "body".into(),
            detail: e.to_string(),
        })?;

        parse_envelope(&bytes)
    }

    /// Fetch the full project definition from `/api/project-data`.
    pub async fn fetch_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.get_data(PROJECT_DATA_PATH, project_id).await
    }

    /// Fetch aggregated per-question statistics from `/api/project-stats`.
    pub async fn fetch_project_stats(&self, project_id: &str) -> Result<ProjectStats, ApiError> {
        self.get_data(PROJECT_STATS_PATH, project_id).await
    }

    /// Fetch word-frequency counts from `/api/word-counts`.
    pub async fn fetch_word_counts(&self, project_id: &str) -> Result<Vec<WordCount>, ApiError> {
        self.get_data(WORD_COUNTS_PATH, project_id).await
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: defaults.connect_timeout,
            request_timeout: defaults.request_timeout,
        }
    }

    /// Override the TCP connect timeout (default 3 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the per-request timeout (default 10 s).
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ApiClient {
        // reqwest::Client::builder() can fail in extreme environments;
        // fall back to a default client instead of panicking.
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_default();

        ApiClient {
            base_url: self.base_url,
            client,
        }
    }
}
