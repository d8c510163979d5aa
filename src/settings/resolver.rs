//! HTTP adapter for per-owner threshold configuration

use crate::config::SettingsApiConfig;
use crate::domain::GreenhouseSettings;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Settings lookup failures. Absence of configuration is not an error;
/// it comes back as `Ok(None)` and suppresses threshold evaluation.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("settings service returned {0}")]
    Status(StatusCode),
}

/// Query interface to the per-owner threshold configuration. The gateway
/// never writes through this boundary.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, owner: &str) -> Result<Option<GreenhouseSettings>, SettingsError>;
}

/// Settings store backed by the external HTTP settings service
pub struct HttpSettingsStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSettingsStore {
    pub fn new(config: &SettingsApiConfig) -> Result<Self, SettingsError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SettingsStore for HttpSettingsStore {
    async fn get(&self, owner: &str) -> Result<Option<GreenhouseSettings>, SettingsError> {
        let url = format!("{}/settings/{}", self.base_url, owner);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SettingsError::Status(response.status()));
        }

        Ok(Some(response.json().await?))
    }
}
