use crate::utils::error::{DeployError, Result};
use crate::utils::validation::validate_url;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_STATUS_URL: &str = "http://localhost:5005";
pub const STATUS_URL_ENV_VAR: &str = "ENGINE_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub url: String,
    pub greeting: String,
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// 對執行中的引擎做健康檢查
pub struct StatusProbe {
    client: Client,
    base_url: String,
}

impl StatusProbe {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url("status.url", base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn probe(&self) -> Result<EngineStatus> {
        let root = format!("{}/", self.base_url);
        tracing::debug!("Probing engine at {}", root);

        let response = self.client.get(&root).send().await.map_err(|e| {
            DeployError::StatusProbeError {
                message: format!("{} is unreachable: {}", root, e),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::StatusProbeError {
                message: format!("{} answered with HTTP {}", root, status),
            });
        }
        let greeting = response.text().await?.trim().to_string();

        Ok(EngineStatus {
            url: self.base_url.clone(),
            greeting,
            version: self.version().await,
        })
    }

    /// `/version` 只在啟用 API 時存在，失敗時略過
    async fn version(&self) -> Option<String> {
        let url = format!("{}/version", self.base_url);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            tracing::debug!("Version endpoint returned {}", response.status());
            return None;
        }
        response
            .json::<VersionResponse>()
            .await
            .ok()
            .map(|v| v.version)
    }
}
