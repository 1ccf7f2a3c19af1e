// Third-party GPS provider client
use crate::application::reconciler::{ExternalDevice, GpsProvider, UpstreamError};
use crate::infrastructure::config::ReconcilerSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpGpsProvider {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    basic: Option<(String, String)>,
}

enum AuthMode<'a> {
    Bearer(&'a str),
    Basic(&'a str, &'a str),
}

impl AuthMode<'_> {
    fn label(&self) -> &'static str {
        match self {
            AuthMode::Bearer(_) => "bearer",
            AuthMode::Basic(..) => "basic",
        }
    }
}

/// The provider answers with either a bare array or `{"devices": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DevicesResponse {
    Wrapped { devices: Vec<ExternalDevice> },
    Bare(Vec<ExternalDevice>),
}

impl HttpGpsProvider {
    pub fn new(settings: &ReconcilerSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .context("Failed to build GPS provider HTTP client")?;

        let basic = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            (Some(user), None) => Some((user.clone(), String::new())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_token: settings.api_token.clone().filter(|t| !t.is_empty()),
            basic,
        })
    }

    async fn fetch_with(&self, auth: &AuthMode<'_>) -> Result<Vec<ExternalDevice>> {
        let url = format!("{}/devices", self.base_url);
        let request = self.client.get(&url).header("Accept", "application/json");
        let request = match auth {
            AuthMode::Bearer(token) => request.bearer_auth(token),
            AuthMode::Basic(user, pass) => request.basic_auth(user, Some(pass)),
        };

        let response = request
            .send()
            .await
            .context("Failed to send request to GPS provider")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GPS provider request failed with status {}: {}", status, body);
        }

        let data = response
            .json::<DevicesResponse>()
            .await
            .context("Failed to parse GPS provider response")?;

        Ok(match data {
            DevicesResponse::Wrapped { devices } => devices,
            DevicesResponse::Bare(devices) => devices,
        })
    }
}

#[async_trait]
impl GpsProvider for HttpGpsProvider {
    /// Try the token first, then basic credentials, else give up for this cycle.
    async fn fetch_devices(&self) -> Result<Vec<ExternalDevice>, UpstreamError> {
        let mut modes = Vec::new();
        if let Some(token) = &self.api_token {
            modes.push(AuthMode::Bearer(token));
        }
        if let Some((user, pass)) = &self.basic {
            modes.push(AuthMode::Basic(user, pass));
        }
        if modes.is_empty() {
            return Err(UpstreamError::Unavailable(
                "no GPS provider credentials configured".into(),
            ));
        }

        let mut failures = Vec::new();
        for mode in &modes {
            match self.fetch_with(mode).await {
                Ok(devices) => {
                    tracing::debug!(auth = mode.label(), devices = devices.len(), "gps provider fetch ok");
                    return Ok(devices);
                }
                Err(e) => {
                    tracing::debug!(auth = mode.label(), error = %format!("{:#}", e), "gps provider fetch failed");
                    failures.push(format!("{}: {:#}", mode.label(), e));
                }
            }
        }

        Err(UpstreamError::Unavailable(failures.join("; ")))
    }
}
