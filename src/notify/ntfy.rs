//! ntfy-style HTTP channel

use base64::{Engine as _, engine::general_purpose::STANDARD};
use eyre::{Context, Result};
use std::time::Duration;

use super::Channel;
use crate::config::NtfyConfig;
use crate::event::AlertMessage;

pub struct NtfyChannel {
    endpoint: String,
    authorization: Option<String>,
    agent: ureq::Agent,
}

impl NtfyChannel {
    pub fn new(endpoint: impl Into<String>, credentials: Option<(&str, &str)>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(true)
            .build()
            .into();

        Self {
            endpoint: endpoint.into(),
            authorization: credentials.map(|(user, pass)| basic_auth(user, pass)),
            agent,
        }
    }

    /// None when no URL is configured
    pub fn from_config(config: &NtfyConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint() else {
            return Ok(None);
        };
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            eyre::bail!("ntfy URL must start with http:// or https://: {}", endpoint);
        }
        if config.username.is_some() != config.password.is_some() {
            log::warn!("ntfy username and password must both be set; sending without auth");
        }
        Ok(Some(Self::new(
            endpoint,
            config.credentials(),
            Duration::from_secs(config.timeout_secs),
        )))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Channel for NtfyChannel {
    fn name(&self) -> &str {
        "ntfy"
    }

    fn send(&self, message: &AlertMessage) -> Result<()> {
        let mut request = self.agent.post(&self.endpoint).header("Content-Type", "text/plain; charset=utf-8");
        if let Some(ref auth) = self.authorization {
            request = request.header("Authorization", auth);
        }

        let response = request
            .send(message.as_bytes())
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        log::debug!("ntfy responded {}", response.status());
        Ok(())
    }
}

/// `Authorization` header value for HTTP basic auth
fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pass)))
}
