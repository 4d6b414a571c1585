use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::GatewayConfig;
use fittrack_core::generation::{
    ChatRequest, GenerationError, PlanGenerator, PlanKind, parse_chat_response,
};
use fittrack_core::models::GenerationProfile;

/// Client for an OpenAI-compatible chat completions gateway.
pub struct GatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
    rt: tokio::runtime::Handle,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("fittrack/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        let rt = tokio::runtime::Handle::try_current()
            .context("Gateway client must be created inside a tokio runtime")?;
        Ok(Self { client, config, rt })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub async fn generate_async(
        &self,
        kind: PlanKind,
        profile: &GenerationProfile,
    ) -> Result<Value, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredential)?;

        let request = ChatRequest::new(kind, profile, &self.config.model);
        tracing::info!(kind = kind.as_str(), model = %self.config.model, "calling AI gateway");

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %body, "AI gateway error");
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
            });
        }

        tracing::debug!(kind = kind.as_str(), "AI response received");
        parse_chat_response(&body)
    }
}

impl PlanGenerator for GatewayClient {
    fn generate(
        &self,
        kind: PlanKind,
        profile: &GenerationProfile,
    ) -> Result<Value, GenerationError> {
        tokio::task::block_in_place(|| self.rt.block_on(self.generate_async(kind, profile)))
    }
}
