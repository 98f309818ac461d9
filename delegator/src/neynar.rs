//! Thin client for the Neynar signer, cast and profile endpoints.

use lib::api::{CastEmbed, ProfileUpdate};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum NeynarError {
    #[error("Neynar API key not configured")]
    MissingKey,
    #[error("Neynar API error: {body}")]
    Upstream { status: u16, body: String },
    #[error("request to Neynar failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl NeynarError {
    pub fn kind(&self) -> &str {
        match *self {
            NeynarError::MissingKey => "MissingKey",
            NeynarError::Upstream { .. } => "Upstream",
            NeynarError::Http(_) => "Http",
        }
    }
}

#[derive(Clone)]
pub struct NeynarClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl NeynarClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str, NeynarError> {
        self.api_key.as_deref().ok_or(NeynarError::MissingKey)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, NeynarError> {
        let response = request
            .header("x-api-key", self.key()?)
            .header("accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "neynar returned an error");
            return Err(NeynarError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    /// Raw signer object so unknown fields pass through to callers untouched.
    pub async fn create_signer(&self) -> Result<Value, NeynarError> {
        self.send(self.http.post(format!("{}/signer", self.base_url)))
            .await
    }

    pub async fn get_signer(&self, signer_uuid: &str) -> Result<Value, NeynarError> {
        self.send(
            self.http
                .get(format!("{}/signer", self.base_url))
                .query(&[("signer_uuid", signer_uuid)]),
        )
        .await
    }

    pub async fn register_signed_key(
        &self,
        signer_uuid: &str,
        app_fid: u64,
        deadline: u64,
        signature: &str,
    ) -> Result<Value, NeynarError> {
        self.send(
            self.http
                .post(format!("{}/signer/signed_key", self.base_url))
                .json(&json!({
                    "signer_uuid": signer_uuid,
                    "app_fid": app_fid,
                    "deadline": deadline,
                    "signature": signature,
                    "sponsored_by_neynar": true,
                })),
        )
        .await
    }

    pub async fn publish_cast(
        &self,
        signer_uuid: &str,
        text: &str,
        embeds: &[CastEmbed],
        parent: Option<&str>,
        channel_id: Option<&str>,
    ) -> Result<Value, NeynarError> {
        let mut body = json!({
            "signer_uuid": signer_uuid,
            "text": text.trim(),
        });
        if !embeds.is_empty() {
            body["embeds"] = json!(embeds);
        }
        if let Some(parent) = parent {
            body["parent"] = json!(parent);
        }
        if let Some(channel_id) = channel_id {
            body["channel_id"] = json!(channel_id);
        }
        self.send(self.http.post(format!("{}/cast", self.base_url)).json(&body))
            .await
    }

    pub async fn update_user(
        &self,
        signer_uuid: &str,
        update: &ProfileUpdate,
    ) -> Result<Value, NeynarError> {
        let mut body = serde_json::to_value(update).unwrap_or_else(|_| json!({}));
        body["signer_uuid"] = json!(signer_uuid);
        self.send(self.http.patch(format!("{}/user", self.base_url)).json(&body))
            .await
    }
}
