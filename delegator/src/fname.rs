//! Farcaster username registry client.

use async_trait::async_trait;
use lib::api::FnameTransferRequest;
use serde_json::Value;
use thiserror::Error;

use crate::actions::NameRegistry;

pub const FNAME_REGISTRY_URL: &str = "https://fnames.farcaster.xyz";

#[derive(Debug, Error)]
pub enum FnameError {
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("fname registry unreachable: {0}")]
    Http(#[from] reqwest::Error),
}

impl FnameError {
    pub fn kind(&self) -> &str {
        match *self {
            FnameError::Rejected { .. } => "Rejected",
            FnameError::Http(_) => "Http",
        }
    }
}

#[derive(Clone)]
pub struct FnameClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for FnameClient {
    fn default() -> Self {
        Self::new(FNAME_REGISTRY_URL)
    }
}

impl FnameClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// The registry answers errors as `{"error": ..}` or `{"message": ..}`.
fn rejection_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Failed to change username".to_string())
}

#[async_trait]
impl NameRegistry for FnameClient {
    async fn transfer_name(&self, request: &FnameTransferRequest) -> Result<Value, FnameError> {
        let response = self
            .http
            .post(format!("{}/transfers", self.base_url))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FnameError::Rejected {
                status: status.as_u16(),
                message: rejection_message(&body),
            });
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message() {
        assert_eq!(rejection_message(r#"{"error":"name taken"}"#), "name taken");
        assert_eq!(rejection_message(r#"{"message":"bad sig"}"#), "bad sig");
        assert_eq!(rejection_message("<html>"), "Failed to change username");
    }
}
