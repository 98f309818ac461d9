//! Client side of the companion server, used by the executors.

use async_trait::async_trait;
use lib::api::{
    ApiErrorBody, CastRequest, MetadataRequest, MetadataResponse, ProfileRequest,
    RegisterSignedKeyRequest, SignerRecord,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::actions::SignerService;

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("companion server unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected companion reply: {0}")]
    Decode(String),
}

impl CompanionError {
    pub fn kind(&self) -> &str {
        match *self {
            CompanionError::Api { .. } => "Api",
            CompanionError::Http(_) => "Http",
            CompanionError::Decode(_) => "Decode",
        }
    }
}

#[derive(Clone)]
pub struct CompanionClient {
    http: reqwest::Client,
    base_url: String,
}

impl CompanionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CompanionError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(CompanionError::Api {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| CompanionError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SignerService for CompanionClient {
    async fn create_signer(&self) -> Result<SignerRecord, CompanionError> {
        self.read(self.http.post(self.url("/api/signer"))).await
    }

    async fn signer_status(&self, signer_uuid: &str) -> Result<SignerRecord, CompanionError> {
        self.read(
            self.http
                .get(self.url("/api/signer"))
                .query(&[("signer_uuid", signer_uuid)]),
        )
        .await
    }

    async fn signed_key_metadata(
        &self,
        public_key: &str,
    ) -> Result<MetadataResponse, CompanionError> {
        let body = MetadataRequest {
            public_key: Some(public_key.to_string()),
        };
        self.read(self.http.post(self.url("/api/signer/metadata")).json(&body))
            .await
    }

    async fn register_signed_key(
        &self,
        request: &RegisterSignedKeyRequest,
    ) -> Result<SignerRecord, CompanionError> {
        self.read(self.http.post(self.url("/api/signer/register")).json(request))
            .await
    }

    async fn cast(&self, request: &CastRequest) -> Result<Value, CompanionError> {
        self.read(self.http.post(self.url("/api/cast")).json(request))
            .await
    }

    async fn update_profile(&self, request: &ProfileRequest) -> Result<Value, CompanionError> {
        self.read(self.http.patch(self.url("/api/profile")).json(request))
            .await
    }
}
