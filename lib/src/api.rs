//! Request and response bodies shared by the companion server and its clients.

use serde::{Deserialize, Serialize};

/// Lifecycle of a provisioning-service signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerStatus {
    Generated,
    PendingApproval,
    Approved,
    Revoked,
    #[serde(other)]
    Unknown,
}

/// Signer object as returned by the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerRecord {
    pub signer_uuid: String,
    pub public_key: String,
    pub status: SignerStatus,
    #[serde(
        default,
        alias = "signer_approval_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub approval_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub metadata: String,
    pub deadline: u64,
    pub request_fid: u64,
    pub request_signer: String,
    pub signature: String,
}

/// Reply of `GET /api/signer/metadata`. `app_fid` and `app_private_key`
/// report "set" or "missing" when the server is not configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataConfigStatus {
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_fid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /api/signer/register`. Fields are optional so the server can
/// name the missing one instead of rejecting the body wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterSignedKeyRequest {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    #[serde(default)]
    pub app_fid: Option<u64>,
    #[serde(default)]
    pub deadline: Option<u64>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastEmbed {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CastRequest {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<CastEmbed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// Profile fields; each one is sent only when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfp_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProfileUpdate {
    pub fn username(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bio.is_none()
            && self.pfp_url.is_none()
            && self.username.is_none()
            && self.display_name.is_none()
            && self.url.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub signer_uuid: Option<String>,
    #[serde(flatten)]
    pub update: ProfileUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

impl ApiErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body posted to the fname registry's `/transfers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnameTransferRequest {
    pub name: String,
    pub from: u64,
    pub to: u64,
    pub fid: u64,
    pub owner: String,
    pub timestamp: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAssociation {
    pub header: String,
    pub payload: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiniAppManifest {
    pub version: String,
    pub name: String,
    pub home_url: String,
    pub icon_url: String,
    pub button_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_association: Option<AccountAssociation>,
    pub frame: MiniAppManifest,
}

impl Manifest {
    pub fn new(app_url: &str, account_association: Option<AccountAssociation>) -> Self {
        let app_url = app_url.trim_end_matches('/');
        Self {
            account_association,
            frame: MiniAppManifest {
                version: "1".to_string(),
                name: "Hats Delegator".to_string(),
                home_url: app_url.to_string(),
                icon_url: format!("{app_url}/icon.png"),
                button_title: "Open".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_record_accepts_either_approval_field() {
        let record: SignerRecord = serde_json::from_str(
            r#"{"signer_uuid":"u1","public_key":"0xab","status":"pending_approval","signer_approval_url":"https://x"}"#,
        )
        .unwrap();
        assert_eq!(record.status, SignerStatus::PendingApproval);
        assert_eq!(record.approval_url.as_deref(), Some("https://x"));

        let record: SignerRecord = serde_json::from_str(
            r#"{"signer_uuid":"u1","public_key":"0xab","status":"something_new"}"#,
        )
        .unwrap();
        assert_eq!(record.status, SignerStatus::Unknown);
        assert_eq!(record.approval_url, None);
    }

    #[test]
    fn test_profile_update_omits_absent_fields() {
        let update = ProfileUpdate {
            bio: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"bio":"hi"}"#);
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn test_profile_request_flattens_fields() {
        let request: ProfileRequest =
            serde_json::from_str(r#"{"signer_uuid":"u1","display_name":"Hats"}"#).unwrap();
        assert_eq!(request.signer_uuid.as_deref(), Some("u1"));
        assert_eq!(request.update.display_name.as_deref(), Some("Hats"));
    }

    #[test]
    fn test_metadata_response_is_camel_case() {
        let response = MetadataResponse {
            metadata: "0x".to_string(),
            deadline: 1,
            request_fid: 2,
            request_signer: "0x00".to_string(),
            signature: "0x01".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["requestFid"], 2);
        assert_eq!(json["requestSigner"], "0x00");
    }

    #[test]
    fn test_manifest_trims_trailing_slash() {
        let manifest = Manifest::new("https://app.example/", None);
        assert_eq!(manifest.frame.home_url, "https://app.example");
        assert_eq!(manifest.frame.icon_url, "https://app.example/icon.png");
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("accountAssociation").is_none());
        assert_eq!(json["frame"]["homeUrl"], "https://app.example");
    }
}
