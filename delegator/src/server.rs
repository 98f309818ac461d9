//! Companion HTTP server: signer provisioning, cast and profile passthroughs
//! to Neynar, and app-key signing of signed key requests.

use crate::config::ServerEnv;
use crate::neynar::{NeynarClient, NeynarError};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::Bytes;
use lib::api::{
    AccountAssociation, ApiErrorBody, CastRequest, Manifest, MetadataConfigStatus,
    MetadataRequest, MetadataResponse, ProfileRequest, RegisterSignedKeyRequest,
};
use lib::signature::{encode_signed_key_metadata, signed_key_request_hash, SIGNER_DEADLINE_SECS};
use lib::utils::{now_secs, parse_hex_bytes};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use warp::{
    http::{
        header::{HeaderMap, HeaderValue},
        StatusCode,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

pub struct ServerState {
    pub env: ServerEnv,
    pub neynar: NeynarClient,
}

impl ServerState {
    pub fn new(env: ServerEnv) -> Self {
        let neynar = NeynarClient::new(&env.neynar_api_url, env.neynar_api_key.clone());
        Self { env, neynar }
    }
}

fn json_error(message: impl Into<String>, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(&ApiErrorBody::new(message)), status)
        .into_response()
}

fn json_ok<T: serde::Serialize>(body: &T) -> Response {
    warp::reply::json(body).into_response()
}

fn upstream_status(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Map a Neynar failure onto the reply the companion hands back.
fn neynar_error_reply(e: NeynarError, context: &str) -> Response {
    warn!(kind = e.kind(), "{context}: {e}");
    match e {
        NeynarError::MissingKey => json_error(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
        NeynarError::Upstream { status, .. } => json_error(e.to_string(), upstream_status(status)),
        NeynarError::Http(_) => json_error(context.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Trim, strip surrounding quotes and inner whitespace, and add the `0x`
/// prefix. The result must be 32 bytes of hex.
pub fn clean_private_key(raw: &str) -> Result<String, String> {
    let trimmed = raw
        .trim()
        .trim_start_matches(['"', '\''])
        .trim_end_matches(['"', '\'']);
    let mut key: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if !key.starts_with("0x") {
        key = format!("0x{key}");
    }
    if key.len() != 66 {
        return Err(format!(
            "Invalid private key length: got {} chars, expected 66 (0x + 64 hex)",
            key.len()
        ));
    }
    Ok(key)
}

fn app_signer(env: &ServerEnv) -> Result<(PrivateKeySigner, u64), String> {
    let (Some(raw_key), Some(raw_fid)) = (&env.app_private_key, &env.app_fid) else {
        return Err(format!(
            "APP_PRIVATE_KEY and APP_FID must be configured. Got: FID={}, KEY={}",
            if env.app_fid.is_some() { "set" } else { "missing" },
            if env.app_private_key.is_some() { "set" } else { "missing" },
        ));
    };
    let app_fid = raw_fid
        .trim()
        .parse::<u64>()
        .map_err(|_| "APP_FID must be a positive integer".to_string())?;
    let key = clean_private_key(raw_key)?;
    let signer =
        PrivateKeySigner::from_str(&key).map_err(|_| "APP_PRIVATE_KEY is not a valid key".to_string())?;
    Ok((signer, app_fid))
}

pub fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let state = warp::any().map(move || state.clone());

    let create_signer = warp::path!("api" / "signer")
        .and(warp::post())
        .and(state.clone())
        .and_then(handle_create_signer);
    let get_signer = warp::path!("api" / "signer")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state.clone())
        .and_then(handle_get_signer);
    let metadata = warp::path!("api" / "signer" / "metadata")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::body::json())
        .and(state.clone())
        .and_then(handle_metadata);
    let metadata_config = warp::path!("api" / "signer" / "metadata")
        .and(warp::get())
        .and(state.clone())
        .and_then(handle_metadata_config);
    let register = warp::path!("api" / "signer" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::body::json())
        .and(state.clone())
        .and_then(handle_register);
    let cast = warp::path!("api" / "cast")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::body::json())
        .and(state.clone())
        .and_then(handle_cast);
    let profile = warp::path!("api" / "profile")
        .and(warp::patch())
        .and(warp::body::content_length_limit(1024 * 16))
        .and(warp::body::json())
        .and(state.clone())
        .and_then(handle_profile);
    let manifest = warp::path!(".well-known" / "farcaster.json")
        .and(warp::get())
        .and(state)
        .and_then(handle_manifest);

    let mut headers = HeaderMap::new();
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );

    create_signer
        .or(get_signer)
        .unify()
        .or(metadata)
        .unify()
        .or(metadata_config)
        .unify()
        .or(register)
        .unify()
        .or(cast)
        .unify()
        .or(profile)
        .unify()
        .or(manifest)
        .unify()
        .with(warp::reply::with::headers(headers))
}

/// Serve until `kill_rx` fires.
pub async fn serve(env: ServerEnv, http_port: u16, kill_rx: oneshot::Receiver<bool>) {
    if env.neynar_api_key.is_none() {
        warn!("NEYNAR_API_KEY is not set; signer, cast and profile routes will fail");
    }
    if let Err(e) = app_signer(&env) {
        warn!("app signer unavailable: {e}");
    }
    let state = Arc::new(ServerState::new(env));

    info!("companion server listening on port {http_port}");
    warp::serve(routes(state))
        .bind_with_graceful_shutdown(([0, 0, 0, 0], http_port), async {
            kill_rx.await.ok();
        })
        .1
        .await;
}

async fn handle_create_signer(state: Arc<ServerState>) -> Result<Response, Rejection> {
    Ok(match state.neynar.create_signer().await {
        Ok(signer) => json_ok(&signer),
        Err(e) => neynar_error_reply(e, "Failed to create signer"),
    })
}

async fn handle_get_signer(
    query: HashMap<String, String>,
    state: Arc<ServerState>,
) -> Result<Response, Rejection> {
    if !state.neynar.is_configured() {
        return Ok(neynar_error_reply(NeynarError::MissingKey, ""));
    }
    let Some(signer_uuid) = query.get("signer_uuid").filter(|u| !u.is_empty()) else {
        return Ok(json_error("signer_uuid is required", StatusCode::BAD_REQUEST));
    };
    Ok(match state.neynar.get_signer(signer_uuid).await {
        Ok(signer) => json_ok(&signer),
        Err(e) => neynar_error_reply(e, "Failed to fetch signer"),
    })
}

async fn handle_metadata(
    body: MetadataRequest,
    state: Arc<ServerState>,
) -> Result<Response, Rejection> {
    if state.env.app_private_key.is_none() || state.env.app_fid.is_none() {
        let message = app_signer(&state.env).err().unwrap_or_default();
        return Ok(json_error(message, StatusCode::INTERNAL_SERVER_ERROR));
    }
    let Some(public_key) = body.public_key.filter(|k| !k.trim().is_empty()) else {
        return Ok(json_error("publicKey is required", StatusCode::BAD_REQUEST));
    };
    let (signer, app_fid) = match app_signer(&state.env) {
        Ok(s) => s,
        Err(e) => return Ok(json_error(e, StatusCode::INTERNAL_SERVER_ERROR)),
    };
    let key = match parse_hex_bytes(&public_key) {
        Ok(key) => key,
        Err(e) => return Ok(json_error(e.to_string(), StatusCode::BAD_REQUEST)),
    };

    let deadline = now_secs() + SIGNER_DEADLINE_SECS;
    let hash = signed_key_request_hash(app_fid, &key, deadline);
    let signature = match signer.sign_hash_sync(&hash) {
        Ok(sig) => Bytes::from(sig.as_bytes().to_vec()),
        Err(e) => {
            error!("failed to sign key request: {e}");
            return Ok(json_error(
                "Failed to generate metadata",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };
    let metadata = encode_signed_key_metadata(app_fid, signer.address(), signature.clone(), deadline);

    Ok(json_ok(&MetadataResponse {
        metadata: format!("0x{}", hex::encode(&metadata)),
        deadline,
        request_fid: app_fid,
        request_signer: signer.address().to_string(),
        signature: format!("0x{}", hex::encode(&signature)),
    }))
}

async fn handle_metadata_config(state: Arc<ServerState>) -> Result<Response, Rejection> {
    let env = &state.env;
    let set_or_missing = |v: &Option<String>| {
        Some(if v.is_some() { "set" } else { "missing" }.to_string())
    };
    let status = if env.app_private_key.is_none() || env.app_fid.is_none() {
        MetadataConfigStatus {
            configured: false,
            app_fid: set_or_missing(&env.app_fid),
            app_private_key: set_or_missing(&env.app_private_key),
            signer_address: None,
            error: None,
        }
    } else {
        match app_signer(env) {
            Ok((signer, app_fid)) => MetadataConfigStatus {
                configured: true,
                app_fid: Some(app_fid.to_string()),
                app_private_key: None,
                signer_address: Some(signer.address().to_string()),
                error: None,
            },
            Err(e) => MetadataConfigStatus {
                configured: false,
                app_fid: None,
                app_private_key: None,
                signer_address: None,
                error: Some(e),
            },
        }
    };
    Ok(json_ok(&status))
}

async fn handle_register(
    body: RegisterSignedKeyRequest,
    state: Arc<ServerState>,
) -> Result<Response, Rejection> {
    if !state.neynar.is_configured() {
        return Ok(neynar_error_reply(NeynarError::MissingKey, ""));
    }
    let (Some(signer_uuid), Some(app_fid), Some(deadline), Some(signature)) = (
        body.signer_uuid.filter(|s| !s.is_empty()),
        body.app_fid.filter(|f| *f > 0),
        body.deadline.filter(|d| *d > 0),
        body.signature.filter(|s| !s.is_empty()),
    ) else {
        return Ok(json_error(
            "Missing required fields: signer_uuid, app_fid, deadline, signature",
            StatusCode::BAD_REQUEST,
        ));
    };
    Ok(
        match state
            .neynar
            .register_signed_key(&signer_uuid, app_fid, deadline, &signature)
            .await
        {
            Ok(reply) => json_ok(&reply),
            Err(e) => neynar_error_reply(e, "Failed to register signed key"),
        },
    )
}

async fn handle_cast(body: CastRequest, state: Arc<ServerState>) -> Result<Response, Rejection> {
    if !state.neynar.is_configured() {
        return Ok(neynar_error_reply(NeynarError::MissingKey, ""));
    }
    let Some(signer_uuid) = body.signer_uuid.filter(|s| !s.is_empty()) else {
        return Ok(json_error("signer_uuid is required", StatusCode::BAD_REQUEST));
    };
    let Some(text) = body.text.filter(|t| !t.trim().is_empty()) else {
        return Ok(json_error("text is required", StatusCode::BAD_REQUEST));
    };
    Ok(
        match state
            .neynar
            .publish_cast(
                &signer_uuid,
                &text,
                &body.embeds,
                body.parent.as_deref().filter(|p| !p.is_empty()),
                body.channel_id.as_deref().filter(|c| !c.is_empty()),
            )
            .await
        {
            Ok(reply) => json_ok(&reply),
            Err(e) => neynar_error_reply(e, "Failed to post cast"),
        },
    )
}

async fn handle_profile(
    body: ProfileRequest,
    state: Arc<ServerState>,
) -> Result<Response, Rejection> {
    if !state.neynar.is_configured() {
        return Ok(neynar_error_reply(NeynarError::MissingKey, ""));
    }
    let Some(signer_uuid) = body.signer_uuid.filter(|s| !s.is_empty()) else {
        return Ok(json_error("signer_uuid is required", StatusCode::BAD_REQUEST));
    };
    Ok(match state.neynar.update_user(&signer_uuid, &body.update).await {
        Ok(reply) => json_ok(&reply),
        Err(NeynarError::Upstream { status, body }) => {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_else(|| "Failed to update profile".to_string());
            json_error(message, upstream_status(status))
        }
        Err(e) => neynar_error_reply(e, "Internal server error"),
    })
}

async fn handle_manifest(state: Arc<ServerState>) -> Result<Response, Rejection> {
    let env = &state.env;
    let Some(app_url) = &env.app_url else {
        return Ok(json_error(
            "APP_URL not configured",
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    };
    let account_association = match (
        &env.farcaster_header,
        &env.farcaster_payload,
        &env.farcaster_signature,
    ) {
        (Some(header), Some(payload), Some(signature)) => Some(AccountAssociation {
            header: header.clone(),
            payload: payload.clone(),
            signature: signature.clone(),
        }),
        _ => None,
    };
    Ok(json_ok(&Manifest::new(app_url, account_association)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{PrimitiveSignature, B256};
    use lib::signature::decode_signed_key_metadata;

    // Well-known development key; never holds funds.
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn state(env: ServerEnv) -> Arc<ServerState> {
        Arc::new(ServerState::new(env))
    }

    fn configured_env() -> ServerEnv {
        ServerEnv {
            neynar_api_key: Some("test-key".to_string()),
            neynar_api_url: "http://127.0.0.1:9".to_string(),
            app_private_key: Some(format!("  \"{TEST_KEY}\"\n")),
            app_fid: Some("1234".to_string()),
            ..Default::default()
        }
    }

    fn error_of(body: &[u8]) -> String {
        serde_json::from_slice::<ApiErrorBody>(body).unwrap().error
    }

    #[test]
    fn test_clean_private_key() {
        let expected = format!("0x{TEST_KEY}");
        assert_eq!(clean_private_key(TEST_KEY).unwrap(), expected);
        assert_eq!(clean_private_key(&format!("'0x{TEST_KEY}'")).unwrap(), expected);
        assert_eq!(
            clean_private_key(&format!("{} {}", &TEST_KEY[..10], &TEST_KEY[10..])).unwrap(),
            expected
        );
        assert!(clean_private_key("0x1234").is_err());
    }

    #[tokio::test]
    async fn test_missing_neynar_key_is_500() {
        let routes = routes(state(ServerEnv::default()));
        let res = warp::test::request()
            .method("POST")
            .path("/api/signer")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(res.body()), "Neynar API key not configured");
        assert!(res.headers().contains_key("cache-control"));
    }

    #[tokio::test]
    async fn test_missing_params_are_400() {
        let routes = routes(state(configured_env()));

        let res = warp::test::request()
            .method("GET")
            .path("/api/signer")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res.body()), "signer_uuid is required");

        let res = warp::test::request()
            .method("POST")
            .path("/api/signer/register")
            .json(&serde_json::json!({"signer_uuid": "u", "app_fid": 1}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = warp::test::request()
            .method("POST")
            .path("/api/cast")
            .json(&serde_json::json!({"signer_uuid": "u", "text": "   "}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res.body()), "text is required");

        let res = warp::test::request()
            .method("PATCH")
            .path("/api/profile")
            .json(&serde_json::json!({"bio": "hi"}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res.body()), "signer_uuid is required");

        let res = warp::test::request()
            .method("POST")
            .path("/api/signer/metadata")
            .json(&serde_json::json!({}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res.body()), "publicKey is required");
    }

    #[tokio::test]
    async fn test_metadata_requires_app_key() {
        let routes = routes(state(ServerEnv {
            app_fid: Some("1".to_string()),
            ..Default::default()
        }));
        let res = warp::test::request()
            .method("POST")
            .path("/api/signer/metadata")
            .json(&serde_json::json!({"publicKey": "0x01"}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_of(res.body()).contains("KEY=missing"));

        let routes = super::routes(state(ServerEnv {
            app_fid: Some("1".to_string()),
            app_private_key: Some("0xabc".to_string()),
            ..Default::default()
        }));
        let res = warp::test::request()
            .method("POST")
            .path("/api/signer/metadata")
            .json(&serde_json::json!({"publicKey": "0x01"}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(error_of(res.body()).starts_with("Invalid private key length"));
    }

    #[tokio::test]
    async fn test_metadata_is_signed_by_app_key() {
        let routes = routes(state(configured_env()));
        let public_key = format!("0x{}", "11".repeat(32));
        let before = now_secs();
        let res = warp::test::request()
            .method("POST")
            .path("/api/signer/metadata")
            .json(&serde_json::json!({ "publicKey": public_key }))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let body: MetadataResponse = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body.request_fid, 1234);
        assert_eq!(body.request_signer, TEST_ADDRESS);
        assert!(body.deadline >= before + SIGNER_DEADLINE_SECS);

        let metadata = parse_hex_bytes(&body.metadata).unwrap();
        let decoded = decode_signed_key_metadata(&metadata).unwrap();
        assert_eq!(decoded.requestSigner.to_string(), TEST_ADDRESS);
        assert_eq!(format!("0x{}", hex::encode(&decoded.signature)), body.signature);

        let key = parse_hex_bytes(&public_key).unwrap();
        let hash: B256 = signed_key_request_hash(1234, &key, body.deadline);
        let signature = PrimitiveSignature::try_from(decoded.signature.as_ref()).unwrap();
        let recovered = signature.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered.to_string(), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn test_metadata_config_reports_address() {
        let routes = routes(state(configured_env()));
        let res = warp::test::request()
            .method("GET")
            .path("/api/signer/metadata")
            .reply(&routes)
            .await;
        let status: MetadataConfigStatus = serde_json::from_slice(res.body()).unwrap();
        assert!(status.configured);
        assert_eq!(status.signer_address.as_deref(), Some(TEST_ADDRESS));
        assert_eq!(status.app_fid.as_deref(), Some("1234"));

        let routes = super::routes(state(ServerEnv::default()));
        let res = warp::test::request()
            .method("GET")
            .path("/api/signer/metadata")
            .reply(&routes)
            .await;
        let status: MetadataConfigStatus = serde_json::from_slice(res.body()).unwrap();
        assert!(!status.configured);
        assert_eq!(status.app_private_key.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_manifest() {
        let mut env = configured_env();
        env.app_url = Some("https://delegator.example".to_string());
        env.farcaster_header = Some("h".to_string());
        env.farcaster_payload = Some("p".to_string());
        env.farcaster_signature = Some("s".to_string());
        let routes = routes(state(env));
        let res = warp::test::request()
            .method("GET")
            .path("/.well-known/farcaster.json")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let manifest: Manifest = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(manifest.frame.home_url, "https://delegator.example");
        assert_eq!(manifest.account_association.unwrap().payload, "p");
    }

    /// Stand-in for the Neynar API on an ephemeral port.
    async fn fake_neynar() -> String {
        let signer = warp::path!("signer")
            .and(warp::post())
            .and(warp::header::<String>("x-api-key"))
            .map(|_key: String| {
                warp::reply::json(&serde_json::json!({
                    "signer_uuid": "uuid-1",
                    "public_key": "0xabcd",
                    "status": "generated",
                }))
            });
        let cast = warp::path!("cast").and(warp::post()).map(|| {
            warp::reply::with_status("rate limited", StatusCode::TOO_MANY_REQUESTS)
        });
        let user = warp::path!("user").and(warp::patch()).map(|| {
            warp::reply::with_status(
                warp::reply::json(&serde_json::json!({"message": "bad bio"})),
                StatusCode::BAD_REQUEST,
            )
        });
        let (addr, server) =
            warp::serve(signer.or(cast).or(user)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_upstream_passthrough() {
        let mut env = configured_env();
        env.neynar_api_url = fake_neynar().await;
        let routes = routes(state(env));

        let res = warp::test::request()
            .method("POST")
            .path("/api/signer")
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["signer_uuid"], "uuid-1");

        let res = warp::test::request()
            .method("POST")
            .path("/api/cast")
            .json(&serde_json::json!({"signer_uuid": "u", "text": "gm"}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error_of(res.body()), "Neynar API error: rate limited");

        let res = warp::test::request()
            .method("PATCH")
            .path("/api/profile")
            .json(&serde_json::json!({"signer_uuid": "u", "bio": "x"}))
            .reply(&routes)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res.body()), "bad bio");
    }
}
