use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

const DELEGATOR_CONFIG_FILE: &str = ".delegator_config.json";

pub const DEFAULT_NEYNAR_API_URL: &str = "https://api.neynar.com/v2/farcaster";
pub const DEFAULT_COMPANION_URL: &str = "http://localhost:8080";
pub const DEFAULT_HTTP_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegatorConfig {
    /// Newest first.
    pub rpc_urls: Vec<String>,
    pub companion_url: String,
    pub default_contract: Option<String>,
    pub poll_interval_secs: u64,
    /// Zero waits for approval without bound.
    pub approval_timeout_secs: u64,
}

impl Default for DelegatorConfig {
    fn default() -> Self {
        Self {
            rpc_urls: Vec::new(),
            companion_url: DEFAULT_COMPANION_URL.to_string(),
            default_contract: None,
            poll_interval_secs: lib::provisioning::APPROVAL_POLL_INTERVAL_SECS,
            approval_timeout_secs: 600,
        }
    }
}

impl DelegatorConfig {
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn approval_timeout(&self) -> Option<std::time::Duration> {
        (self.approval_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(self.approval_timeout_secs))
    }
}

/// Global home directory path, initialized once on first access
static HOME_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    if let Ok(home_path) = std::env::var("DELEGATOR_HOME") {
        return PathBuf::from(home_path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".delegator")
});

/// Must be called before the first use of any config function.
pub fn initialize_home_directory(home_directory_path: PathBuf) {
    std::env::set_var(
        "DELEGATOR_HOME",
        home_directory_path.to_string_lossy().to_string(),
    );
}

pub fn get_home_directory() -> &'static PathBuf {
    &HOME_DIR
}

pub async fn load_config() -> DelegatorConfig {
    load_config_from(&HOME_DIR.join(DELEGATOR_CONFIG_FILE)).await
}

pub async fn save_config(config: &DelegatorConfig) -> Result<(), std::io::Error> {
    save_config_to(&HOME_DIR.join(DELEGATOR_CONFIG_FILE), config).await
}

/// Returns defaults if the file doesn't exist or can't be parsed.
pub async fn load_config_from(config_path: &Path) -> DelegatorConfig {
    match tokio::fs::read_to_string(config_path).await {
        Ok(contents) => match serde_json::from_str::<DelegatorConfig>(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to parse {}: {e}", config_path.display());
                DelegatorConfig::default()
            }
        },
        Err(_) => DelegatorConfig::default(),
    }
}

pub async fn save_config_to(
    config_path: &Path,
    config: &DelegatorConfig,
) -> Result<(), std::io::Error> {
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let contents = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, contents).await
}

/// Secrets and deployment settings the companion server reads from its
/// environment. Never written to disk and never logged.
#[derive(Clone, Default)]
pub struct ServerEnv {
    pub neynar_api_key: Option<String>,
    pub neynar_api_url: String,
    pub app_private_key: Option<String>,
    pub app_fid: Option<String>,
    pub app_url: Option<String>,
    pub farcaster_header: Option<String>,
    pub farcaster_payload: Option<String>,
    pub farcaster_signature: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ServerEnv {
    pub fn from_env() -> Self {
        Self {
            neynar_api_key: non_empty_var("NEYNAR_API_KEY"),
            neynar_api_url: non_empty_var("NEYNAR_API_URL")
                .unwrap_or_else(|| DEFAULT_NEYNAR_API_URL.to_string()),
            app_private_key: non_empty_var("APP_PRIVATE_KEY"),
            app_fid: non_empty_var("APP_FID"),
            app_url: non_empty_var("APP_URL"),
            farcaster_header: non_empty_var("FARCASTER_HEADER"),
            farcaster_payload: non_empty_var("FARCASTER_PAYLOAD"),
            farcaster_signature: non_empty_var("FARCASTER_SIGNATURE"),
        }
    }
}

impl std::fmt::Debug for ServerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEnv")
            .field("neynar_api_key", &self.neynar_api_key.as_ref().map(|_| "<set>"))
            .field("neynar_api_url", &self.neynar_api_url)
            .field("app_private_key", &self.app_private_key.as_ref().map(|_| "<set>"))
            .field("app_fid", &self.app_fid)
            .field("app_url", &self.app_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json")).await;
        assert_eq!(config, DelegatorConfig::default());
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.approval_timeout(), Some(std::time::Duration::from_secs(600)));
    }

    #[tokio::test]
    async fn test_round_trip_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DELEGATOR_CONFIG_FILE);
        let mut config = DelegatorConfig::default();
        config.rpc_urls.push("wss://example.invalid".to_string());
        config.approval_timeout_secs = 0;
        save_config_to(&path, &config).await.unwrap();
        let loaded = load_config_from(&path).await;
        assert_eq!(loaded, config);
        assert_eq!(loaded.approval_timeout(), None);

        tokio::fs::write(&path, r#"{"companion_url":"http://h:1"}"#)
            .await
            .unwrap();
        let loaded = load_config_from(&path).await;
        assert_eq!(loaded.companion_url, "http://h:1");
        assert_eq!(loaded.poll_interval_secs, 3);
    }

    #[tokio::test]
    async fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DELEGATOR_CONFIG_FILE);
        tokio::fs::write(&path, "{not json").await.unwrap();
        assert_eq!(load_config_from(&path).await, DelegatorConfig::default());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let env = ServerEnv {
            neynar_api_key: Some("super-secret".to_string()),
            app_private_key: Some("0xkey".to_string()),
            ..Default::default()
        };
        let printed = format!("{env:?}");
        assert!(!printed.contains("super-secret"));
        assert!(!printed.contains("0xkey"));
    }
}
