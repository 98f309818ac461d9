use crate::config::DelegatorConfig;

/// Insert `url` at the front of the provider list, dropping any older copy.
pub fn add_rpc_url_to_config(config: &mut DelegatorConfig, url: &str) {
    let url = url.trim().to_string();
    config.rpc_urls.retain(|existing| existing != &url);
    config.rpc_urls.insert(0, url);
}

pub fn is_websocket_url(url: &str) -> bool {
    match url::Url::parse(url.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "ws" | "wss"),
        Err(_) => false,
    }
}
