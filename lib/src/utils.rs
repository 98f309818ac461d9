use alloy_primitives::{Address, Bytes, U256};
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

lazy_static! {
    static ref ADDRESS_RE: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap();
    static ref HEX_BYTES_RE: Regex = Regex::new(r"^0x[a-fA-F0-9]*$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9-]{0,15}$").unwrap();
}

pub const MAX_CAST_LENGTH: usize = 320;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("invalid hex bytes: {0}")]
    HexBytes(String),
    #[error("username must be 1-16 characters, lowercase letters, numbers, and hyphens, and cannot start with a hyphen")]
    Username,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("cast text is longer than {MAX_CAST_LENGTH} characters")]
    CastTooLong,
    #[error("FID must be a positive integer")]
    Fid,
}

impl ValidationError {
    pub fn kind(&self) -> &str {
        match *self {
            ValidationError::Address(_) => "Address",
            ValidationError::HexBytes(_) => "HexBytes",
            ValidationError::Username => "Username",
            ValidationError::Missing(_) => "Missing",
            ValidationError::CastTooLong => "CastTooLong",
            ValidationError::Fid => "Fid",
        }
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

pub fn is_valid_hex_bytes(hex: &str) -> bool {
    HEX_BYTES_RE.is_match(hex) && hex.len() % 2 == 0
}

pub fn parse_address(address: &str) -> Result<Address, ValidationError> {
    let address = address.trim();
    if !is_valid_address(address) {
        return Err(ValidationError::Address(address.to_string()));
    }
    Address::from_str(address).map_err(|_| ValidationError::Address(address.to_string()))
}

pub fn parse_hex_bytes(hex: &str) -> Result<Bytes, ValidationError> {
    let hex = hex.trim();
    if !is_valid_hex_bytes(hex) {
        return Err(ValidationError::HexBytes(hex.to_string()));
    }
    Bytes::from_str(hex).map_err(|_| ValidationError::HexBytes(hex.to_string()))
}

pub fn parse_fid(fid: &str) -> Result<u64, ValidationError> {
    match fid.trim().parse::<u64>() {
        Ok(fid) if fid > 0 => Ok(fid),
        _ => Err(ValidationError::Fid),
    }
}

pub fn validate_username(name: &str) -> Result<(), ValidationError> {
    if USERNAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::Username)
    }
}

/// `0x1234...abcd`
pub fn truncate_address(address: &str, chars: usize) -> String {
    if address.len() <= chars * 2 + 2 {
        return address.to_string();
    }
    format!(
        "{}...{}",
        &address[..chars + 2],
        &address[address.len() - chars..]
    )
}

/// Hat ids are 256-bit; show the leading 16 hex digits of the padded id.
pub fn format_hat_id(hat: U256) -> String {
    let padded = hex::encode(hat.to_be_bytes::<32>());
    format!("0x{}...", &padded[..16])
}

pub fn format_eth(wei: U256, decimals: usize) -> String {
    let wei = u128::try_from(wei).unwrap_or(u128::MAX);
    let eth = wei as f64 / 1e18;
    format!("{:.*} ETH", decimals, eth)
}

/// Top hat domain: the first four bytes of any hat id in a tree.
pub fn hat_tree_id(hat: U256) -> u32 {
    let bytes = hat.to_be_bytes::<32>();
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn hats_app_url(chain_id: u64, hat: U256) -> String {
    format!(
        "https://app.hatsprotocol.xyz/trees/{}/{}",
        chain_id,
        hat_tree_id(hat)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x3bc1A0Ad72417f2d411118085256fC53CBdDd137"));
        assert!(!is_valid_address("3bc1A0Ad72417f2d411118085256fC53CBdDd137"));
        assert!(!is_valid_address("0x3bc1A0Ad72417f2d411118085256fC53CBdDd13"));
        assert!(parse_address(" 0x3bc1A0Ad72417f2d411118085256fC53CBdDd137 ").is_ok());
        assert!(parse_address("0xnothex").is_err());
    }

    #[test]
    fn test_hex_bytes_validation() {
        assert!(is_valid_hex_bytes("0x"));
        assert!(is_valid_hex_bytes("0xdeadBEEF"));
        assert!(!is_valid_hex_bytes("0xabc"));
        assert!(!is_valid_hex_bytes("deadbeef"));
        assert_eq!(parse_hex_bytes("0x0102").unwrap().to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a1-b2").is_ok());
        assert!(validate_username("0123456789abcdef").is_ok());
        assert!(validate_username("0123456789abcdefg").is_err());
        assert!(validate_username("-alice").is_err());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_fid_parsing() {
        assert_eq!(parse_fid("12345"), Ok(12345));
        assert_eq!(parse_fid("0"), Err(ValidationError::Fid));
        assert_eq!(parse_fid("abc"), Err(ValidationError::Fid));
    }

    #[test]
    fn test_display_helpers() {
        assert_eq!(
            truncate_address("0x3bc1A0Ad72417f2d411118085256fC53CBdDd137", 4),
            "0x3bc1...d137"
        );
        assert_eq!(truncate_address("0x12", 4), "0x12");

        let hat = U256::from_be_slice(&[0x00, 0x00, 0x00, 0x2a, 0x00, 0x01]) << 208;
        assert_eq!(format_hat_id(hat), "0x0000002a00010000...");
        assert_eq!(hat_tree_id(hat), 42);
        assert_eq!(
            hats_app_url(10, hat),
            "https://app.hatsprotocol.xyz/trees/10/42"
        );

        assert_eq!(
            format_eth(U256::from(1_500_000_000_000_000_000u128), 4),
            "1.5000 ETH"
        );
    }
}
