//! Fixed-shape signature blobs and EIP-712 digests the delegator flows sign.

use crate::sol::{
    fname_domain, id_registry_domain, signed_key_request_domain, SignedKeyRequest,
    SignedKeyRequestMetadata, Transfer, UserNameProof,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolStruct, SolType};
use thiserror::Error;

/// Signed key requests stay valid for a day.
pub const SIGNER_DEADLINE_SECS: u64 = 86_400;
/// Transfer authorizations stay valid for an hour.
pub const TRANSFER_DEADLINE_SECS: u64 = 3_600;

pub const PLACEHOLDER_SIGNATURE_LEN: usize = 65;
pub const RECEIVE_SIGNATURE_LEN: usize = PLACEHOLDER_SIGNATURE_LEN + 32 + 32;

pub const TRANSFER_TYPE: &str = "Transfer(uint256 fid,address to,uint256 nonce,uint256 deadline)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("receive signature must be {RECEIVE_SIGNATURE_LEN} bytes, got {len}")]
    BadLength { len: usize },
    #[error("receive signature placeholder is not zeroed")]
    NonZeroPlaceholder,
    #[error("metadata is not a valid SignedKeyRequestMetadata: {error}")]
    BadMetadata { error: String },
}

impl SignatureError {
    pub fn kind(&self) -> &str {
        match *self {
            SignatureError::BadLength { .. } => "BadLength",
            SignatureError::NonZeroPlaceholder => "NonZeroPlaceholder",
            SignatureError::BadMetadata { .. } => "BadMetadata",
        }
    }
}

pub fn transfer_typehash() -> B256 {
    keccak256(TRANSFER_TYPE.as_bytes())
}

/// Build the signature handed to `IdRegistry.transfer` when the receiving
/// delegator has been prepared with `prepareToReceive`.
///
/// Layout: 65 zero bytes, the transfer typehash, the fid as a big-endian
/// word. The delegator checks its `receivable` slot instead of the
/// placeholder, then reads the typehash and fid back out of the tail.
pub fn encode_receive_signature(fid: u64) -> Bytes {
    let mut blob = Vec::with_capacity(RECEIVE_SIGNATURE_LEN);
    blob.extend_from_slice(&[0u8; PLACEHOLDER_SIGNATURE_LEN]);
    blob.extend_from_slice(transfer_typehash().as_slice());
    blob.extend_from_slice(&U256::from(fid).to_be_bytes::<32>());
    Bytes::from(blob)
}

/// Split a receive signature into its typehash and fid words.
pub fn decode_receive_signature(blob: &[u8]) -> Result<(B256, U256), SignatureError> {
    if blob.len() != RECEIVE_SIGNATURE_LEN {
        return Err(SignatureError::BadLength { len: blob.len() });
    }
    let (placeholder, tail) = blob.split_at(PLACEHOLDER_SIGNATURE_LEN);
    if placeholder.iter().any(|b| *b != 0) {
        return Err(SignatureError::NonZeroPlaceholder);
    }
    let typehash = B256::from_slice(&tail[..32]);
    let fid = U256::from_be_slice(&tail[32..]);
    Ok((typehash, fid))
}

pub fn signed_key_request_hash(request_fid: u64, key: &Bytes, deadline: u64) -> B256 {
    SignedKeyRequest {
        requestFid: U256::from(request_fid),
        key: key.clone(),
        deadline: U256::from(deadline),
    }
    .eip712_signing_hash(&signed_key_request_domain())
}

pub fn encode_signed_key_metadata(
    request_fid: u64,
    request_signer: Address,
    signature: Bytes,
    deadline: u64,
) -> Bytes {
    let metadata = SignedKeyRequestMetadata {
        requestFid: U256::from(request_fid),
        requestSigner: request_signer,
        signature,
        deadline: U256::from(deadline),
    };
    Bytes::from(<SignedKeyRequestMetadata as SolType>::abi_encode(&metadata))
}

pub fn decode_signed_key_metadata(data: &[u8]) -> Result<SignedKeyRequestMetadata, SignatureError> {
    <SignedKeyRequestMetadata as SolType>::abi_decode(data, true).map_err(|e| {
        SignatureError::BadMetadata {
            error: e.to_string(),
        }
    })
}

pub fn transfer_hash(fid: u64, to: Address, nonce: U256, deadline: u64) -> B256 {
    Transfer {
        fid: U256::from(fid),
        to,
        nonce,
        deadline: U256::from(deadline),
    }
    .eip712_signing_hash(&id_registry_domain())
}

pub fn username_proof_hash(name: &str, timestamp: u64, owner: Address) -> B256 {
    UserNameProof {
        name: name.to_string(),
        timestamp: U256::from(timestamp),
        owner,
    }
    .eip712_signing_hash(&fname_domain())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_signature_layout() {
        let blob = encode_receive_signature(420_000);
        assert_eq!(blob.len(), RECEIVE_SIGNATURE_LEN);
        assert_eq!(blob.len(), 129);
        assert!(blob[..65].iter().all(|b| *b == 0));
        assert_eq!(&blob[65..97], transfer_typehash().as_slice());
        let mut fid_word = [0u8; 32];
        fid_word[24..].copy_from_slice(&420_000u64.to_be_bytes());
        assert_eq!(&blob[97..], &fid_word);
    }

    #[test]
    fn test_receive_signature_decodes_back() {
        let blob = encode_receive_signature(u64::MAX);
        let (typehash, fid) = decode_receive_signature(&blob).unwrap();
        assert_eq!(typehash, transfer_typehash());
        assert_eq!(fid, U256::from(u64::MAX));
    }

    #[test]
    fn test_receive_signature_rejects_bad_blobs() {
        assert_eq!(
            decode_receive_signature(&[0u8; 97]),
            Err(SignatureError::BadLength { len: 97 })
        );
        let mut blob = encode_receive_signature(1).to_vec();
        blob[3] = 1;
        assert_eq!(
            decode_receive_signature(&blob),
            Err(SignatureError::NonZeroPlaceholder)
        );
    }

    #[test]
    fn test_transfer_typehash_matches_struct() {
        assert_eq!(Transfer::eip712_encode_type(), TRANSFER_TYPE);
    }

    #[test]
    fn test_metadata_is_tuple_encoded() {
        let signer = Address::repeat_byte(0xab);
        let signature = Bytes::from(vec![7u8; 65]);
        let metadata = encode_signed_key_metadata(9, signer, signature.clone(), 1_700_000_000);
        // dynamic struct: head word is the offset of the tuple
        assert_eq!(U256::from_be_slice(&metadata[..32]), U256::from(32));

        let decoded = decode_signed_key_metadata(&metadata).unwrap();
        assert_eq!(decoded.requestFid, U256::from(9));
        assert_eq!(decoded.requestSigner, signer);
        assert_eq!(decoded.signature, signature);
        assert_eq!(decoded.deadline, U256::from(1_700_000_000u64));
    }

    #[test]
    fn test_digests_depend_on_every_field() {
        let key = Bytes::from(vec![1u8; 32]);
        let base = signed_key_request_hash(1, &key, 100);
        assert_ne!(base, signed_key_request_hash(2, &key, 100));
        assert_ne!(base, signed_key_request_hash(1, &key, 101));

        let owner = Address::repeat_byte(1);
        assert_ne!(
            username_proof_hash("alice", 10, owner),
            username_proof_hash("alicf", 10, owner)
        );
        assert_ne!(
            transfer_hash(1, owner, U256::ZERO, 5),
            transfer_hash(1, owner, U256::from(1), 5)
        );
    }
}
