//! Contract interfaces, deployed addresses and EIP-712 domains on Optimism.

use alloy_primitives::{address, Address};
use alloy_sol_macro::sol;
use alloy_sol_types::{eip712_domain, Eip712Domain};

pub const CHAIN_ID: u64 = 10;

pub const ID_REGISTRY: Address = address!("00000000Fc6c5F01Fc30151999387Bb99A9f489b");
pub const ID_GATEWAY: Address = address!("00000000Fc25870C6eD6b6c7E41Fb078b7656f69");
pub const KEY_REGISTRY: Address = address!("00000000Fc1237824fb747aBDE0FF18990E59b7e");
pub const KEY_GATEWAY: Address = address!("00000000fC56947c7E7183f8Ca4B62398CaAdf0B");
pub const SIGNED_KEY_REQUEST_VALIDATOR: Address =
    address!("00000000FC700472606ED4fA22623Acf62c60553");
/// Same address on every chain.
pub const HATS: Address = address!("3bc1A0Ad72417f2d411118085256fC53CBdDd137");
/// Verifying contract of the fname registry's username proofs (mainnet).
pub const FNAME_VERIFIER: Address = address!("e3be01d99baa8db9905b33a3ca391238234b79d1");

/// `KeyRegistry` key state for active keys.
pub const KEY_STATE_ADDED: u8 = 1;
/// ed25519 signing key.
pub const KEY_TYPE_ED25519: u32 = 1;
/// Metadata is a `SignedKeyRequestMetadata`.
pub const METADATA_TYPE_SIGNED_KEY_REQUEST: u8 = 1;

sol! {
    interface IHatsFarcasterDelegator {
        function ownerHat() external view returns (uint256 hat);
        function casterHat() external view returns (uint256 hat);
        function receivable() external view returns (uint256 fid, uint256 deadline, bytes sig);

        function register(address _recovery, uint256 _extraStorage) external payable returns (uint256 fid, uint256 overpayment);
        function addKey(uint32 _keyType, bytes _key, uint8 _metadataType, bytes _metadata) external;
        function removeKey(bytes _key) external;
        function transferFid(address _to, uint256 _deadline, bytes _sig) external;
        function changeRecoveryAddress(address _newRecovery) external;
        function prepareToReceive(uint256 _fid) external;
    }

    interface IHats {
        function isWearerOfHat(address _user, uint256 _hatId) external view returns (bool wears);
        function isAdminOfHat(address _user, uint256 _hatId) external view returns (bool admin);
        function viewHat(uint256 _hatId) external view returns (
            string details,
            uint32 maxSupply,
            uint32 supply,
            address eligibility,
            address toggle,
            string imageURI,
            uint16 numChildren,
            bool mutable_,
            bool active
        );
        function mintHat(uint256 _hatId, address _wearer) external returns (bool success);
    }

    interface IIdRegistry {
        function idOf(address owner) external view returns (uint256 fid);
        function custodyOf(uint256 fid) external view returns (address custody);
        function recoveryOf(uint256 fid) external view returns (address recovery);
        function nonces(address owner) external view returns (uint256 nonce);
        function transfer(address to, uint256 deadline, bytes sig) external;
    }

    interface IIdGateway {
        function price(uint256 extraStorage) external view returns (uint256 price);
    }

    interface IKeyRegistry {
        function totalKeys(uint256 fid, uint8 state) external view returns (uint256 total);
        function keysOf(uint256 fid, uint8 state, uint256 startIdx, uint256 batchSize) external view returns (bytes[] keys, uint8[] keyTypes);
    }

    struct SignedKeyRequest {
        uint256 requestFid;
        bytes key;
        uint256 deadline;
    }

    struct SignedKeyRequestMetadata {
        uint256 requestFid;
        address requestSigner;
        bytes signature;
        uint256 deadline;
    }

    struct Transfer {
        uint256 fid;
        address to;
        uint256 nonce;
        uint256 deadline;
    }

    struct UserNameProof {
        string name;
        uint256 timestamp;
        address owner;
    }
}

pub fn signed_key_request_domain() -> Eip712Domain {
    eip712_domain! {
        name: "Farcaster SignedKeyRequestValidator",
        version: "1",
        chain_id: CHAIN_ID,
        verifying_contract: SIGNED_KEY_REQUEST_VALIDATOR,
    }
}

pub fn id_registry_domain() -> Eip712Domain {
    eip712_domain! {
        name: "Farcaster IdRegistry",
        version: "1",
        chain_id: CHAIN_ID,
        verifying_contract: ID_REGISTRY,
    }
}

pub fn fname_domain() -> Eip712Domain {
    eip712_domain! {
        name: "Farcaster name verification",
        version: "1",
        chain_id: 1u64,
        verifying_contract: FNAME_VERIFIER,
    }
}
