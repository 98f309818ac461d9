use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Role verdict for the connected wallet against a delegator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Owner,
    Caster,
    None,
}

impl Permission {
    /// Owner capability is a superset of caster capability.
    pub fn satisfies(&self, required: Permission) -> bool {
        match required {
            Permission::Owner => *self == Permission::Owner,
            Permission::Caster => *self != Permission::None,
            Permission::None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Owner => "owner",
            Permission::Caster => "caster",
            Permission::None => "none",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a delegator contract, authoritative as of the block it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorInfo {
    pub address: Address,
    pub owner_hat: U256,
    /// Zero means no caster role is configured.
    pub caster_hat: U256,
    pub fid: Option<u64>,
    /// Only ever set when `fid` is set.
    pub recovery_address: Option<Address>,
}

impl DelegatorInfo {
    pub fn has_fid(&self) -> bool {
        self.fid.is_some()
    }

    /// The caster hat, or `None` when the delegator has no caster role.
    pub fn caster_hat(&self) -> Option<U256> {
        (!self.caster_hat.is_zero()).then_some(self.caster_hat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermissions {
    pub is_owner: bool,
    pub is_caster: bool,
    pub permission: Permission,
}

impl UserPermissions {
    pub fn new(is_owner: bool, is_caster: bool) -> Self {
        let permission = if is_owner {
            Permission::Owner
        } else if is_caster {
            Permission::Caster
        } else {
            Permission::None
        };
        Self {
            is_owner,
            is_caster,
            permission,
        }
    }

    pub fn none() -> Self {
        Self::new(false, false)
    }
}

/// A signer credential created through the provisioning service and
/// attached on-chain to a managed FID.
///
/// Every field tolerates absence so older or newer cache entries still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSigner {
    #[serde(default)]
    pub signer_uuid: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub created_at: String,
}

impl StoredSigner {
    pub fn new(signer_uuid: String, public_key: String) -> Self {
        Self {
            signer_uuid,
            public_key,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Return values of `Hats.viewHat`, trimmed to what the shell shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HatInfo {
    pub id: U256,
    pub details: String,
    pub max_supply: u32,
    pub supply: u32,
    pub image_uri: String,
    pub active: bool,
}

impl HatInfo {
    /// A max supply of zero is unlimited.
    pub fn at_max_supply(&self) -> bool {
        self.max_supply > 0 && self.supply >= self.max_supply
    }
}

/// What `prepareToReceive` left behind on the delegator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receivable {
    pub fid: u64,
    pub deadline: u64,
}
