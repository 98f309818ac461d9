use crate::types::Permission;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Register,
    AddKey,
    RemoveKey,
    TransferFid,
    TransferToWallet,
    TransferToContract,
    ChangeRecovery,
    PrepareReceive,
    Cast,
    UpdateProfile,
    ChangeUsername,
    MintCasterHat,
    ViewHatWearers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionGroup {
    Content,
    Keys,
    Ownership,
    Account,
    Hats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionConfig {
    #[serde(rename = "type")]
    pub action: ActionType,
    pub label: &'static str,
    pub description: &'static str,
    pub required_permission: Permission,
    pub group: ActionGroup,
}

/// Display order of groups.
pub const ACTION_GROUPS: &[(ActionGroup, &str)] = &[
    (ActionGroup::Content, "Content"),
    (ActionGroup::Keys, "Signer Keys"),
    (ActionGroup::Hats, "Hats Management"),
    (ActionGroup::Ownership, "FID Ownership"),
    (ActionGroup::Account, "Account Settings"),
];

pub const ACTIONS: &[ActionConfig] = &[
    ActionConfig {
        action: ActionType::Cast,
        label: "Cast",
        description: "Post a cast from the shared account",
        required_permission: Permission::Caster,
        group: ActionGroup::Content,
    },
    ActionConfig {
        action: ActionType::UpdateProfile,
        label: "Update Profile",
        description: "Change display name, bio, or profile picture",
        required_permission: Permission::Caster,
        group: ActionGroup::Content,
    },
    ActionConfig {
        action: ActionType::AddKey,
        label: "Add Key",
        description: "Add a signer key to enable casting",
        required_permission: Permission::Caster,
        group: ActionGroup::Keys,
    },
    ActionConfig {
        action: ActionType::RemoveKey,
        label: "Remove Key",
        description: "Remove a signer key",
        required_permission: Permission::Owner,
        group: ActionGroup::Keys,
    },
    ActionConfig {
        action: ActionType::MintCasterHat,
        label: "Mint Caster Hat",
        description: "Grant caster permissions to an address",
        required_permission: Permission::Owner,
        group: ActionGroup::Hats,
    },
    ActionConfig {
        action: ActionType::ViewHatWearers,
        label: "View Hat Wearers",
        description: "See who has owner and caster hats",
        required_permission: Permission::Caster,
        group: ActionGroup::Hats,
    },
    ActionConfig {
        action: ActionType::Register,
        label: "Register FID",
        description: "Register a new Farcaster ID for this contract",
        required_permission: Permission::Owner,
        group: ActionGroup::Ownership,
    },
    ActionConfig {
        action: ActionType::PrepareReceive,
        label: "Prepare to Receive",
        description: "Prepare contract to receive an existing FID",
        required_permission: Permission::Owner,
        group: ActionGroup::Ownership,
    },
    ActionConfig {
        action: ActionType::TransferToContract,
        label: "Transfer FID to Contract",
        description: "Transfer FID from your wallet to this contract",
        required_permission: Permission::Owner,
        group: ActionGroup::Ownership,
    },
    ActionConfig {
        action: ActionType::TransferToWallet,
        label: "Transfer to My Wallet",
        description: "Transfer FID from contract to your wallet",
        required_permission: Permission::Owner,
        group: ActionGroup::Ownership,
    },
    ActionConfig {
        action: ActionType::TransferFid,
        label: "Transfer FID",
        description: "Transfer FID to any address",
        required_permission: Permission::Owner,
        group: ActionGroup::Ownership,
    },
    ActionConfig {
        action: ActionType::ChangeRecovery,
        label: "Change Recovery",
        description: "Update the recovery address",
        required_permission: Permission::Owner,
        group: ActionGroup::Account,
    },
    ActionConfig {
        action: ActionType::ChangeUsername,
        label: "Change Username",
        description: "Change the @username (requires FID in wallet)",
        required_permission: Permission::Owner,
        group: ActionGroup::Account,
    },
];

impl ActionType {
    pub fn config(&self) -> &'static ActionConfig {
        ACTIONS
            .iter()
            .find(|config| config.action == *self)
            .expect("every action type has a catalog entry")
    }

    /// Operates on the managed identity's keys, transfers, casts, profile or name.
    pub fn needs_managed_fid(&self) -> bool {
        matches!(
            self,
            ActionType::AddKey
                | ActionType::RemoveKey
                | ActionType::TransferFid
                | ActionType::TransferToWallet
                | ActionType::ChangeRecovery
                | ActionType::Cast
                | ActionType::UpdateProfile
                | ActionType::ChangeUsername
        )
    }

    /// Operates on the connected wallet's own identity.
    pub fn needs_wallet_fid(&self) -> bool {
        matches!(
            self,
            ActionType::ChangeUsername | ActionType::TransferToContract
        )
    }

    /// Issues a transaction or an off-chain write.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, ActionType::ViewHatWearers)
    }
}

impl ActionGroup {
    pub fn label(&self) -> &'static str {
        ACTION_GROUPS
            .iter()
            .find(|(group, _)| group == self)
            .map(|(_, label)| *label)
            .unwrap_or("Other")
    }
}

/// Catalog entries belonging to `group`, in catalog order.
pub fn actions_in_group(group: ActionGroup) -> impl Iterator<Item = &'static ActionConfig> {
    ACTIONS.iter().filter(move |config| config.group == group)
}
