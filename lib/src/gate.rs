use crate::actions::{ActionConfig, ActionType, ACTIONS};
use crate::types::{DelegatorInfo, Permission};
use serde::Serialize;

/// Why an action cannot be invoked right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    OwnerOnly,
    CasterOnly,
    NeedsFid,
    NeedsWalletFid,
    AlreadyRegistered,
    AlreadyHasFid,
}

impl DisabledReason {
    pub fn message(&self) -> &'static str {
        match self {
            DisabledReason::OwnerOnly => "owner only",
            DisabledReason::CasterOnly => "caster only",
            DisabledReason::NeedsFid => "needs FID",
            DisabledReason::NeedsWalletFid => "needs FID in wallet",
            DisabledReason::AlreadyRegistered => "already registered",
            DisabledReason::AlreadyHasFid => "already has FID",
        }
    }
}

impl std::fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Facts the gate decides on. Rebuild it whenever any of them changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateContext {
    pub permission: Permission,
    pub managed_fid: Option<u64>,
    pub wallet_fid: Option<u64>,
}

impl GateContext {
    pub fn new(permission: Permission, info: &DelegatorInfo, wallet_fid: Option<u64>) -> Self {
        Self {
            permission,
            managed_fid: info.fid,
            wallet_fid,
        }
    }

    fn has_managed_fid(&self) -> bool {
        self.managed_fid.is_some()
    }

    fn has_wallet_fid(&self) -> bool {
        matches!(self.wallet_fid, Some(fid) if fid != 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionAvailability {
    pub config: &'static ActionConfig,
    pub reason: Option<DisabledReason>,
}

impl ActionAvailability {
    pub fn enabled(&self) -> bool {
        self.reason.is_none()
    }
}

/// Decide whether `config` is invocable. First matching reason wins:
/// role, managed FID, wallet FID, then state exclusivity.
pub fn check_action(config: &ActionConfig, ctx: &GateContext) -> Option<DisabledReason> {
    match config.required_permission {
        Permission::Owner if ctx.permission != Permission::Owner => {
            return Some(DisabledReason::OwnerOnly)
        }
        Permission::Caster if ctx.permission == Permission::None => {
            return Some(DisabledReason::CasterOnly)
        }
        _ => {}
    }

    if config.action.needs_managed_fid() && !ctx.has_managed_fid() {
        return Some(DisabledReason::NeedsFid);
    }

    if config.action.needs_wallet_fid() && !ctx.has_wallet_fid() {
        return Some(DisabledReason::NeedsWalletFid);
    }

    match config.action {
        ActionType::Register if ctx.has_managed_fid() => Some(DisabledReason::AlreadyRegistered),
        ActionType::PrepareReceive | ActionType::TransferToContract if ctx.has_managed_fid() => {
            Some(DisabledReason::AlreadyHasFid)
        }
        _ => None,
    }
}

/// Evaluate the whole catalog, preserving catalog order.
pub fn evaluate(ctx: &GateContext) -> Vec<ActionAvailability> {
    ACTIONS
        .iter()
        .map(|config| ActionAvailability {
            config,
            reason: check_action(config, ctx),
        })
        .collect()
}

pub fn availability_of(action: ActionType, ctx: &GateContext) -> ActionAvailability {
    let config = action.config();
    ActionAvailability {
        config,
        reason: check_action(config, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(permission: Permission, managed_fid: Option<u64>, wallet_fid: Option<u64>) -> GateContext {
        GateContext {
            permission,
            managed_fid,
            wallet_fid,
        }
    }

    fn reason_of(action: ActionType, ctx: &GateContext) -> Option<DisabledReason> {
        availability_of(action, ctx).reason
    }

    #[test]
    fn test_no_hats_means_no_actions() {
        for managed in [None, Some(5)] {
            for wallet in [None, Some(0), Some(9)] {
                let availability = evaluate(&ctx(Permission::None, managed, wallet));
                assert!(availability.iter().all(|a| !a.enabled()));
            }
        }
    }

    #[test]
    fn test_owner_actions_need_owner_regardless_of_state() {
        for permission in [Permission::Caster, Permission::None] {
            for managed in [None, Some(5)] {
                for wallet in [None, Some(0), Some(9)] {
                    let c = ctx(permission, managed, wallet);
                    for config in ACTIONS
                        .iter()
                        .filter(|config| config.required_permission == Permission::Owner)
                    {
                        assert_eq!(check_action(config, &c), Some(DisabledReason::OwnerOnly));
                    }
                }
            }
        }
    }

    #[test]
    fn test_owner_without_fid() {
        let c = ctx(Permission::Owner, None, None);
        assert_eq!(reason_of(ActionType::Register, &c), None);
        assert_eq!(reason_of(ActionType::PrepareReceive, &c), None);
        assert_eq!(reason_of(ActionType::AddKey, &c), Some(DisabledReason::NeedsFid));
        assert_eq!(reason_of(ActionType::RemoveKey, &c), Some(DisabledReason::NeedsFid));
        assert_eq!(reason_of(ActionType::Cast, &c), Some(DisabledReason::NeedsFid));
        assert_eq!(
            reason_of(ActionType::ChangeUsername, &c),
            Some(DisabledReason::NeedsFid)
        );
        assert_eq!(reason_of(ActionType::MintCasterHat, &c), None);
    }

    #[test]
    fn test_owner_with_fid() {
        let c = ctx(Permission::Owner, Some(1234), None);
        assert_eq!(
            reason_of(ActionType::Register, &c),
            Some(DisabledReason::AlreadyRegistered)
        );
        assert_eq!(
            reason_of(ActionType::PrepareReceive, &c),
            Some(DisabledReason::AlreadyHasFid)
        );
        assert_eq!(reason_of(ActionType::AddKey, &c), None);
        assert_eq!(reason_of(ActionType::TransferToWallet, &c), None);
    }

    #[test]
    fn test_wallet_fid_must_be_nonzero() {
        let zero = ctx(Permission::Owner, None, Some(0));
        assert_eq!(
            reason_of(ActionType::TransferToContract, &zero),
            Some(DisabledReason::NeedsWalletFid)
        );
        let set = ctx(Permission::Owner, None, Some(77));
        assert_eq!(reason_of(ActionType::TransferToContract, &set), None);
    }

    #[test]
    fn test_change_username_needs_both_fids() {
        let wallet_only = ctx(Permission::Owner, None, Some(7));
        assert_eq!(
            reason_of(ActionType::ChangeUsername, &wallet_only),
            Some(DisabledReason::NeedsFid)
        );
        let managed_only = ctx(Permission::Owner, Some(42), None);
        assert_eq!(
            reason_of(ActionType::ChangeUsername, &managed_only),
            Some(DisabledReason::NeedsWalletFid)
        );
        let both = ctx(Permission::Owner, Some(42), Some(7));
        assert_eq!(reason_of(ActionType::ChangeUsername, &both), None);
    }

    #[test]
    fn test_wallet_fid_checked_before_exclusivity() {
        let c = ctx(Permission::Owner, Some(1), None);
        assert_eq!(
            reason_of(ActionType::TransferToContract, &c),
            Some(DisabledReason::NeedsWalletFid)
        );
        let c = ctx(Permission::Owner, Some(1), Some(2));
        assert_eq!(
            reason_of(ActionType::TransferToContract, &c),
            Some(DisabledReason::AlreadyHasFid)
        );
    }

    #[test]
    fn test_caster_sees_caster_actions() {
        let c = ctx(Permission::Caster, Some(10), None);
        let enabled: Vec<_> = evaluate(&c)
            .into_iter()
            .filter(|a| a.enabled())
            .map(|a| a.config.action)
            .collect();
        assert_eq!(
            enabled,
            vec![
                ActionType::Cast,
                ActionType::UpdateProfile,
                ActionType::AddKey,
                ActionType::ViewHatWearers
            ]
        );
    }

    #[test]
    fn test_role_reason_comes_first() {
        let c = ctx(Permission::None, None, None);
        assert_eq!(reason_of(ActionType::Cast, &c), Some(DisabledReason::CasterOnly));
        assert_eq!(reason_of(ActionType::Register, &c), Some(DisabledReason::OwnerOnly));
    }
}
