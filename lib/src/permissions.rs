//! Combines hat-membership answers into a single role verdict.

use crate::types::{Permission, UserPermissions};
use alloy_primitives::{Address, U256};

/// A hat id as read from the delegator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatSlot {
    /// Zero: the role is not configured.
    Unset,
    Set(U256),
    /// The read failed, so the role may or may not be configured.
    Unreadable,
}

impl HatSlot {
    pub fn from_hat(hat: U256) -> Self {
        if hat.is_zero() {
            HatSlot::Unset
        } else {
            HatSlot::Set(hat)
        }
    }

    pub fn hat(&self) -> Option<U256> {
        match self {
            HatSlot::Set(hat) => Some(*hat),
            _ => None,
        }
    }

    /// The answer for a slot that needs no query, or `None` when a
    /// membership query must be issued.
    pub fn unqueried_answer(&self) -> Option<MembershipAnswer> {
        match self {
            HatSlot::Unset => Some(MembershipAnswer::Skipped),
            HatSlot::Unreadable => Some(MembershipAnswer::Failed),
            HatSlot::Set(_) => None,
        }
    }
}

/// The membership queries worth issuing for a wallet. A zero hat id is
/// treated as an unconfigured role and never queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipPlan {
    pub wallet: Address,
    pub owner_hat: Option<U256>,
    pub caster: HatSlot,
}

/// `None` when there is nothing to ask: no wallet, or neither role is
/// configured. An unreadable caster hat still needs a plan so the verdict
/// can come out as loading.
pub fn plan_membership(
    wallet: Option<Address>,
    owner_hat: Option<U256>,
    caster: HatSlot,
) -> Option<MembershipPlan> {
    let wallet = wallet?;
    let owner_hat = owner_hat.filter(|hat| !hat.is_zero());
    let caster = match caster {
        HatSlot::Set(hat) => HatSlot::from_hat(hat),
        other => other,
    };
    if owner_hat.is_none() && caster == HatSlot::Unset {
        return None;
    }
    Some(MembershipPlan {
        wallet,
        owner_hat,
        caster,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAnswer {
    /// No query was issued for this hat.
    Skipped,
    Wears(bool),
    /// The query failed; the answer is unknown, not "no".
    Failed,
}

impl From<Option<bool>> for MembershipAnswer {
    fn from(answer: Option<bool>) -> Self {
        match answer {
            Some(wears) => MembershipAnswer::Wears(wears),
            None => MembershipAnswer::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCheck {
    /// At least one membership query has not resolved. Callers must not
    /// read this as `Permission::None`.
    Loading,
    Resolved(UserPermissions),
}

impl PermissionCheck {
    pub fn permission(&self) -> Option<Permission> {
        match self {
            PermissionCheck::Loading => None,
            PermissionCheck::Resolved(perms) => Some(perms.permission),
        }
    }
}

pub fn combine(owner: MembershipAnswer, caster: MembershipAnswer) -> PermissionCheck {
    if owner == MembershipAnswer::Failed || caster == MembershipAnswer::Failed {
        return PermissionCheck::Loading;
    }
    PermissionCheck::Resolved(UserPermissions::new(
        owner == MembershipAnswer::Wears(true),
        caster == MembershipAnswer::Wears(true),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> Address {
        Address::repeat_byte(0x11)
    }

    #[test]
    fn test_short_circuits_without_wallet_or_hats() {
        assert_eq!(plan_membership(None, Some(U256::from(1)), HatSlot::Unset), None);
        assert_eq!(plan_membership(Some(wallet()), None, HatSlot::Unset), None);
        assert_eq!(
            plan_membership(Some(wallet()), Some(U256::ZERO), HatSlot::Set(U256::ZERO)),
            None
        );
    }

    #[test]
    fn test_zero_caster_hat_is_skipped() {
        let plan = plan_membership(
            Some(wallet()),
            Some(U256::from(5)),
            HatSlot::from_hat(U256::ZERO),
        )
        .unwrap();
        assert_eq!(plan.owner_hat, Some(U256::from(5)));
        assert_eq!(plan.caster, HatSlot::Unset);
        assert_eq!(plan.caster.unqueried_answer(), Some(MembershipAnswer::Skipped));
    }

    #[test]
    fn test_unreadable_caster_hat_is_loading() {
        let plan = plan_membership(Some(wallet()), Some(U256::ZERO), HatSlot::Unreadable).unwrap();
        assert_eq!(plan.owner_hat, None);
        let caster = plan.caster.unqueried_answer().unwrap();
        assert_eq!(caster, MembershipAnswer::Failed);

        let check = combine(MembershipAnswer::Skipped, caster);
        assert_eq!(check, PermissionCheck::Loading);
        let check = combine(MembershipAnswer::Wears(false), caster);
        assert_eq!(check.permission(), None);
    }

    #[test]
    fn test_combine_truth_table() {
        use MembershipAnswer::*;
        let cases = [
            (Wears(false), Wears(false), Permission::None),
            (Wears(false), Wears(true), Permission::Caster),
            (Wears(true), Wears(false), Permission::Owner),
            (Wears(true), Wears(true), Permission::Owner),
            (Wears(true), Skipped, Permission::Owner),
            (Skipped, Skipped, Permission::None),
        ];
        for (owner, caster, expected) in cases {
            assert_eq!(combine(owner, caster).permission(), Some(expected));
        }
    }

    #[test]
    fn test_failure_is_loading_not_none() {
        let check = combine(MembershipAnswer::Failed, MembershipAnswer::Wears(false));
        assert_eq!(check, PermissionCheck::Loading);
        assert_eq!(check.permission(), None);
    }
}
