//! Fixed-shape contract writes the executors submit.

use crate::signature::encode_receive_signature;
use crate::sol::{
    IHats, IHatsFarcasterDelegator, IIdRegistry, HATS, ID_REGISTRY, KEY_TYPE_ED25519,
    METADATA_TYPE_SIGNED_KEY_REQUEST,
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

/// Fallback `register` value when the gateway price cannot be read.
pub const FALLBACK_REGISTER_PRICE_WEI: u128 = 1_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
}

impl ContractCall {
    fn new<C: SolCall>(to: Address, call: C) -> Self {
        Self {
            to,
            input: Bytes::from(call.abi_encode()),
            value: U256::ZERO,
        }
    }

    fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn selector(&self) -> [u8; 4] {
        let mut selector = [0u8; 4];
        if self.input.len() >= 4 {
            selector.copy_from_slice(&self.input[..4]);
        }
        selector
    }
}

pub fn register(
    delegator: Address,
    recovery: Address,
    extra_storage: U256,
    price: Option<U256>,
) -> ContractCall {
    ContractCall::new(
        delegator,
        IHatsFarcasterDelegator::registerCall {
            _recovery: recovery,
            _extraStorage: extra_storage,
        },
    )
    .with_value(price.unwrap_or(U256::from(FALLBACK_REGISTER_PRICE_WEI)))
}

/// Key type and metadata type are fixed: ed25519 with a signed key request.
pub fn add_key(delegator: Address, key: Bytes, metadata: Bytes) -> ContractCall {
    ContractCall::new(
        delegator,
        IHatsFarcasterDelegator::addKeyCall {
            _keyType: KEY_TYPE_ED25519,
            _key: key,
            _metadataType: METADATA_TYPE_SIGNED_KEY_REQUEST,
            _metadata: metadata,
        },
    )
}

pub fn remove_key(delegator: Address, key: Bytes) -> ContractCall {
    ContractCall::new(delegator, IHatsFarcasterDelegator::removeKeyCall { _key: key })
}

pub fn change_recovery(delegator: Address, new_recovery: Address) -> ContractCall {
    ContractCall::new(
        delegator,
        IHatsFarcasterDelegator::changeRecoveryAddressCall {
            _newRecovery: new_recovery,
        },
    )
}

pub fn transfer_fid(delegator: Address, to: Address, deadline: u64, sig: Bytes) -> ContractCall {
    ContractCall::new(
        delegator,
        IHatsFarcasterDelegator::transferFidCall {
            _to: to,
            _deadline: U256::from(deadline),
            _sig: sig,
        },
    )
}

pub fn prepare_to_receive(delegator: Address, fid: u64) -> ContractCall {
    ContractCall::new(
        delegator,
        IHatsFarcasterDelegator::prepareToReceiveCall {
            _fid: U256::from(fid),
        },
    )
}

/// Sent by the wallet that currently custodies `fid`.
pub fn transfer_to_delegator(delegator: Address, fid: u64, deadline: u64) -> ContractCall {
    ContractCall::new(
        ID_REGISTRY,
        IIdRegistry::transferCall {
            to: delegator,
            deadline: U256::from(deadline),
            sig: encode_receive_signature(fid),
        },
    )
}

pub fn mint_hat(hat: U256, wearer: Address) -> ContractCall {
    ContractCall::new(
        HATS,
        IHats::mintHatCall {
            _hatId: hat,
            _wearer: wearer,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::RECEIVE_SIGNATURE_LEN;

    fn delegator() -> Address {
        Address::repeat_byte(0xde)
    }

    #[test]
    fn test_add_key_fixes_types() {
        let call = add_key(delegator(), Bytes::from(vec![9u8; 32]), Bytes::new());
        assert_eq!(call.to, delegator());
        assert_eq!(call.selector(), IHatsFarcasterDelegator::addKeyCall::SELECTOR);

        let decoded = IHatsFarcasterDelegator::addKeyCall::abi_decode(&call.input, true).unwrap();
        assert_eq!(decoded._keyType, 1);
        assert_eq!(decoded._metadataType, 1);
        assert_eq!(decoded._key, Bytes::from(vec![9u8; 32]));
    }

    #[test]
    fn test_register_price_fallback() {
        let recovery = Address::repeat_byte(1);
        let call = register(delegator(), recovery, U256::ZERO, None);
        assert_eq!(call.value, U256::from(FALLBACK_REGISTER_PRICE_WEI));

        let call = register(delegator(), recovery, U256::from(2), Some(U256::from(777)));
        assert_eq!(call.value, U256::from(777));
        let decoded = IHatsFarcasterDelegator::registerCall::abi_decode(&call.input, true).unwrap();
        assert_eq!(decoded._recovery, recovery);
        assert_eq!(decoded._extraStorage, U256::from(2));
    }

    #[test]
    fn test_transfer_to_delegator_targets_id_registry() {
        let call = transfer_to_delegator(delegator(), 42, 1_000);
        assert_eq!(call.to, ID_REGISTRY);
        assert_eq!(call.value, U256::ZERO);
        let decoded = IIdRegistry::transferCall::abi_decode(&call.input, true).unwrap();
        assert_eq!(decoded.to, delegator());
        assert_eq!(decoded.deadline, U256::from(1_000));
        assert_eq!(decoded.sig.len(), RECEIVE_SIGNATURE_LEN);
        assert_eq!(decoded.sig, encode_receive_signature(42));
    }

    #[test]
    fn test_mint_hat_targets_hats() {
        let wearer = Address::repeat_byte(2);
        let call = mint_hat(U256::from(5), wearer);
        assert_eq!(call.to, HATS);
        let decoded = IHats::mintHatCall::abi_decode(&call.input, true).unwrap();
        assert_eq!(decoded._hatId, U256::from(5));
        assert_eq!(decoded._wearer, wearer);
    }
}
