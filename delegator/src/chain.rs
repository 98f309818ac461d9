//! Chain Reader: role, identity and pricing reads against Optimism.

use crate::actions::ChainView;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::pubsub::PubSubFrontend;
use alloy::rpc::client::WsConnect;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use anyhow::anyhow;
use async_trait::async_trait;
use lib::permissions::{combine, plan_membership, HatSlot, MembershipAnswer, PermissionCheck};
use lib::sol::{
    IHats, IHatsFarcasterDelegator, IIdGateway, IIdRegistry, IKeyRegistry, HATS, ID_GATEWAY,
    ID_REGISTRY, KEY_REGISTRY, KEY_STATE_ADDED,
};
use lib::{DelegatorInfo, HatInfo, Receivable};
use tracing::{debug, info, warn};

/// Public Optimism endpoints tried after the configured ones.
pub const DEFAULT_RPC_URLS: &[&str] = &[
    "wss://optimism-rpc.publicnode.com",
    "wss://optimism.drpc.org",
];

/// Connect to as many providers as possible, configured ones first.
pub async fn connect_to_providers(rpc_urls: &[String]) -> Vec<RootProvider<PubSubFrontend>> {
    let mut providers = Vec::new();
    let fallbacks = DEFAULT_RPC_URLS
        .iter()
        .map(|u| u.to_string())
        .filter(|u| !rpc_urls.contains(u));

    for url in rpc_urls.iter().cloned().chain(fallbacks) {
        let ws_connect = WsConnect {
            url: url.clone(),
            auth: None,
            config: None,
        };
        match ProviderBuilder::new().on_ws(ws_connect).await {
            Ok(client) => {
                debug!("connected to provider {url}");
                providers.push(client);
            }
            Err(e) => warn!("failed to connect to provider {url}: {e}"),
        }
    }
    info!("connected to {} provider(s)", providers.len());
    providers
}

/// Per-field results of a delegator read. One failing field does not hide
/// the others.
#[derive(Debug)]
pub struct DelegatorReads {
    pub owner_hat: anyhow::Result<U256>,
    pub caster_hat: anyhow::Result<U256>,
    pub fid: anyhow::Result<Option<u64>>,
    /// Only read once `fid` is known to be set.
    pub recovery: Option<anyhow::Result<Address>>,
}

/// A delegator snapshot plus what is known about its caster hat read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatorView {
    /// `caster_hat` is zero here when the read failed; check `caster`.
    pub info: DelegatorInfo,
    pub caster: HatSlot,
}

impl DelegatorReads {
    /// Assemble a snapshot. Needs the owner hat and the fid. A failed caster
    /// hat read is kept as `HatSlot::Unreadable` and a failed recovery read
    /// counts as unset.
    pub fn into_view(self, address: Address) -> anyhow::Result<DelegatorView> {
        let owner_hat = self.owner_hat?;
        let fid = self.fid?;
        let caster = match self.caster_hat {
            Ok(hat) => HatSlot::from_hat(hat),
            Err(e) => {
                warn!("caster hat read failed: {e}");
                HatSlot::Unreadable
            }
        };
        let recovery_address = match self.recovery {
            Some(Ok(recovery)) => Some(recovery),
            Some(Err(e)) => {
                warn!("recovery address read failed: {e}");
                None
            }
            None => None,
        };
        Ok(DelegatorView {
            info: DelegatorInfo {
                address,
                owner_hat,
                caster_hat: caster.hat().unwrap_or(U256::ZERO),
                fid,
                recovery_address: fid.and(recovery_address),
            },
            caster,
        })
    }
}

pub struct ChainReader {
    providers: Vec<RootProvider<PubSubFrontend>>,
}

impl ChainReader {
    pub fn new(providers: Vec<RootProvider<PubSubFrontend>>) -> anyhow::Result<Self> {
        if providers.is_empty() {
            return Err(anyhow!(
                "could not connect to any Optimism RPC provider; add a websocket URL with `delegator rpc add`"
            ));
        }
        Ok(Self { providers })
    }

    pub async fn connect(rpc_urls: &[String]) -> anyhow::Result<Self> {
        Self::new(connect_to_providers(rpc_urls).await)
    }

    /// `eth_call` against each provider in turn until one answers.
    async fn call<C: SolCall>(&self, to: Address, call: C) -> anyhow::Result<C::Return> {
        let tx_input = TransactionInput::new(Bytes::from(call.abi_encode()));
        let tx = TransactionRequest::default().to(to).input(tx_input);

        let mut last_error = None;
        for provider in &self.providers {
            match provider.call(&tx).await {
                Ok(result) => return Ok(C::abi_decode_returns(&result, false)?),
                Err(e) => {
                    debug!("provider call to {to} failed: {e}");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => anyhow!("all providers failed: {e}"),
            None => anyhow!("no providers"),
        })
    }

    pub async fn read_delegator(&self, delegator: Address) -> DelegatorReads {
        let (owner_hat, caster_hat, fid) = tokio::join!(
            self.call(delegator, IHatsFarcasterDelegator::ownerHatCall {}),
            self.call(delegator, IHatsFarcasterDelegator::casterHatCall {}),
            self.call(ID_REGISTRY, IIdRegistry::idOfCall { owner: delegator }),
        );
        let fid = fid.map(|r| Some(r.fid.saturating_to::<u64>()).filter(|fid| *fid > 0));
        let recovery = match fid {
            Ok(Some(fid)) => Some(
                self.call(
                    ID_REGISTRY,
                    IIdRegistry::recoveryOfCall {
                        fid: U256::from(fid),
                    },
                )
                .await
                .map(|r| r.recovery),
            ),
            _ => None,
        };
        DelegatorReads {
            owner_hat: owner_hat.map(|r| r.hat),
            caster_hat: caster_hat.map(|r| r.hat),
            fid,
            recovery,
        }
    }

    pub async fn delegator_view(&self, delegator: Address) -> anyhow::Result<DelegatorView> {
        self.read_delegator(delegator).await.into_view(delegator)
    }

    /// Role verdict for `wallet`. Skips the queries when there is nothing to
    /// ask, and reports `Loading` if a query or the caster hat read failed.
    pub async fn permissions(
        &self,
        wallet: Option<Address>,
        view: &DelegatorView,
    ) -> PermissionCheck {
        let Some(plan) = plan_membership(wallet, Some(view.info.owner_hat), view.caster) else {
            return PermissionCheck::Resolved(lib::UserPermissions::none());
        };
        let owner = HatSlot::from_hat(plan.owner_hat.unwrap_or(U256::ZERO));
        let (owner, caster) = tokio::join!(
            self.membership(plan.wallet, owner),
            self.membership(plan.wallet, plan.caster),
        );
        combine(owner, caster)
    }

    async fn membership(&self, wallet: Address, slot: HatSlot) -> MembershipAnswer {
        let HatSlot::Set(hat) = slot else {
            return slot.unqueried_answer().unwrap_or(MembershipAnswer::Skipped);
        };
        match self.is_wearer(wallet, hat).await {
            Ok(wears) => MembershipAnswer::Wears(wears),
            Err(e) => {
                warn!("hat membership query failed: {e}");
                MembershipAnswer::Failed
            }
        }
    }

    pub async fn keys(&self, fid: u64) -> anyhow::Result<Vec<Bytes>> {
        let fid = U256::from(fid);
        let total = self
            .call(
                KEY_REGISTRY,
                IKeyRegistry::totalKeysCall {
                    fid,
                    state: KEY_STATE_ADDED,
                },
            )
            .await?
            .total;
        if total.is_zero() {
            return Ok(Vec::new());
        }
        Ok(self
            .call(
                KEY_REGISTRY,
                IKeyRegistry::keysOfCall {
                    fid,
                    state: KEY_STATE_ADDED,
                    startIdx: U256::ZERO,
                    batchSize: total,
                },
            )
            .await?
            .keys)
    }
}

#[async_trait]
impl ChainView for ChainReader {
    async fn wallet_fid(&self, wallet: Address) -> anyhow::Result<u64> {
        Ok(self
            .call(ID_REGISTRY, IIdRegistry::idOfCall { owner: wallet })
            .await?
            .fid
            .saturating_to())
    }

    async fn is_wearer(&self, wallet: Address, hat: U256) -> anyhow::Result<bool> {
        Ok(self
            .call(
                HATS,
                IHats::isWearerOfHatCall {
                    _user: wallet,
                    _hatId: hat,
                },
            )
            .await?
            .wears)
    }

    async fn is_admin(&self, wallet: Address, hat: U256) -> anyhow::Result<bool> {
        Ok(self
            .call(
                HATS,
                IHats::isAdminOfHatCall {
                    _user: wallet,
                    _hatId: hat,
                },
            )
            .await?
            .admin)
    }

    async fn hat_info(&self, hat: U256) -> anyhow::Result<HatInfo> {
        let view = self.call(HATS, IHats::viewHatCall { _hatId: hat }).await?;
        Ok(HatInfo {
            id: hat,
            details: view.details,
            max_supply: view.maxSupply,
            supply: view.supply,
            image_uri: view.imageURI,
            active: view.active,
        })
    }

    async fn register_price(&self, extra_storage: U256) -> anyhow::Result<U256> {
        Ok(self
            .call(
                ID_GATEWAY,
                IIdGateway::priceCall {
                    extraStorage: extra_storage,
                },
            )
            .await?
            .price)
    }

    async fn nonce(&self, wallet: Address) -> anyhow::Result<U256> {
        Ok(self
            .call(ID_REGISTRY, IIdRegistry::noncesCall { owner: wallet })
            .await?
            .nonce)
    }

    async fn receivable(&self, delegator: Address) -> anyhow::Result<Receivable> {
        let slot = self
            .call(delegator, IHatsFarcasterDelegator::receivableCall {})
            .await?;
        Ok(Receivable {
            fid: slot.fid.saturating_to(),
            deadline: slot.deadline.saturating_to(),
        })
    }
}
