//! Action executors and the collaborators they talk to.

use crate::companion::CompanionError;
use crate::fname::FnameError;
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use lib::actions::ActionType;
use lib::api::{
    CastEmbed, CastRequest, FnameTransferRequest, MetadataResponse, ProfileRequest,
    ProfileUpdate, RegisterSignedKeyRequest, SignerRecord,
};
use lib::calls::ContractCall;
use lib::executor::{Executor, ExecutorState};
use lib::gate::{availability_of, DisabledReason, GateContext};
use lib::provisioning::SigningMode;
use lib::signer_cache::{SignerCache, SignerCacheError};
use lib::utils::ValidationError;
use lib::{DelegatorInfo, HatInfo, Receivable};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

pub mod contract;
pub mod offchain;
pub mod signer;

/// On-chain reads the executors need.
#[async_trait]
pub trait ChainView: Send + Sync {
    async fn wallet_fid(&self, wallet: Address) -> anyhow::Result<u64>;
    async fn is_wearer(&self, wallet: Address, hat: U256) -> anyhow::Result<bool>;
    async fn is_admin(&self, wallet: Address, hat: U256) -> anyhow::Result<bool>;
    async fn hat_info(&self, hat: U256) -> anyhow::Result<HatInfo>;
    async fn register_price(&self, extra_storage: U256) -> anyhow::Result<U256>;
    async fn nonce(&self, wallet: Address) -> anyhow::Result<U256>;
    async fn receivable(&self, delegator: Address) -> anyhow::Result<Receivable>;
}

/// The wallet the user acts with. `send_call` returns once the transaction
/// is confirmed and fails if it reverted.
#[async_trait]
pub trait ConnectedWallet: Send + Sync {
    fn address(&self) -> Address;
    async fn sign_hash(&self, hash: B256) -> anyhow::Result<Bytes>;
    async fn send_call(&self, call: ContractCall) -> anyhow::Result<B256>;
}

/// The companion server's signer, cast and profile routes.
#[async_trait]
pub trait SignerService: Send + Sync {
    async fn create_signer(&self) -> Result<SignerRecord, CompanionError>;
    async fn signer_status(&self, signer_uuid: &str) -> Result<SignerRecord, CompanionError>;
    async fn signed_key_metadata(
        &self,
        public_key: &str,
    ) -> Result<MetadataResponse, CompanionError>;
    async fn register_signed_key(
        &self,
        request: &RegisterSignedKeyRequest,
    ) -> Result<SignerRecord, CompanionError>;
    async fn cast(&self, request: &CastRequest) -> Result<Value, CompanionError>;
    async fn update_profile(&self, request: &ProfileRequest) -> Result<Value, CompanionError>;
}

#[async_trait]
pub trait NameRegistry: Send + Sync {
    async fn transfer_name(&self, request: &FnameTransferRequest) -> Result<Value, FnameError>;
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Disabled(DisabledReason),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no signer available; create one or pass a signer uuid")]
    NoSigner,
    #[error("not prepared: call prepareToReceive first")]
    NotPrepared,
    #[error("prepared for FID {prepared}, not {fid}")]
    PreparedForOtherFid { prepared: u64, fid: u64 },
    #[error("expired, re-prepare")]
    Expired,
    #[error("no caster hat configured")]
    NoCasterHat,
    #[error("wallet is not an admin of the caster hat")]
    NotHatAdmin,
    #[error("caster hat is at max supply")]
    HatAtMaxSupply,
    #[error("{0} already wears the caster hat")]
    AlreadyWearer(Address),
    #[error("signer is not awaiting approval (status {0:?})")]
    NotAwaitingApproval(lib::api::SignerStatus),
    #[error("signer approval timed out after {0:?}")]
    ApprovalTimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Companion(#[from] CompanionError),
    #[error(transparent)]
    Fname(#[from] FnameError),
    #[error(transparent)]
    Cache(#[from] SignerCacheError),
    #[error("chain read failed: {0}")]
    Read(anyhow::Error),
    #[error("transaction failed: {0}")]
    Write(anyhow::Error),
    #[error("wallet signature failed: {0}")]
    Sign(anyhow::Error),
}

impl ActionError {
    pub fn kind(&self) -> &str {
        match *self {
            ActionError::Disabled(_) => "Disabled",
            ActionError::Validation(_) => "Validation",
            ActionError::NoSigner => "NoSigner",
            ActionError::NotPrepared => "NotPrepared",
            ActionError::PreparedForOtherFid { .. } => "PreparedForOtherFid",
            ActionError::Expired => "Expired",
            ActionError::NoCasterHat => "NoCasterHat",
            ActionError::NotHatAdmin => "NotHatAdmin",
            ActionError::HatAtMaxSupply => "HatAtMaxSupply",
            ActionError::AlreadyWearer(_) => "AlreadyWearer",
            ActionError::NotAwaitingApproval(_) => "NotAwaitingApproval",
            ActionError::ApprovalTimedOut(_) => "ApprovalTimedOut",
            ActionError::Cancelled => "Cancelled",
            ActionError::Companion(_) => "Companion",
            ActionError::Fname(_) => "Fname",
            ActionError::Cache(_) => "Cache",
            ActionError::Read(_) => "Read",
            ActionError::Write(_) => "Write",
            ActionError::Sign(_) => "Sign",
        }
    }

    /// Kind of the wrapped client or cache error, if there is one.
    pub fn source_kind(&self) -> Option<&str> {
        match self {
            ActionError::Companion(e) => Some(e.kind()),
            ActionError::Fname(e) => Some(e.kind()),
            ActionError::Cache(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// What the user asked for, with their raw form input.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    Register {
        recovery: String,
        extra_storage: u64,
    },
    /// Attach a key whose metadata was produced elsewhere.
    AddKey {
        key: String,
        metadata: String,
    },
    /// Provision a fresh signer and attach it.
    CreateSigner {
        mode: SigningMode,
    },
    RemoveKey {
        key: String,
    },
    ChangeRecovery {
        recovery: String,
    },
    TransferFid {
        to: String,
        deadline: Option<u64>,
        sig: Option<String>,
    },
    TransferToWallet,
    PrepareReceive {
        fid: String,
    },
    TransferToContract,
    MintCasterHat {
        recipient: String,
    },
    ViewHatWearers,
    Cast {
        signer_uuid: Option<String>,
        text: String,
        embeds: Vec<CastEmbed>,
        parent: Option<String>,
        channel_id: Option<String>,
    },
    UpdateProfile {
        signer_uuid: Option<String>,
        update: ProfileUpdate,
    },
    ChangeUsername {
        name: String,
        signer_uuid: Option<String>,
    },
}

impl ActionRequest {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionRequest::Register { .. } => ActionType::Register,
            ActionRequest::AddKey { .. } | ActionRequest::CreateSigner { .. } => {
                ActionType::AddKey
            }
            ActionRequest::RemoveKey { .. } => ActionType::RemoveKey,
            ActionRequest::ChangeRecovery { .. } => ActionType::ChangeRecovery,
            ActionRequest::TransferFid { .. } => ActionType::TransferFid,
            ActionRequest::TransferToWallet => ActionType::TransferToWallet,
            ActionRequest::PrepareReceive { .. } => ActionType::PrepareReceive,
            ActionRequest::TransferToContract => ActionType::TransferToContract,
            ActionRequest::MintCasterHat { .. } => ActionType::MintCasterHat,
            ActionRequest::ViewHatWearers => ActionType::ViewHatWearers,
            ActionRequest::Cast { .. } => ActionType::Cast,
            ActionRequest::UpdateProfile { .. } => ActionType::UpdateProfile,
            ActionRequest::ChangeUsername { .. } => ActionType::ChangeUsername,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HatView {
    pub owner_hat: Option<HatInfo>,
    pub caster_hat: Option<HatInfo>,
    pub tree_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Confirmed {
        tx_hash: B256,
    },
    SignerAttached {
        signer_uuid: String,
        public_key: String,
        tx_hash: B256,
    },
    Posted {
        response: Value,
    },
    UsernameChanged {
        name: String,
        broadcast_skipped: bool,
    },
    Hats(HatView),
}

impl ActionOutcome {
    /// Whether the shell should re-read the chain after this outcome.
    pub fn refreshes_chain(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Confirmed { .. } | ActionOutcome::SignerAttached { .. }
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(lib::provisioning::APPROVAL_POLL_INTERVAL_SECS),
            max_wait: None,
        }
    }
}

/// Everything an executor may touch for one invocation.
pub struct ActionContext<'a> {
    pub chain: &'a dyn ChainView,
    pub wallet: &'a dyn ConnectedWallet,
    pub companion: &'a dyn SignerService,
    pub names: &'a dyn NameRegistry,
    pub cache: &'a SignerCache,
    pub info: &'a DelegatorInfo,
    pub gate: GateContext,
    pub poll: PollSettings,
}

impl ActionContext<'_> {
    fn managed_fid(&self) -> Result<u64, ActionError> {
        self.info
            .fid
            .ok_or(ActionError::Disabled(DisabledReason::NeedsFid))
    }

    fn wallet_fid(&self) -> Result<u64, ActionError> {
        self.gate
            .wallet_fid
            .filter(|fid| *fid > 0)
            .ok_or(ActionError::Disabled(DisabledReason::NeedsWalletFid))
    }

    async fn submit(&self, call: ContractCall) -> Result<B256, ActionError> {
        let tx_hash = self.wallet.send_call(call).await.map_err(ActionError::Write)?;
        info!(%tx_hash, "transaction confirmed");
        Ok(tx_hash)
    }

    fn signer_for(&self, fid: u64, override_uuid: Option<&str>) -> Result<String, ActionError> {
        self.cache
            .select_signer(fid, override_uuid)?
            .ok_or(ActionError::NoSigner)
    }
}

/// Run one action end to end: gate it, execute it, report the outcome.
/// `cancel` abandons the approval poll of a signer flow.
pub async fn execute(
    ctx: &ActionContext<'_>,
    request: ActionRequest,
    cancel: &mut oneshot::Receiver<()>,
) -> Result<ActionOutcome, ActionError> {
    let availability = availability_of(request.action_type(), &ctx.gate);
    if let Some(reason) = availability.reason {
        return Err(ActionError::Disabled(reason));
    }

    match request {
        ActionRequest::Register {
            recovery,
            extra_storage,
        } => contract::register(ctx, &recovery, extra_storage).await,
        ActionRequest::AddKey { key, metadata } => contract::add_key(ctx, &key, &metadata).await,
        ActionRequest::CreateSigner { mode } => signer::provision_signer(ctx, mode, cancel).await,
        ActionRequest::RemoveKey { key } => contract::remove_key(ctx, &key).await,
        ActionRequest::ChangeRecovery { recovery } => {
            contract::change_recovery(ctx, &recovery).await
        }
        ActionRequest::TransferFid { to, deadline, sig } => {
            contract::transfer_fid(ctx, &to, deadline, sig.as_deref()).await
        }
        ActionRequest::TransferToWallet => contract::transfer_to_wallet(ctx).await,
        ActionRequest::PrepareReceive { fid } => contract::prepare_receive(ctx, &fid).await,
        ActionRequest::TransferToContract => contract::transfer_to_contract(ctx).await,
        ActionRequest::MintCasterHat { recipient } => {
            contract::mint_caster_hat(ctx, &recipient).await
        }
        ActionRequest::ViewHatWearers => contract::view_hats(ctx).await,
        ActionRequest::Cast {
            signer_uuid,
            text,
            embeds,
            parent,
            channel_id,
        } => offchain::cast(ctx, signer_uuid.as_deref(), &text, embeds, parent, channel_id).await,
        ActionRequest::UpdateProfile {
            signer_uuid,
            update,
        } => offchain::update_profile(ctx, signer_uuid.as_deref(), update).await,
        ActionRequest::ChangeUsername { name, signer_uuid } => {
            offchain::change_username(ctx, &name, signer_uuid.as_deref()).await
        }
    }
}

/// Drive `execute` through an [`Executor`], discarding the result if the
/// executor was reset while the action was in flight.
pub async fn run<'e>(
    executor: &'e mut Executor<ActionOutcome>,
    ctx: &ActionContext<'_>,
    request: ActionRequest,
    cancel: &mut oneshot::Receiver<()>,
) -> &'e ExecutorState<ActionOutcome> {
    let action = request.action_type();
    let ticket = match executor.start() {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!("{action:?}: {e}");
            return executor.state();
        }
    };
    let outcome = execute(ctx, request, cancel).await.map_err(|e| {
        warn!(
            kind = e.kind(),
            source = e.source_kind().unwrap_or("-"),
            "{action:?} failed: {e}"
        );
        e.to_string()
    });
    if let Err(e) = executor.finish(ticket, outcome) {
        warn!("{action:?}: {e}");
    }
    executor.state()
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;

    #[test]
    fn test_source_kind_names_the_client_error() {
        let rejected = ActionError::from(FnameError::Rejected {
            status: 400,
            message: "name taken".to_string(),
        });
        assert_eq!(rejected.kind(), "Fname");
        assert_eq!(rejected.source_kind(), Some("Rejected"));

        let api = ActionError::from(CompanionError::Api {
            status: 500,
            message: "Neynar API key not configured".to_string(),
        });
        assert_eq!(api.source_kind(), Some("Api"));
        assert_eq!(ActionError::NoSigner.source_kind(), None);
    }

    #[tokio::test]
    async fn test_disabled_actions_never_reach_collaborators() {
        let mut harness = Harness::new(None);
        harness.permission = lib::Permission::Caster;
        let (_tx, mut cancel) = oneshot::channel();

        let err = execute(
            &harness.ctx(),
            ActionRequest::RemoveKey {
                key: "0x01".to_string(),
            },
            &mut cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::Disabled(DisabledReason::OwnerOnly)));

        let err = execute(
            &harness.ctx(),
            ActionRequest::Cast {
                signer_uuid: Some("u".to_string()),
                text: "gm".to_string(),
                embeds: Vec::new(),
                parent: None,
                channel_id: None,
            },
            &mut cancel,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "needs FID");
        assert!(harness.companion.casts.lock().unwrap().is_empty());
        assert!(harness.wallet.sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_records_terminal_state() {
        let harness = Harness::new(Some(42));
        let mut executor = Executor::new();
        let (_tx, mut cancel) = oneshot::channel();

        let state = run(
            &mut executor,
            &harness.ctx(),
            ActionRequest::ChangeRecovery {
                recovery: "0xnope".to_string(),
            },
            &mut cancel,
        )
        .await;
        assert!(matches!(state, ExecutorState::Error(msg) if msg.contains("invalid address")));

        let state = run(
            &mut executor,
            &harness.ctx(),
            ActionRequest::ChangeRecovery {
                recovery: Address::repeat_byte(3).to_string(),
            },
            &mut cancel,
        )
        .await;
        assert!(matches!(state, ExecutorState::Success(ActionOutcome::Confirmed { .. })));
        assert_eq!(harness.wallet.sent().len(), 1);
    }
}
