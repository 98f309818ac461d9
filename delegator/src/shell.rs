//! The command-line shell: read the chain, show what the wallet may do, run
//! one action and re-read the chain when it changed something.

use crate::actions::{
    self, ActionContext, ActionOutcome, ActionRequest, ChainView, ConnectedWallet, PollSettings,
};
use crate::chain::ChainReader;
use crate::companion::CompanionClient;
use crate::fname::FnameClient;
use crate::wallet::LocalWallet;
use alloy_primitives::Address;
use anyhow::Context;
use lib::actions::{actions_in_group, ACTION_GROUPS};
use lib::executor::{Executor, ExecutorState};
use lib::gate::{check_action, GateContext};
use lib::permissions::PermissionCheck;
use lib::signer_cache::SignerCache;
use lib::utils::{format_hat_id, hats_app_url, truncate_address};
use lib::DelegatorInfo;
use std::fmt::Write;
use tokio::sync::oneshot;
use tracing::warn;

pub struct Session {
    pub delegator: Address,
    pub chain: ChainReader,
    pub wallet: Option<LocalWallet>,
    pub companion: CompanionClient,
    pub names: FnameClient,
    pub cache: SignerCache,
    pub poll: PollSettings,
}

/// Everything the shell shows, read fresh on every refresh.
pub struct Snapshot {
    pub info: DelegatorInfo,
    pub wallet: Option<Address>,
    pub wallet_fid: Option<u64>,
    pub permissions: PermissionCheck,
}

impl Snapshot {
    /// `None` while the role verdict is unknown.
    pub fn gate(&self) -> Option<GateContext> {
        self.permissions
            .permission()
            .map(|permission| GateContext::new(permission, &self.info, self.wallet_fid))
    }
}

impl Session {
    pub async fn refresh(&self) -> anyhow::Result<Snapshot> {
        let wallet = self.wallet.as_ref().map(|w| w.address());
        let (view, wallet_fid) = tokio::join!(self.chain.delegator_view(self.delegator), async {
            let wallet = wallet?;
            self.chain
                .wallet_fid(wallet)
                .await
                .map_err(|e| warn!("wallet FID read failed: {e}"))
                .ok()
        });
        let view = view.context("failed to read delegator")?;
        let permissions = self.chain.permissions(wallet, &view).await;
        Ok(Snapshot {
            info: view.info,
            wallet,
            wallet_fid,
            permissions,
        })
    }

    /// Run one action. Ctrl-C abandons it; any late response is dropped
    /// with the executor.
    pub async fn invoke(
        &self,
        snapshot: &Snapshot,
        request: ActionRequest,
    ) -> anyhow::Result<ExecutorState<ActionOutcome>> {
        let wallet = self
            .wallet
            .as_ref()
            .context("set WALLET_PRIVATE_KEY to act as a connected wallet")?;
        let gate = snapshot
            .gate()
            .context("permissions are still loading; retry")?;
        let ctx = ActionContext {
            chain: &self.chain,
            wallet,
            companion: &self.companion,
            names: &self.names,
            cache: &self.cache,
            info: &snapshot.info,
            gate,
            poll: self.poll,
        };

        let mut executor = Executor::new();
        let (_cancel_tx, mut cancel_rx) = oneshot::channel();
        let state = tokio::select! {
            state = actions::run(&mut executor, &ctx, request, &mut cancel_rx) => state.clone(),
            _ = tokio::signal::ctrl_c() => {
                warn!("action abandoned");
                ExecutorState::Idle
            }
        };
        Ok(state)
    }
}

pub fn render_status(snapshot: &Snapshot) -> String {
    let info = &snapshot.info;
    let mut out = String::new();
    let _ = writeln!(out, "Delegator:   {}", info.address);
    let _ = writeln!(out, "Owner hat:   {}", format_hat_id(info.owner_hat));
    if let Some(caster_hat) = info.caster_hat() {
        let _ = writeln!(out, "Caster hat:  {}", format_hat_id(caster_hat));
    }
    let _ = writeln!(out, "Hats tree:   {}", hats_app_url(lib::sol::CHAIN_ID, info.owner_hat));
    match info.fid {
        Some(fid) => {
            let _ = writeln!(out, "FID:         {fid}");
            if let Some(recovery) = info.recovery_address {
                let _ = writeln!(
                    out,
                    "Recovery:    {}",
                    truncate_address(&recovery.to_string(), 4)
                );
            }
        }
        None => {
            let _ = writeln!(out, "FID:         not registered");
        }
    }
    match snapshot.wallet {
        Some(wallet) => {
            let _ = writeln!(out, "Wallet:      {}", truncate_address(&wallet.to_string(), 4));
            match snapshot.wallet_fid.filter(|fid| *fid > 0) {
                Some(fid) => {
                    let _ = writeln!(out, "Wallet FID:  {fid}");
                }
                None => {
                    let _ = writeln!(out, "Wallet FID:  none");
                }
            }
        }
        None => {
            let _ = writeln!(out, "Wallet:      not connected");
        }
    }
    let permission = match snapshot.permissions.permission() {
        Some(permission) => permission.to_string(),
        None => "loading".to_string(),
    };
    let _ = writeln!(out, "Permission:  {permission}");
    out
}

/// The catalog by group, each action marked enabled or with its reason.
pub fn render_actions(gate: &GateContext) -> String {
    let mut out = String::new();
    for (group, label) in ACTION_GROUPS {
        let _ = writeln!(out, "{label}");
        for config in actions_in_group(*group) {
            let name = serde_json::to_value(config.action)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            match check_action(config, gate) {
                None => {
                    let _ = writeln!(out, "  [x] {:<26} {name}", config.label);
                }
                Some(reason) => {
                    let _ = writeln!(out, "  [ ] {:<26} {name} ({reason})", config.label);
                }
            }
        }
    }
    out
}

pub fn render_outcome(state: &ExecutorState<ActionOutcome>) -> String {
    match state {
        ExecutorState::Idle => "abandoned".to_string(),
        ExecutorState::Running => "running".to_string(),
        ExecutorState::Error(message) => format!("error: {message}"),
        ExecutorState::Success(outcome) => match outcome {
            ActionOutcome::Confirmed { tx_hash } => format!("confirmed in {tx_hash}"),
            ActionOutcome::SignerAttached {
                signer_uuid,
                public_key,
                tx_hash,
            } => format!("signer {signer_uuid} ({public_key}) attached in {tx_hash}"),
            ActionOutcome::Posted { response } => format!("posted: {response}"),
            ActionOutcome::UsernameChanged {
                name,
                broadcast_skipped,
            } => {
                if *broadcast_skipped {
                    format!("username set to {name}; broadcast skipped, retry manually")
                } else {
                    format!("username set to {name}")
                }
            }
            ActionOutcome::Hats(view) => {
                let mut out = String::new();
                for (label, hat) in [("Owner hat", &view.owner_hat), ("Caster hat", &view.caster_hat)] {
                    if let Some(hat) = hat {
                        let _ = writeln!(
                            out,
                            "{label}: {} {} ({}/{} worn{})",
                            format_hat_id(hat.id),
                            hat.details,
                            hat.supply,
                            if hat.max_supply == 0 {
                                "unlimited".to_string()
                            } else {
                                hat.max_supply.to_string()
                            },
                            if hat.active { "" } else { ", inactive" },
                        );
                    }
                }
                let _ = write!(out, "Wearers: {}", view.tree_url);
                out
            }
        },
    }
}
