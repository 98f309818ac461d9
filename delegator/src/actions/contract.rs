//! Direct contract writes. None of these resubmit on failure.

use super::{ActionContext, ActionError, ActionOutcome, HatView};
use alloy_primitives::{Bytes, U256};
use lib::calls;
use lib::signature::{transfer_hash, TRANSFER_DEADLINE_SECS};
use lib::sol::CHAIN_ID;
use lib::utils::{hats_app_url, now_secs, parse_address, parse_fid, parse_hex_bytes};
use tracing::{info, warn};

pub async fn register(
    ctx: &ActionContext<'_>,
    recovery: &str,
    extra_storage: u64,
) -> Result<ActionOutcome, ActionError> {
    let recovery = parse_address(recovery)?;
    let extra_storage = U256::from(extra_storage);
    let price = match ctx.chain.register_price(extra_storage).await {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("could not read registration price, sending fallback value: {e}");
            None
        }
    };
    let call = calls::register(ctx.info.address, recovery, extra_storage, price);
    info!(value = %call.value, "registering FID");
    let tx_hash = ctx.submit(call).await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn add_key(
    ctx: &ActionContext<'_>,
    key: &str,
    metadata: &str,
) -> Result<ActionOutcome, ActionError> {
    ctx.managed_fid()?;
    let key = parse_hex_bytes(key)?;
    let metadata = if metadata.trim().is_empty() {
        Bytes::new()
    } else {
        parse_hex_bytes(metadata)?
    };
    let tx_hash = ctx.submit(calls::add_key(ctx.info.address, key, metadata)).await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn remove_key(ctx: &ActionContext<'_>, key: &str) -> Result<ActionOutcome, ActionError> {
    ctx.managed_fid()?;
    let key = parse_hex_bytes(key)?;
    let tx_hash = ctx.submit(calls::remove_key(ctx.info.address, key)).await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn change_recovery(
    ctx: &ActionContext<'_>,
    recovery: &str,
) -> Result<ActionOutcome, ActionError> {
    ctx.managed_fid()?;
    let recovery = parse_address(recovery)?;
    let tx_hash = ctx
        .submit(calls::change_recovery(ctx.info.address, recovery))
        .await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn transfer_fid(
    ctx: &ActionContext<'_>,
    to: &str,
    deadline: Option<u64>,
    sig: Option<&str>,
) -> Result<ActionOutcome, ActionError> {
    ctx.managed_fid()?;
    let to = parse_address(to)?;
    let deadline = deadline.unwrap_or_else(|| now_secs() + TRANSFER_DEADLINE_SECS);
    let sig = match sig.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sig) => parse_hex_bytes(sig)?,
        None => Bytes::new(),
    };
    let tx_hash = ctx
        .submit(calls::transfer_fid(ctx.info.address, to, deadline, sig))
        .await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

/// Move the managed FID to the connected wallet. The wallet signs the
/// recipient's half of the IdRegistry transfer.
pub async fn transfer_to_wallet(ctx: &ActionContext<'_>) -> Result<ActionOutcome, ActionError> {
    let fid = ctx.managed_fid()?;
    let wallet = ctx.wallet.address();
    let nonce = ctx.chain.nonce(wallet).await.map_err(ActionError::Read)?;
    let deadline = now_secs() + TRANSFER_DEADLINE_SECS;
    let sig = ctx
        .wallet
        .sign_hash(transfer_hash(fid, wallet, nonce, deadline))
        .await
        .map_err(ActionError::Sign)?;
    let tx_hash = ctx
        .submit(calls::transfer_fid(ctx.info.address, wallet, deadline, sig))
        .await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn prepare_receive(ctx: &ActionContext<'_>, fid: &str) -> Result<ActionOutcome, ActionError> {
    let fid = parse_fid(fid)?;
    let tx_hash = ctx
        .submit(calls::prepare_to_receive(ctx.info.address, fid))
        .await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

/// Send the wallet's own FID into a delegator that was prepared for it.
pub async fn transfer_to_contract(ctx: &ActionContext<'_>) -> Result<ActionOutcome, ActionError> {
    let fid = ctx.wallet_fid()?;
    let receivable = ctx
        .chain
        .receivable(ctx.info.address)
        .await
        .map_err(ActionError::Read)?;
    if receivable.fid == 0 {
        return Err(ActionError::NotPrepared);
    }
    if receivable.fid != fid {
        return Err(ActionError::PreparedForOtherFid {
            prepared: receivable.fid,
            fid,
        });
    }
    if receivable.deadline < now_secs() {
        return Err(ActionError::Expired);
    }
    let tx_hash = ctx
        .submit(calls::transfer_to_delegator(
            ctx.info.address,
            fid,
            receivable.deadline,
        ))
        .await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

pub async fn mint_caster_hat(
    ctx: &ActionContext<'_>,
    recipient: &str,
) -> Result<ActionOutcome, ActionError> {
    let hat = ctx.info.caster_hat().ok_or(ActionError::NoCasterHat)?;
    let recipient = parse_address(recipient)?;
    let wallet = ctx.wallet.address();

    let (is_admin, hat_info, already_wears) = tokio::join!(
        ctx.chain.is_admin(wallet, hat),
        ctx.chain.hat_info(hat),
        ctx.chain.is_wearer(recipient, hat),
    );
    if !is_admin.map_err(ActionError::Read)? {
        return Err(ActionError::NotHatAdmin);
    }
    if hat_info.map_err(ActionError::Read)?.at_max_supply() {
        return Err(ActionError::HatAtMaxSupply);
    }
    if already_wears.map_err(ActionError::Read)? {
        return Err(ActionError::AlreadyWearer(recipient));
    }

    let tx_hash = ctx.submit(calls::mint_hat(hat, recipient)).await?;
    Ok(ActionOutcome::Confirmed { tx_hash })
}

/// Read-only. A failed hat read leaves that hat out instead of failing.
pub async fn view_hats(ctx: &ActionContext<'_>) -> Result<ActionOutcome, ActionError> {
    let caster_hat = ctx.info.caster_hat();
    let (owner, caster) = tokio::join!(ctx.chain.hat_info(ctx.info.owner_hat), async {
        match caster_hat {
            Some(hat) => Some(ctx.chain.hat_info(hat).await),
            None => None,
        }
    });
    let owner_hat = owner
        .map_err(|e| warn!("owner hat read failed: {e}"))
        .ok();
    let caster_hat = caster.and_then(|r| r.map_err(|e| warn!("caster hat read failed: {e}")).ok());
    Ok(ActionOutcome::Hats(HatView {
        owner_hat,
        caster_hat,
        tree_url: hats_app_url(CHAIN_ID, ctx.info.owner_hat),
    }))
}
