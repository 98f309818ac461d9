//! Off-chain updates: casts, profile fields and usernames.

use super::{ActionContext, ActionError, ActionOutcome};
use lib::api::{CastEmbed, CastRequest, FnameTransferRequest, ProfileRequest, ProfileUpdate};
use lib::signature::username_proof_hash;
use lib::utils::{now_secs, validate_username, ValidationError, MAX_CAST_LENGTH};
use tracing::{info, warn};

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn cast(
    ctx: &ActionContext<'_>,
    signer_uuid: Option<&str>,
    text: &str,
    embeds: Vec<CastEmbed>,
    parent: Option<String>,
    channel_id: Option<String>,
) -> Result<ActionOutcome, ActionError> {
    let fid = ctx.managed_fid()?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Missing("text").into());
    }
    if text.chars().count() > MAX_CAST_LENGTH {
        return Err(ValidationError::CastTooLong.into());
    }
    let signer_uuid = ctx.signer_for(fid, signer_uuid)?;

    let request = CastRequest {
        signer_uuid: Some(signer_uuid),
        text: Some(text.to_string()),
        embeds: embeds.into_iter().filter(|e| !e.url.trim().is_empty()).collect(),
        parent: non_empty(parent),
        channel_id: non_empty(channel_id),
    };
    let response = ctx.companion.cast(&request).await?;
    info!(fid, "cast published");
    Ok(ActionOutcome::Posted { response })
}

pub async fn update_profile(
    ctx: &ActionContext<'_>,
    signer_uuid: Option<&str>,
    update: ProfileUpdate,
) -> Result<ActionOutcome, ActionError> {
    let fid = ctx.managed_fid()?;
    if update.is_empty() {
        return Err(ValidationError::Missing("at least one profile field").into());
    }
    let signer_uuid = ctx.signer_for(fid, signer_uuid)?;
    let response = ctx
        .companion
        .update_profile(&ProfileRequest {
            signer_uuid: Some(signer_uuid),
            update,
        })
        .await?;
    Ok(ActionOutcome::Posted { response })
}

/// Register `name` for the managed FID with the fname registry, then tell
/// the profile service so clients pick it up sooner. Only the registry call
/// decides success.
pub async fn change_username(
    ctx: &ActionContext<'_>,
    name: &str,
    signer_uuid: Option<&str>,
) -> Result<ActionOutcome, ActionError> {
    let name = name.trim();
    validate_username(name)?;
    ctx.wallet_fid()?;
    let fid = ctx.managed_fid()?;

    let owner = ctx.wallet.address();
    let timestamp = now_secs();
    let signature = ctx
        .wallet
        .sign_hash(username_proof_hash(name, timestamp, owner))
        .await
        .map_err(ActionError::Sign)?;

    ctx.names
        .transfer_name(&FnameTransferRequest {
            name: name.to_string(),
            from: 0,
            to: fid,
            fid,
            owner: owner.to_string(),
            timestamp,
            signature: format!("0x{}", hex::encode(&signature)),
        })
        .await?;
    info!(fid, name, "username registered");

    let broadcast = match ctx.signer_for(fid, signer_uuid) {
        Ok(signer_uuid) => ctx
            .companion
            .update_profile(&ProfileRequest {
                signer_uuid: Some(signer_uuid),
                update: ProfileUpdate::username(name),
            })
            .await
            .map(|_| ())
            .map_err(ActionError::from),
        Err(e) => Err(e),
    };
    let broadcast_skipped = match broadcast {
        Ok(()) => false,
        Err(e) => {
            warn!("broadcast skipped, retry manually: {e}");
            true
        }
    };

    Ok(ActionOutcome::UsernameChanged {
        name: name.to_string(),
        broadcast_skipped,
    })
}
