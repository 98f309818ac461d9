//! Signer provisioning: create a signer, authorize its key for the managed
//! FID, wait for approval when the provisioning service asks for it, attach
//! the key on-chain and remember it locally.

use super::{ActionContext, ActionError, ActionOutcome, PollSettings, SignerService};
use lib::api::{RegisterSignedKeyRequest, SignerStatus};
use lib::calls;
use lib::provisioning::{SignerFlow, SigningMode};
use lib::signature::{encode_signed_key_metadata, signed_key_request_hash, SIGNER_DEADLINE_SECS};
use lib::utils::{now_secs, parse_hex_bytes};
use lib::StoredSigner;
use tokio::sync::oneshot;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub async fn provision_signer(
    ctx: &ActionContext<'_>,
    mode: SigningMode,
    cancel: &mut oneshot::Receiver<()>,
) -> Result<ActionOutcome, ActionError> {
    let fid = ctx.managed_fid()?;

    let created = ctx.companion.create_signer().await?;
    info!(signer_uuid = %created.signer_uuid, "created signer");
    let public_key = created.public_key.clone();
    let key = parse_hex_bytes(&public_key)?;

    let (mut flow, metadata) = match mode {
        SigningMode::AppSigner => {
            let signed = ctx.companion.signed_key_metadata(&public_key).await?;
            let mut registered = ctx
                .companion
                .register_signed_key(&RegisterSignedKeyRequest {
                    signer_uuid: Some(created.signer_uuid.clone()),
                    app_fid: Some(signed.request_fid),
                    deadline: Some(signed.deadline),
                    signature: Some(signed.signature.clone()),
                })
                .await?;
            if registered.public_key.is_empty() {
                registered.public_key = public_key.clone();
            }
            let flow = SignerFlow::from_record(registered);
            if let Some(url) = flow.approval_url() {
                info!("approve the signer at {url}");
            }
            (flow, parse_hex_bytes(&signed.metadata)?)
        }
        SigningMode::ConnectedWallet => {
            let deadline = now_secs() + SIGNER_DEADLINE_SECS;
            let signature = ctx
                .wallet
                .sign_hash(signed_key_request_hash(fid, &key, deadline))
                .await
                .map_err(ActionError::Sign)?;
            let metadata = encode_signed_key_metadata(fid, ctx.info.address, signature, deadline);
            // nothing to approve off-chain; the delegator vouches for the key
            let mut record = created.clone();
            record.status = SignerStatus::Approved;
            (SignerFlow::from_record(record), metadata)
        }
    };

    match &flow {
        SignerFlow::PendingApproval(_) => {
            wait_for_approval(ctx.companion, &mut flow, ctx.poll, cancel).await?
        }
        SignerFlow::Approved(_) => {}
        other => {
            let status = other
                .record()
                .map(|r| r.status.clone())
                .unwrap_or(SignerStatus::Unknown);
            return Err(ActionError::NotAwaitingApproval(status));
        }
    }

    let approved_key = match flow.approved_key() {
        Some(k) => parse_hex_bytes(k)?,
        None => key,
    };
    let tx_hash = ctx
        .submit(calls::add_key(ctx.info.address, approved_key, metadata))
        .await?;
    flow.attached();

    // The key is attached from here on; cache failures are only logged.
    let signer_uuid = created.signer_uuid.clone();
    match ctx
        .cache
        .append(fid, StoredSigner::new(signer_uuid.clone(), public_key.clone()))
    {
        Ok(true) => debug!(fid, %signer_uuid, "cached signer"),
        Ok(false) => {}
        Err(e) => warn!(fid, %signer_uuid, kind = e.kind(), "failed to cache attached signer: {e}"),
    }

    Ok(ActionOutcome::SignerAttached {
        signer_uuid,
        public_key,
        tx_hash,
    })
}

/// Poll the provisioning service until the flow leaves `PendingApproval`.
/// Failed polls are logged and retried on the next tick.
pub async fn wait_for_approval(
    service: &dyn SignerService,
    flow: &mut SignerFlow,
    settings: PollSettings,
    cancel: &mut oneshot::Receiver<()>,
) -> Result<(), ActionError> {
    let Some(signer_uuid) = flow.signer_uuid().map(str::to_string) else {
        return Ok(());
    };
    let started = Instant::now();
    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    while flow.is_pending() {
        tokio::select! {
            _ = &mut *cancel => {
                info!(%signer_uuid, "stopped waiting for approval");
                return Err(ActionError::Cancelled);
            }
            _ = ticker.tick() => {}
        }
        if let Some(max_wait) = settings.max_wait {
            if started.elapsed() >= max_wait {
                return Err(ActionError::ApprovalTimedOut(max_wait));
            }
        }
        match service.signer_status(&signer_uuid).await {
            Ok(record) => {
                if flow.apply_poll(&record) {
                    info!(%signer_uuid, "signer approved");
                }
            }
            Err(e) => warn!(%signer_uuid, "approval poll failed: {e}"),
        }
    }
    Ok(())
}
