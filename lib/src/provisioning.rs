//! Signer-provisioning flow state.
//!
//! The flow creates a signer with the provisioning service, registers a
//! signed key request for it, waits for human approval when the service asks
//! for it, and finally attaches the key on-chain.

use crate::api::{SignerRecord, SignerStatus};

/// Approval status is polled this often.
pub const APPROVAL_POLL_INTERVAL_SECS: u64 = 3;

/// How the signed key request is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// The companion server signs with the app key and registers the signer
    /// with the provisioning service.
    AppSigner,
    /// The connected wallet signs for the managed FID with the delegator
    /// contract as request signer; nothing is registered off-chain.
    ConnectedWallet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerFlow {
    Idle,
    Created(SignerRecord),
    PendingApproval(SignerRecord),
    Approved(SignerRecord),
    Attached(SignerRecord),
    Failed(String),
}

impl SignerFlow {
    /// State after the provisioning service answered a create or register call.
    pub fn from_record(record: SignerRecord) -> Self {
        match record.status {
            SignerStatus::Approved => SignerFlow::Approved(record),
            SignerStatus::PendingApproval => SignerFlow::PendingApproval(record),
            _ => SignerFlow::Created(record),
        }
    }

    pub fn signer_uuid(&self) -> Option<&str> {
        self.record().map(|r| r.signer_uuid.as_str())
    }

    pub fn record(&self) -> Option<&SignerRecord> {
        match self {
            SignerFlow::Created(r)
            | SignerFlow::PendingApproval(r)
            | SignerFlow::Approved(r)
            | SignerFlow::Attached(r) => Some(r),
            SignerFlow::Idle | SignerFlow::Failed(_) => None,
        }
    }

    pub fn approval_url(&self) -> Option<&str> {
        match self {
            SignerFlow::PendingApproval(r) => r.approval_url.as_deref(),
            _ => None,
        }
    }

    /// Public key ready for the contract write. Only exposed once approved.
    pub fn approved_key(&self) -> Option<&str> {
        match self {
            SignerFlow::Approved(r) => Some(r.public_key.as_str()),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SignerFlow::PendingApproval(_))
    }

    /// Apply one poll response. Only an `approved` status for the signer
    /// being waited on moves the flow; anything else leaves it untouched.
    /// Returns whether the state changed.
    pub fn apply_poll(&mut self, polled: &SignerRecord) -> bool {
        let SignerFlow::PendingApproval(pending) = self else {
            return false;
        };
        if pending.signer_uuid != polled.signer_uuid || polled.status != SignerStatus::Approved {
            return false;
        }
        let mut approved = polled.clone();
        if approved.public_key.is_empty() {
            approved.public_key = pending.public_key.clone();
        }
        *self = SignerFlow::Approved(approved);
        true
    }

    /// Mark the key attached on-chain. Only valid from `Approved`.
    pub fn attached(&mut self) -> bool {
        let SignerFlow::Approved(record) = self else {
            return false;
        };
        *self = SignerFlow::Attached(record.clone());
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        *self = SignerFlow::Failed(message.into());
    }

    pub fn reset(&mut self) {
        *self = SignerFlow::Idle;
    }
}
