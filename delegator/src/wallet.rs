//! Connected wallet backed by a local private key.

use crate::actions::ConnectedWallet;
use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::client::WsConnect;
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};
use alloy::signers::{local::PrivateKeySigner, Signer};
use alloy_primitives::{Address, Bytes, B256};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use lib::calls::ContractCall;
use lib::sol::CHAIN_ID;
use std::str::FromStr;
use tracing::info;

pub struct LocalWallet {
    signer: PrivateKeySigner,
    rpc_url: String,
}

impl LocalWallet {
    pub fn new(private_key: &str, rpc_url: &str) -> anyhow::Result<Self> {
        let private_key = private_key.trim();
        let signer = PrivateKeySigner::from_str(private_key)
            .map_err(|_| anyhow!("WALLET_PRIVATE_KEY is not a valid private key"))?
            .with_chain_id(Some(CHAIN_ID));
        Ok(Self {
            signer,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// Wallet from `WALLET_PRIVATE_KEY`, or `None` when it is unset.
    pub fn from_env(rpc_url: Option<&String>) -> anyhow::Result<Option<Self>> {
        let Ok(private_key) = std::env::var("WALLET_PRIVATE_KEY") else {
            return Ok(None);
        };
        let rpc_url = rpc_url.context("a wallet needs an RPC URL to send transactions")?;
        Self::new(&private_key, rpc_url).map(Some)
    }
}

#[async_trait]
impl ConnectedWallet for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_hash(&self, hash: B256) -> anyhow::Result<Bytes> {
        let signature = self.signer.sign_hash(&hash).await?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    async fn send_call(&self, call: ContractCall) -> anyhow::Result<B256> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .on_ws(WsConnect::new(self.rpc_url.clone()))
            .await?;

        let tx = TransactionRequest::default()
            .to(call.to)
            .input(TransactionInput::new(call.input))
            .value(call.value);
        let pending = provider.send_transaction(tx).await?;
        info!(tx_hash = %pending.tx_hash(), "transaction submitted, waiting for receipt");

        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(anyhow!("transaction {} reverted", receipt.transaction_hash));
        }
        Ok(receipt.transaction_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::PrimitiveSignature;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_signatures_recover_to_wallet() {
        let wallet = LocalWallet::new(TEST_KEY, "ws://localhost:8545").unwrap();
        let hash = B256::repeat_byte(0x42);
        let signature = wallet.sign_hash(hash).await.unwrap();
        assert_eq!(signature.len(), 65);
        let recovered = PrimitiveSignature::try_from(signature.as_ref())
            .unwrap()
            .recover_address_from_prehash(&hash)
            .unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_rejects_bad_key() {
        assert!(LocalWallet::new("0x1234", "ws://localhost:8545").is_err());
    }
}
