//! Wallet capability consumed by the execution engine
//!
//! The engine never holds keys. It asks a [`Wallet`] to enable chains,
//! resolve addresses and sign documents. Capabilities a wallet lacks are
//! reported as [`WalletError::Unsupported`], which the engine uses for
//! capability detection.

pub mod local;
pub mod watch;

pub use local::LocalKeyWallet;
pub use watch::WatchOnlyWallet;

use crate::chain::proto::SignDoc;
use crate::config::ChainConfig;
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Signature;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Address and public key of the user on one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAccount {
    pub address: String,
    /// Compressed secp256k1 public key
    pub pubkey: Vec<u8>,
    pub algo: KeyAlgo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgo {
    Secp256k1,
    EthSecp256k1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AminoCoin {
    pub denom: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<AminoCoin>,
    pub gas: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AminoMsg {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Value,
}

/// Legacy amino JSON sign document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub chain_id: String,
    pub account_number: String,
    pub sequence: String,
    pub fee: StdFee,
    pub msgs: Vec<AminoMsg>,
    pub memo: String,
}

impl StdSignDoc {
    /// Canonical bytes: compact JSON with keys sorted at every level
    pub fn canonical_bytes(&self) -> WalletResult<Vec<u8>> {
        // serde_json::Value keeps object keys in a BTreeMap
        let value = serde_json::to_value(self).map_err(|e| WalletError::Other(e.to_string()))?;
        serde_json::to_vec(&value).map_err(|e| WalletError::Other(e.to_string()))
    }
}

/// Result of direct signing; the wallet may have adjusted the document
#[derive(Debug, Clone, PartialEq)]
pub struct DirectSignResponse {
    pub signed: SignDoc,
    pub signature: Vec<u8>,
}

/// Result of amino signing
#[derive(Debug, Clone, PartialEq)]
pub struct AminoSignResponse {
    pub signed: StdSignDoc,
    pub signature: Vec<u8>,
}

/// Signing and chain-enablement capability of the user's wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Generic enable of several chains at once
    async fn enable(&self, _chain_ids: &[String]) -> WalletResult<()> {
        Err(WalletError::Unsupported("enable"))
    }

    /// Provider-specific enable, tried when the generic one is missing
    async fn enable_via_extension(&self, _chain_ids: &[String]) -> WalletResult<()> {
        Err(WalletError::Unsupported("extension enable"))
    }

    /// Offer a chain record to the wallet before enabling it
    async fn add_chain(&self, _chain_id: &str, _chain: &ChainConfig) -> WalletResult<()> {
        Err(WalletError::Unsupported("add chain"))
    }

    async fn get_account(&self, chain_id: &str) -> WalletResult<WalletAccount>;

    /// Whether the signer for this chain is a hardware ledger
    async fn is_ledger(&self, _chain_id: &str) -> WalletResult<bool> {
        Ok(false)
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        doc: SignDoc,
    ) -> WalletResult<DirectSignResponse>;

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        doc: StdSignDoc,
    ) -> WalletResult<AminoSignResponse>;

    /// Sign an EVM transaction for the chain's execution extension
    async fn sign_ethereum(&self, chain_id: &str, tx: &TypedTransaction) -> WalletResult<Signature>;
}
