//! Address-only wallet for quoting

use super::{AminoSignResponse, DirectSignResponse, KeyAlgo, StdSignDoc, Wallet, WalletAccount};
use crate::chain::proto::SignDoc;
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Signature;
use std::collections::HashMap;

/// Knows the user's addresses but cannot sign
#[derive(Debug, Clone, Default)]
pub struct WatchOnlyWallet {
    addresses: HashMap<String, String>,
}

impl WatchOnlyWallet {
    pub fn new(addresses: HashMap<String, String>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl Wallet for WatchOnlyWallet {
    async fn enable(&self, _chain_ids: &[String]) -> WalletResult<()> {
        Ok(())
    }

    async fn get_account(&self, chain_id: &str) -> WalletResult<WalletAccount> {
        let address = self
            .addresses
            .get(chain_id)
            .ok_or_else(|| WalletError::NoAccount(chain_id.to_string()))?;
        Ok(WalletAccount {
            address: address.clone(),
            pubkey: Vec::new(),
            algo: KeyAlgo::Secp256k1,
        })
    }

    async fn sign_direct(&self, _: &str, _: &str, _: SignDoc) -> WalletResult<DirectSignResponse> {
        Err(WalletError::Unsupported("signing"))
    }

    async fn sign_amino(&self, _: &str, _: &str, _: StdSignDoc) -> WalletResult<AminoSignResponse> {
        Err(WalletError::Unsupported("signing"))
    }

    async fn sign_ethereum(&self, _: &str, _: &TypedTransaction) -> WalletResult<Signature> {
        Err(WalletError::Unsupported("signing"))
    }
}
