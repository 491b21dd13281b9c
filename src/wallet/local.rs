//! In-process secp256k1 key wallet
//!
//! Derives Cosmos addresses from one private key: plain chains use
//! `ripemd160(sha256(pubkey))`, Ethermint-style chains use the Ethereum
//! address bytes. Used by the CLI `execute` command.

use super::{AminoSignResponse, DirectSignResponse, KeyAlgo, StdSignDoc, Wallet, WalletAccount};
use crate::chain::proto::SignDoc;
use crate::config::{ChainConfig, SigningKind};
use crate::error::{WalletError, WalletResult};

use async_trait::async_trait;
use cosmrs::AccountId;
use ethers::core::k256::ecdsa::signature::hazmat::PrehashSigner;
use ethers::core::k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Signature;
use ethers::utils::keccak256;
use prost::Message;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct ChainKeyInfo {
    bech32_prefix: String,
    algo: KeyAlgo,
}

/// Wallet backed by a single local private key
pub struct LocalKeyWallet {
    wallet: LocalWallet,
    chains: HashMap<String, ChainKeyInfo>,
}

impl LocalKeyWallet {
    /// Build from a hex private key (with or without 0x)
    pub fn from_hex(private_key: &str, chains: &HashMap<String, ChainConfig>) -> WalletResult<Self> {
        let bytes = hex::decode(private_key.trim().trim_start_matches("0x"))
            .map_err(|e| WalletError::Other(format!("invalid private key hex: {}", e)))?;
        let wallet = LocalWallet::from_bytes(&bytes)
            .map_err(|e| WalletError::Other(format!("invalid private key: {}", e)))?;

        let chains = chains
            .iter()
            .map(|(chain_id, chain)| {
                let algo = match chain.signing {
                    SigningKind::Standard => KeyAlgo::Secp256k1,
                    SigningKind::Evmos | SigningKind::Injective => KeyAlgo::EthSecp256k1,
                };
                (
                    chain_id.clone(),
                    ChainKeyInfo {
                        bech32_prefix: chain.bech32_prefix.clone(),
                        algo,
                    },
                )
            })
            .collect();

        Ok(Self { wallet, chains })
    }

    fn key_info(&self, chain_id: &str) -> WalletResult<&ChainKeyInfo> {
        self.chains
            .get(chain_id)
            .ok_or_else(|| WalletError::NoAccount(chain_id.to_string()))
    }

    fn signing_key(&self) -> &SigningKey {
        self.wallet.signer()
    }

    fn compressed_pubkey(&self) -> Vec<u8> {
        self.signing_key()
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    fn address_bytes(&self, algo: KeyAlgo) -> Vec<u8> {
        match algo {
            KeyAlgo::Secp256k1 => {
                let sha = Sha256::digest(self.compressed_pubkey());
                Ripemd160::digest(sha).to_vec()
            }
            KeyAlgo::EthSecp256k1 => self.wallet.address().as_bytes().to_vec(),
        }
    }

    /// Sign the digest of `bytes` appropriate for the key algorithm
    fn sign_bytes(&self, algo: KeyAlgo, bytes: &[u8]) -> WalletResult<Vec<u8>> {
        let digest: [u8; 32] = match algo {
            KeyAlgo::Secp256k1 => Sha256::digest(bytes).into(),
            KeyAlgo::EthSecp256k1 => keccak256(bytes),
        };
        let signature: EcdsaSignature = self
            .signing_key()
            .sign_prehash(&digest)
            .map_err(|e| WalletError::Rejected(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

#[async_trait]
impl Wallet for LocalKeyWallet {
    async fn enable(&self, chain_ids: &[String]) -> WalletResult<()> {
        for chain_id in chain_ids {
            self.key_info(chain_id)?;
        }
        Ok(())
    }

    async fn get_account(&self, chain_id: &str) -> WalletResult<WalletAccount> {
        let info = self.key_info(chain_id)?;
        let address = AccountId::new(&info.bech32_prefix, &self.address_bytes(info.algo))
            .map_err(|e| WalletError::Other(e.to_string()))?;

        Ok(WalletAccount {
            address: address.to_string(),
            pubkey: self.compressed_pubkey(),
            algo: info.algo,
        })
    }

    async fn sign_direct(
        &self,
        chain_id: &str,
        signer: &str,
        doc: SignDoc,
    ) -> WalletResult<DirectSignResponse> {
        let info = self.key_info(chain_id)?;
        debug!("Direct signing for {} on {}", signer, chain_id);
        let signature = self.sign_bytes(info.algo, &doc.encode_to_vec())?;
        Ok(DirectSignResponse {
            signed: doc,
            signature,
        })
    }

    async fn sign_amino(
        &self,
        chain_id: &str,
        signer: &str,
        doc: StdSignDoc,
    ) -> WalletResult<AminoSignResponse> {
        let info = self.key_info(chain_id)?;
        debug!("Amino signing for {} on {}", signer, chain_id);
        let signature = self.sign_bytes(info.algo, &doc.canonical_bytes()?)?;
        Ok(AminoSignResponse {
            signed: doc,
            signature,
        })
    }

    async fn sign_ethereum(&self, chain_id: &str, tx: &TypedTransaction) -> WalletResult<Signature> {
        self.key_info(chain_id)?;
        let wallet = match tx.chain_id() {
            Some(id) => self.wallet.clone().with_chain_id(id.as_u64()),
            None => self.wallet.clone(),
        };
        wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| WalletError::Rejected(e.to_string()))
    }
}
