//! Configuration management for the route orchestrator
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub routing: RoutingConfig,
    pub evm_quote: EvmQuoteConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub swap_venues: HashMap<String, String>,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    pub api_url: String,
    #[serde(default = "default_ignore_chains")]
    pub ignore_chains: Vec<String>,
    #[serde(default = "default_slippage")]
    pub slippage_tolerance_percent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvmQuoteConfig {
    pub api_url: String,
    #[serde(default = "default_evm_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    #[serde(default = "default_max_split")]
    pub max_split: u32,
    #[serde(default = "default_max_edge")]
    pub max_edge: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub poll_interval_ms: u64,
    /// Upper bound on status polling; absent means poll until a terminal state
    pub max_wait_secs: Option<u64>,
    pub swap_gas: u64,
    pub transfer_gas: u64,
    pub evm_fallback_gas_price_wei: u64,
    pub simulate_gas_multiplier: f64,
    pub auto_gas_multiplier: f64,
    pub ledger_timeout_blocks: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_wait_secs: None,
            swap_gas: 1_500_000,
            transfer_gas: 300_000,
            evm_fallback_gas_price_wei: 250_000_000_000,
            simulate_gas_multiplier: 1.2,
            auto_gas_multiplier: 1.3,
            ledger_timeout_blocks: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    pub path: PathBuf,
    pub default_source_chain: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/last_source_chain.json"),
            default_source_chain: "cosmoshub-4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub chain_name: String,
    #[serde(default)]
    pub pretty_name: Option<String>,
    pub bech32_prefix: String,
    #[serde(default)]
    pub fee_tokens: Vec<FeeToken>,
    #[serde(default)]
    pub preferred_rest: Option<String>,
    #[serde(default)]
    pub rest_endpoints: Vec<String>,
    #[serde(default)]
    pub evm_chain_id: Option<u64>,
    #[serde(default)]
    pub evm_rpc: Option<String>,
    #[serde(default)]
    pub signing: SigningKind,
    #[serde(default = "default_true")]
    pub ibc_enabled: bool,
    #[serde(default)]
    pub evm_tokens: Vec<EvmTokenConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FeeToken {
    pub denom: String,
    #[serde(default)]
    pub average_gas_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EvmTokenConfig {
    pub denom: String,
    pub address: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Chain-specific transaction construction
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SigningKind {
    #[default]
    Standard,
    Evmos,
    Injective,
}

fn default_ignore_chains() -> Vec<String> {
    vec!["agoric".to_string(), "8ball".to_string()]
}

fn default_slippage() -> String {
    "5.0".to_string()
}

fn default_evm_timeout_ms() -> u64 {
    5_000
}

fn default_slippage_bps() -> u32 {
    100
}

fn default_max_split() -> u32 {
    15
}

fn default_max_edge() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load settings from the file named by `ORCHESTRATOR_CONFIG`, or the default path
    pub fn load() -> Result<Self> {
        let config_path = env::var("ORCHESTRATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from a TOML document
    pub fn from_toml(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        if let Ok(url) = env::var("ROUTING_API_URL") {
            settings.routing.api_url = url;
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            anyhow::bail!("At least one chain must be configured");
        }

        for (name, value) in [
            ("routing.api_url", &self.routing.api_url),
            ("evm_quote.api_url", &self.evm_quote.api_url),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {}: {:?}", name, value))?;
        }

        for (chain_id, chain) in &self.chains {
            if chain.preferred_rest.is_none() && chain.rest_endpoints.is_empty() {
                anyhow::bail!("Chain {} has no REST endpoints configured", chain_id);
            }
            if chain.evm_chain_id.is_some() {
                if chain.evm_rpc.is_none() {
                    anyhow::bail!("EVM chain {} has no evm_rpc configured", chain_id);
                }
                if !self.swap_venues.contains_key(chain_id) {
                    anyhow::bail!("EVM chain {} has no swap venue configured", chain_id);
                }
            }
            if chain.fee_tokens.is_empty() {
                tracing::warn!("Chain {} has no fee tokens - execution will fail", chain_id);
            }
        }

        Ok(())
    }

    /// Get chain config by chain ID
    pub fn get_chain(&self, chain_id: &str) -> Option<&ChainConfig> {
        self.chains.get(chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
