//! Persisted client state
//!
//! Only the last-used source chain survives between runs. It lives in a small
//! JSON file; a missing or unreadable file falls back to the configured default.

use crate::config::StateConfig;
use crate::error::{SwapError, SwapResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceChainRecord {
    pub chain_id: String,
    pub updated_at: DateTime<Utc>,
}

/// File-backed store of the last-used source chain
#[derive(Debug, Clone)]
pub struct SourceChainStore {
    path: PathBuf,
    default_chain: String,
}

impl SourceChainStore {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            path: config.path.clone(),
            default_chain: config.default_source_chain.clone(),
        }
    }

    /// Last saved source chain, or the default
    pub fn load(&self) -> String {
        match fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<SourceChainRecord>(&raw) {
                Ok(record) => {
                    debug!("Last source chain {} from {:?}", record.chain_id, self.path);
                    record.chain_id
                }
                Err(e) => {
                    warn!("Ignoring corrupt state file {:?}: {}", self.path, e);
                    self.default_chain.clone()
                }
            },
            Err(_) => self.default_chain.clone(),
        }
    }

    pub fn save(&self, chain_id: &str) -> SwapResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| SwapError::Internal(format!("creating {:?}: {}", dir, e)))?;
        }
        let record = SourceChainRecord {
            chain_id: chain_id.to_string(),
            updated_at: Utc::now(),
        };
        let body = serde_json::to_vec_pretty(&record)?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| SwapError::Internal(format!("writing {:?}: {}", tmp, e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| SwapError::Internal(format!("renaming {:?}: {}", tmp, e)))?;
        debug!("Saved source chain {} to {:?}", chain_id, self.path);
        Ok(())
    }
}
