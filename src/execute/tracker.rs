//! Step state and relay status polling

use crate::error::{SwapError, SwapResult};
use crate::routing::{RoutingApi, StatusState, TxStatusResponse};

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Display state of one message in an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Init,
    Pending,
    Success,
}

/// Per-message state of one execution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTracker {
    states: Vec<StepState>,
}

impl StepTracker {
    pub fn new(steps: usize) -> Self {
        Self {
            states: vec![StepState::Init; steps],
        }
    }

    pub fn start(&mut self, index: usize) {
        if let Some(state) = self.states.get_mut(index) {
            *state = StepState::Pending;
        }
    }

    pub fn succeed(&mut self, index: usize) {
        if let Some(state) = self.states.get_mut(index) {
            *state = StepState::Success;
        }
    }

    /// Rewind in-flight steps after a fatal error; completed steps stay completed
    pub fn abort(&mut self) {
        for state in &mut self.states {
            if *state == StepState::Pending {
                *state = StepState::Init;
            }
        }
    }

    pub fn states(&self) -> &[StepState] {
        &self.states
    }
}

/// Polls the routing service until a tracked transaction reaches a terminal state
pub struct StatusPoller<'a> {
    routing: &'a dyn RoutingApi,
    interval: Duration,
    max_wait: Option<Duration>,
}

impl<'a> StatusPoller<'a> {
    pub fn new(routing: &'a dyn RoutingApi, interval: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            routing,
            interval,
            max_wait,
        }
    }

    /// Register the transaction and wait for `STATE_COMPLETED`
    ///
    /// A completed status carrying a top-level or packet error is returned as
    /// an error. Without a max wait this blocks until the relayer finishes.
    pub async fn track(&self, tx_hash: &str, chain_id: &str) -> SwapResult<TxStatusResponse> {
        self.routing.track(tx_hash, chain_id).await?;
        let started = Instant::now();

        loop {
            match self.routing.status(tx_hash, chain_id).await {
                Ok(status) if status.is_terminal() => return completed(status),
                Ok(status) => {
                    debug!("Tx {} on {} is {:?}", tx_hash, chain_id, status.status);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Status query for {} failed, retrying: {}", tx_hash, e);
                }
                Err(e) => {
                    return Err(SwapError::Tracking {
                        tx_hash: tx_hash.to_string(),
                        message: e.to_string(),
                    })
                }
            }

            if let Some(max_wait) = self.max_wait {
                if started.elapsed() >= max_wait {
                    return Err(SwapError::Timeout {
                        operation: format!("completion of tx {} on {}", tx_hash, chain_id),
                    });
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn completed(status: TxStatusResponse) -> SwapResult<TxStatusResponse> {
    debug_assert_eq!(status.status, StatusState::Completed);
    if let Some(err) = &status.error {
        return Err(SwapError::StatusError {
            code: err.code,
            message: err.message.clone(),
        });
    }
    if let Some(err) = status.packets.iter().find_map(|p| p.error.as_ref()) {
        return Err(SwapError::PacketError {
            code: err.code,
            message: err.message.clone(),
        });
    }
    Ok(status)
}
