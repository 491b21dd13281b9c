//! Cross-chain route orchestrator
//!
//! Composes routes that may combine a swap on the EVM execution extension of a
//! Cosmos chain with IBC transfers and CosmWasm swaps, turns them into ordered
//! chain messages and executes them one by one: sign, broadcast, track.

pub mod api;
pub mod cache;
pub mod chain;
pub mod compose;
pub mod config;
pub mod error;
pub mod evm;
pub mod execute;
pub mod http;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod state;
pub mod wallet;

pub use error::{SwapError, SwapResult};
