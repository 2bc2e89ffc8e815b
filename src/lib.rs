//! Uniswap V3 liquidity + swap workflow
//!
//! Funds a test account on a forked chain, provisions a concentrated
//! liquidity position, swaps against the pool, then withdraws and collects
//! the position. Every state-changing call is submitted and confirmed one at
//! a time through a `TransactionSequencer`.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod execution;
pub mod position;
pub mod types;
pub mod units;
pub mod workflow;

// Re-export commonly used types
pub use chain::{ChainClient, RpcChainClient};
pub use config::{load_config, load_config_from_file, FlowConfig, FlowParams};
pub use error::{FlowError, FlowResult};
pub use position::PositionLifecycleController;
pub use types::{Deadline, Minimums, PoolKey, Position, SwapOrder, TransactionRecord};
pub use workflow::{FlowReport, Step, SwapFlow, WorkflowError};
